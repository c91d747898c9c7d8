//! Shared utility functions for command implementations

use indicatif::{ProgressBar, ProgressStyle};
use pkgmap::cache::CacheStore;
use pkgmap::config::Paths;
use pkgmap::names::NameMappings;
use pkgmap::overrides::Overrides;
use pkgmap::universe;
use std::collections::BTreeSet;

/// Everything table generation reads.
pub(super) struct Inputs {
    pub store: CacheStore,
    pub names: NameMappings,
    pub overrides: Overrides,
    /// Universe sections followed by extra package-list names
    pub packages: Vec<String>,
}

impl Inputs {
    pub fn load(paths: &Paths) -> anyhow::Result<Self> {
        Ok(Self {
            store: CacheStore::load(&paths.cache)?,
            names: NameMappings::load(&paths.name_mappings)?,
            overrides: Overrides::load(&paths.overrides)?,
            packages: load_packages(paths)?,
        })
    }

    /// Names every generated table must have a section for.
    pub fn required(&self) -> BTreeSet<String> {
        self.packages.iter().cloned().collect()
    }
}

/// The universe plus any extra package lists.
pub(super) fn load_packages(paths: &Paths) -> anyhow::Result<Vec<String>> {
    let names = universe::load_universe(&paths.universe)?;
    let lists = universe::load_package_lists(&paths.package_lists)?;
    Ok(universe::extend_universe(names, &lists))
}

pub(super) fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

pub(super) fn spinner(message: impl Into<String>) -> ProgressBar {
    if !is_tty() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

pub(super) fn progress_bar() -> ProgressBar {
    if !is_tty() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

pub(super) fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Compact age such as `3d` or `5h`.
pub(super) fn format_age(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "never".to_string();
    }
    let seconds = seconds as u64;
    match seconds {
        s if s >= 86_400 => format!("{}d", s / 86_400),
        s if s >= 3_600 => format!("{}h", s / 3_600),
        s if s >= 60 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(f64::INFINITY), "never");
        assert_eq!(format_age(90.0), "1m");
        assert_eq!(format_age(3.0 * 86_400.0 + 5.0), "3d");
    }
}
