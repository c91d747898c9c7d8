//! Runtime settings shared by the refresh pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_REPOLOGY_URL: &str = "https://repology.org";
pub const DEFAULT_CACHE_FILE: &str = ".repology_cache.json";
pub const DEFAULT_NAME_MAPPINGS_FILE: &str = "package_name_mappings.json";
pub const DEFAULT_UNIVERSE_FILE: &str = "package_mappings.toml";
pub const DEFAULT_OVERRIDES_FILE: &str = "packages/custom_install.json";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RATE_LIMIT_DELAY: Duration = Duration::from_millis(2100);
const CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60); // one refresh cycle

/// Locations of every file the pipeline reads or writes.
#[derive(Debug, Clone)]
pub struct Paths {
    pub cache: PathBuf,
    pub name_mappings: PathBuf,
    pub universe: PathBuf,
    pub overrides: PathBuf,
    /// Extra package lists (Brewfiles or plain lists) that must be covered
    pub package_lists: Vec<PathBuf>,
}

impl Paths {
    /// Where the scheduler keeps the current cycle's ordering.
    pub fn plan(&self) -> PathBuf {
        plan_path(&self.cache)
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            cache: PathBuf::from(DEFAULT_CACHE_FILE),
            name_mappings: PathBuf::from(DEFAULT_NAME_MAPPINGS_FILE),
            universe: PathBuf::from(DEFAULT_UNIVERSE_FILE),
            overrides: PathBuf::from(DEFAULT_OVERRIDES_FILE),
            package_lists: Vec::new(),
        }
    }
}

/// `<cache>.plan.json` next to the cache file.
pub fn plan_path(cache: &Path) -> PathBuf {
    let mut name = cache
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "cache".into());
    name.push(".plan.json");
    cache.with_file_name(name)
}

/// Network and scheduling tunables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub repology_url: String,
    pub request_timeout: Duration,
    /// Sleep between packages during a refresh run
    pub rate_limit_delay: Duration,
    /// Cache entries younger than this are served without a network call
    pub cache_ttl: Duration,
    pub user_agent: String,
    pub brew_program: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repology_url: DEFAULT_REPOLOGY_URL.to_string(),
            request_timeout: REQUEST_TIMEOUT,
            rate_limit_delay: RATE_LIMIT_DELAY,
            cache_ttl: CACHE_TTL,
            user_agent: format!(
                "pkgmap/{} (+{})",
                env!("CARGO_PKG_VERSION"),
                env!("CARGO_PKG_REPOSITORY")
            ),
            brew_program: "brew".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_path_sits_next_to_cache() {
        assert_eq!(
            plan_path(Path::new("data/.repology_cache.json")),
            PathBuf::from("data/.repology_cache.plan.json")
        );
        assert_eq!(
            plan_path(Path::new("cache.json")),
            PathBuf::from("cache.plan.json")
        );
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.rate_limit_delay, Duration::from_millis(2100));
        assert!(settings.user_agent.starts_with("pkgmap/"));
    }
}
