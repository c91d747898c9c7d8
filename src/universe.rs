//! The set of packages that must be covered.
//!
//! The authoritative list is the mapping table itself: every top-level key of
//! `package_mappings.toml` is a canonical package name. Adding an empty
//! `[newtool]` section is enough to get it looked up on the next run.
//! Additional lists (a `Brewfile`, or plain one-name-per-line files) can
//! contribute names too.

use crate::error::{MapError, Result};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Fragments left behind by splitting Flatpak ids, never real packages.
const PHANTOM_NAMES: &[&str] = &["app", "com", "net", "org", "io", "dev", "edu", "gov", "mil"];

/// Whether `name` looks like a real package name.
pub fn is_valid_package_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && !PHANTOM_NAMES.contains(&trimmed.to_ascii_lowercase().as_str())
}

/// Canonical names from the universe file, in file order.
///
/// The universe is required: a missing or unparsable file aborts the run.
pub fn load_universe(path: &Path) -> Result<Vec<String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MapError::UniverseMissing(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    parse_universe(&content).map_err(|source| MapError::UniverseParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Top-level keys of a TOML document, in document order, phantom names removed.
pub fn parse_universe(content: &str) -> std::result::Result<Vec<String>, toml::de::Error> {
    let table: toml::Table = toml::from_str(content)?;
    let names: Vec<String> = table
        .keys()
        .filter(|name| {
            let valid = is_valid_package_name(name);
            if !valid {
                warn!("ignoring invalid package name '{}' in universe", name);
            }
            valid
        })
        .cloned()
        .collect();
    Ok(names)
}

/// Parse a package list, picking the format from the file name.
pub fn parse_package_list(file_name: &str, content: &str) -> BTreeSet<String> {
    if file_name.to_ascii_lowercase().contains("brewfile") {
        parse_brewfile(content)
    } else {
        parse_simple_list(content)
    }
}

/// Read a package list from disk. Missing lists are skipped with a warning.
pub fn load_package_list(path: &Path) -> Result<BTreeSet<String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("package list not found: {}", path.display());
            return Ok(BTreeSet::new());
        }
        Err(e) => return Err(e.into()),
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let names = parse_package_list(&file_name, &content);
    debug!("{} packages in {}", names.len(), path.display());
    Ok(names)
}

/// Union of several package lists.
pub fn load_package_lists(paths: &[PathBuf]) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for path in paths {
        names.extend(load_package_list(path)?);
    }
    Ok(names)
}

/// `universe` followed by list names it doesn't already contain.
pub fn extend_universe(mut universe: Vec<String>, lists: &BTreeSet<String>) -> Vec<String> {
    let known: HashSet<String> = universe.iter().cloned().collect();
    universe.extend(lists.iter().filter(|n| !known.contains(*n)).cloned());
    universe
}

/// `brew "name"` and `cask "name"` lines; tap prefixes are stripped.
pub fn parse_brewfile(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let rest = line
                .strip_prefix("brew ")
                .or_else(|| line.strip_prefix("cask "))?;
            let quoted = rest.trim_start().strip_prefix('"')?;
            let name = &quoted[..quoted.find('"')?];
            let name = name.rsplit('/').next().unwrap_or(name);
            is_valid_package_name(name).then(|| name.to_string())
        })
        .collect()
}

/// One name per line; blank lines and `#` comments ignored, trailing
/// comments stripped.
pub fn parse_simple_list(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.split('#').next().unwrap_or("").trim();
            is_valid_package_name(line).then(|| line.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universe_keeps_document_order() {
        let toml = r#"
["python@3.12"]
apt-pkg = "python3"

[zoxide]

[bat]
description = "cat clone"

[org]
"#;
        let names = parse_universe(toml).unwrap();
        assert_eq!(names, vec!["python@3.12", "zoxide", "bat"]);
    }

    #[test]
    fn test_universe_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("package_mappings.toml");
        assert!(matches!(
            load_universe(&missing),
            Err(MapError::UniverseMissing(_))
        ));

        std::fs::write(&missing, "[broken").unwrap();
        assert!(matches!(
            load_universe(&missing),
            Err(MapError::UniverseParse { .. })
        ));
    }

    #[test]
    fn test_brewfile() {
        let content = r#"
tap "homebrew/bundle"
brew "ripgrep"
brew "user/tools/special", args: ["HEAD"]
cask "wezterm"
# brew "commented"
mas "Xcode", id: 497799835
"#;
        let names = parse_brewfile(content);
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["ripgrep", "special", "wezterm"]
        );
    }

    #[test]
    fn test_simple_list() {
        let content = "# Archfile\nneovim\n\nyay  # AUR\n  fzf \ncom\n";
        let names = parse_simple_list(content);
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["fzf", "neovim", "yay"]
        );
    }

    #[test]
    fn test_list_format_by_file_name() {
        assert!(parse_package_list("Brewfile.in", "brew \"jq\"\n").contains("jq"));
        assert!(parse_package_list("Aptfile", "brew \"jq\"\n").contains("brew \"jq\""));
    }

    #[test]
    fn test_extend_universe_keeps_order() {
        let universe = vec!["zoxide".to_string(), "bat".to_string()];
        let lists: BTreeSet<String> = ["bat", "fd", "atuin"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            extend_universe(universe, &lists),
            vec!["zoxide", "bat", "atuin", "fd"]
        );
    }

    #[test]
    fn test_phantom_names() {
        assert!(!is_valid_package_name("org"));
        assert!(!is_valid_package_name("  "));
        assert!(is_valid_package_name("org.gnome.Boxes"));
    }
}
