//! Local Homebrew metadata.
//!
//! Repology knows *whether* Homebrew ships a package, but not which
//! platforms the bottle covers. When `brew` is installed we ask it directly
//! (`brew info --json=v2 <name>`) and overwrite the cached Homebrew fields
//! with its answer.
//!
//! This is augmentation only: a package is never added to the cache from
//! Homebrew alone, and a failed lookup never touches the Repology result.

use crate::cache::CacheStore;
use crate::error::{MapError, Result};
use crate::names::NameMappings;
use crate::platform::EcosystemKey;
use crate::record::{HomebrewMetadata, LookupStatus};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// What Homebrew reports for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrewPackage {
    pub metadata: HomebrewMetadata,
    pub description: Option<String>,
}

/// Source of Homebrew package metadata.
pub trait HomebrewLookup {
    /// Whether a usable Homebrew installation exists. Absence isn't an error.
    fn available(&self) -> bool;

    /// `Ok(None)` when Homebrew doesn't know the package.
    fn lookup(&self, name: &str) -> Result<Option<BrewPackage>>;
}

/// [`HomebrewLookup`] backed by the `brew` executable.
pub struct BrewCli {
    program: String,
    available: OnceLock<bool>,
}

impl BrewCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            available: OnceLock::new(),
        }
    }
}

impl Default for BrewCli {
    fn default() -> Self {
        Self::new("brew")
    }
}

impl HomebrewLookup for BrewCli {
    fn available(&self) -> bool {
        *self.available.get_or_init(|| {
            let found = Command::new(&self.program)
                .arg("--version")
                .output()
                .map(|output| output.status.success())
                .unwrap_or(false);
            debug!("{} available: {}", self.program, found);
            found
        })
    }

    fn lookup(&self, name: &str) -> Result<Option<BrewPackage>> {
        let output = Command::new(&self.program)
            .args(["info", "--json=v2", name])
            .output()
            .map_err(|e| MapError::Homebrew {
                package: name.to_string(),
                reason: format!("failed to run {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            debug!(
                "{} info {} exited with {}",
                self.program, name, output.status
            );
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_brew_info(&stdout).map_err(|e| MapError::Homebrew {
            package: name.to_string(),
            reason: format!("unexpected brew info output: {}", e),
        })
    }
}

#[derive(Deserialize)]
struct BrewInfo {
    #[serde(default)]
    formulae: Vec<BrewFormula>,
    #[serde(default)]
    casks: Vec<BrewCask>,
}

#[derive(Deserialize)]
struct BrewFormula {
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    bottle: Option<Bottle>,
    #[serde(default)]
    requirements: Vec<Requirement>,
}

#[derive(Deserialize)]
struct Bottle {
    #[serde(default)]
    stable: Option<BottleData>,
}

#[derive(Deserialize)]
struct BottleData {
    #[serde(default)]
    files: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct Requirement {
    name: String,
}

#[derive(Deserialize)]
struct BrewCask {
    #[serde(default)]
    desc: Option<String>,
}

/// Parse `brew info --json=v2` output. Formulae take precedence over casks.
pub fn parse_brew_info(json: &str) -> std::result::Result<Option<BrewPackage>, serde_json::Error> {
    let info: BrewInfo = serde_json::from_str(json)?;

    if let Some(formula) = info.formulae.into_iter().next() {
        let tags: Vec<String> = formula
            .bottle
            .and_then(|b| b.stable)
            .map(|s| s.files.into_keys().collect())
            .unwrap_or_default();
        let (mut supports_darwin, mut supports_linux) = bottle_support(&tags);

        for requirement in &formula.requirements {
            match requirement.name.as_str() {
                "macos" => supports_linux = false,
                "linux" => supports_darwin = false,
                _ => {}
            }
        }

        return Ok(Some(BrewPackage {
            metadata: HomebrewMetadata {
                supports_darwin,
                supports_linux,
                is_cask: false,
            },
            description: clean_desc(formula.desc),
        }));
    }

    Ok(info.casks.into_iter().next().map(|cask| BrewPackage {
        metadata: HomebrewMetadata::cask(),
        description: clean_desc(cask.desc),
    }))
}

/// Platform support implied by a formula's bottle tags.
///
/// `*_linux` tags cover Linux, any other tag a macOS release, `all` both.
/// A formula without bottles builds from source and is assumed to work on both.
pub fn bottle_support<S: AsRef<str>>(tags: &[S]) -> (bool, bool) {
    if tags.is_empty() {
        return (true, true);
    }

    let mut darwin = false;
    let mut linux = false;
    for tag in tags {
        match tag.as_ref() {
            "all" => {
                darwin = true;
                linux = true;
            }
            t if t.contains("linux") => linux = true,
            _ => darwin = true,
        }
    }
    (darwin, linux)
}

fn clean_desc(desc: Option<String>) -> Option<String> {
    desc.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())
}

/// What happened when augmenting one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AugmentOutcome {
    Updated,
    /// Homebrew doesn't know the package; record left as is
    Unknown,
    /// Nothing cached to augment
    NotCached,
    Unavailable,
    Failed(String),
}

/// Overwrite the cached Homebrew fields for `canonical` with Homebrew's answer.
///
/// Returns `Err` only if the updated record could not be persisted.
pub fn augment<H: HomebrewLookup + ?Sized>(
    brew: &H,
    canonical: &str,
    names: &NameMappings,
    store: &mut CacheStore,
) -> Result<AugmentOutcome> {
    if !brew.available() {
        return Ok(AugmentOutcome::Unavailable);
    }

    let Some((key, record)) = names.lookup(store, canonical) else {
        return Ok(AugmentOutcome::NotCached);
    };
    let mut record = record.clone();

    let package = match brew.lookup(canonical) {
        Ok(Some(package)) => package,
        Ok(None) => {
            debug!("{}: unknown to Homebrew", canonical);
            return Ok(AugmentOutcome::Unknown);
        }
        Err(e) => {
            warn!("{}: Homebrew metadata lookup failed: {}", canonical, e);
            return Ok(AugmentOutcome::Failed(e.to_string()));
        }
    };

    record.homebrew_metadata = Some(package.metadata);
    record.set_available(EcosystemKey::Homebrew, true);
    record.offer_name(EcosystemKey::Homebrew, canonical);
    if record.description.is_none() {
        record.description = package.description;
    }
    record.status = LookupStatus::Found;

    store.upsert(&key, record)?;
    Ok(AugmentOutcome::Updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottle_support() {
        assert_eq!(
            bottle_support(&["arm64_sequoia", "sonoma", "x86_64_linux"]),
            (true, true)
        );
        assert_eq!(bottle_support(&["arm64_sonoma", "ventura"]), (true, false));
        assert_eq!(bottle_support(&["arm64_linux"]), (false, true));
        assert_eq!(bottle_support(&["all"]), (true, true));
        assert_eq!(bottle_support::<&str>(&[]), (true, true));
    }

    #[test]
    fn test_parse_formula() {
        let json = r#"{
            "formulae": [{
                "name": "ripgrep",
                "desc": "Search tool like grep and The Silver Searcher",
                "bottle": { "stable": { "rebuild": 0, "files": {
                    "arm64_sequoia": { "cellar": ":any", "url": "u", "sha256": "s" },
                    "x86_64_linux": { "cellar": ":any", "url": "u", "sha256": "s" }
                } } }
            }],
            "casks": []
        }"#;
        let package = parse_brew_info(json).unwrap().unwrap();
        assert_eq!(package.metadata, HomebrewMetadata::formula());
        assert_eq!(
            package.description.as_deref(),
            Some("Search tool like grep and The Silver Searcher")
        );
    }

    #[test]
    fn test_parse_macos_only_requirement() {
        let json = r#"{
            "formulae": [{ "name": "mas", "desc": "", "requirements": [{ "name": "macos" }] }],
            "casks": []
        }"#;
        let package = parse_brew_info(json).unwrap().unwrap();
        assert!(package.metadata.supports_darwin);
        assert!(!package.metadata.supports_linux);
        assert_eq!(package.description, None);
    }

    #[test]
    fn test_parse_cask() {
        let json = r#"{ "formulae": [], "casks": [{ "token": "iterm2", "desc": "Terminal emulator" }] }"#;
        let package = parse_brew_info(json).unwrap().unwrap();
        assert_eq!(package.metadata, HomebrewMetadata::cask());
    }

    #[test]
    fn test_parse_empty_and_invalid() {
        assert_eq!(parse_brew_info(r#"{"formulae": [], "casks": []}"#).unwrap(), None);
        assert!(parse_brew_info("Error: No available formula").is_err());
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let brew = BrewCli::new("definitely-not-a-real-brew-binary");
        assert!(!brew.available());
        assert!(brew.lookup("ripgrep").is_err());
    }
}
