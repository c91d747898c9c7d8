//! Hand-maintained per-package overrides (`packages/custom_install.json`).
//!
//! These are not cached data: they describe how to install things that no
//! package manager ships, or that need special handling, and are merged into
//! the mapping table at generation time.
//!
//! ```json
//! {
//!   "packages": {
//!     "rustup": {
//!       "description": "Rust toolchain installer",
//!       "custom-install": { "default": ["curl ... | sh -s -- -y"] },
//!       "custom-install-priority": "fallback",
//!       "requires-confirmation": true,
//!       "install-condition": "! command -v rustup"
//!     }
//!   }
//! }
//! ```

use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// When a custom install command runs relative to package managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallPriority {
    /// Always use the custom command
    #[default]
    Always,
    /// Only when no package manager has it
    Fallback,
    Never,
}

impl fmt::Display for InstallPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstallPriority::Always => "always",
            InstallPriority::Fallback => "fallback",
            InstallPriority::Never => "never",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageOverride {
    #[serde(default)]
    pub description: Option<String>,
    /// Platform (`default`, `darwin`, `arch`, ...) to shell commands
    #[serde(default, deserialize_with = "deserialize_commands")]
    pub custom_install: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub custom_install_priority: InstallPriority,
    #[serde(default)]
    pub requires_confirmation: Option<bool>,
    #[serde(default)]
    pub install_condition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Overrides {
    #[serde(default)]
    packages: BTreeMap<String, PackageOverride>,
}

impl Overrides {
    /// Load overrides. A missing file means none; a malformed one is an error,
    /// since silently dropping custom installs would change the table.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no overrides at {}", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_packages(packages: BTreeMap<String, PackageOverride>) -> Self {
        Self { packages }
    }

    pub fn get(&self, name: &str) -> Option<&PackageOverride> {
        self.packages.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Accept either a single command string or a list per platform.
fn deserialize_commands<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Commands {
        One(String),
        Many(Vec<String>),
    }

    let raw = BTreeMap::<String, Commands>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(platform, commands)| {
            let commands = match commands {
                Commands::One(cmd) => vec![cmd],
                Commands::Many(cmds) => cmds,
            };
            (platform, commands)
        })
        .filter(|(_, commands)| !commands.is_empty())
        .collect())
}
