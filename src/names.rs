//! Homebrew-to-Repology name remapping.
//!
//! Homebrew and Repology don't always agree on a project's name (`jj` vs
//! `jujutsu`, `python@3.12` vs `python`). `package_name_mappings.json` lists
//! the exceptions:
//!
//! ```json
//! {
//!   "homebrew_to_repology": { "jj": "jujutsu" },
//!   "aliases": { "neovim": ["nvim"] }
//! }
//! ```
//!
//! Whenever a mapping exists the cache is keyed by the mapped name, so lookups
//! under either spelling converge on one record. Aliases are other Repology
//! projects to try when the query name itself turns up nothing useful; their
//! data is still cached under the package's own key.

use crate::cache::CacheStore;
use crate::error::Result;
use crate::record::PackageRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameMappings {
    #[serde(default)]
    homebrew_to_repology: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    aliases: BTreeMap<String, Vec<String>>,
}

impl NameMappings {
    /// Load the mapping file. A missing or malformed file means "no remapping".
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no name mappings at {}", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&content) {
            Ok(mappings) => Ok(mappings),
            Err(e) => {
                warn!(
                    "name mappings {} are malformed ({}), ignoring them",
                    path.display(),
                    e
                );
                Ok(Self::default())
            }
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            homebrew_to_repology: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            aliases: BTreeMap::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, canonical: &str, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.insert(
            canonical.to_string(),
            aliases.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Fallback Repology projects for `canonical`, in the order to try them.
    pub fn aliases_for(&self, canonical: &str) -> &[String] {
        self.aliases
            .get(canonical)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.homebrew_to_repology.len()
    }

    pub fn is_empty(&self) -> bool {
        self.homebrew_to_repology.is_empty() && self.aliases.is_empty()
    }

    pub fn mapped_name(&self, canonical: &str) -> Option<&str> {
        self.homebrew_to_repology.get(canonical).map(String::as_str)
    }

    /// Name to send to Repology.
    pub fn resolve_query_name<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.mapped_name(canonical).unwrap_or(canonical)
    }

    /// Name the cache record lives under. Same rule as the query name, but
    /// kept separate because the two answer different questions.
    pub fn resolve_cache_key<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.mapped_name(canonical).unwrap_or(canonical)
    }

    /// Every cache key a canonical name may have been stored under, preferred
    /// key first.
    pub fn cache_keys(&self, canonical: &str) -> Vec<String> {
        let mut keys = vec![self.resolve_cache_key(canonical).to_string()];
        if keys[0] != canonical {
            keys.push(canonical.to_string());
        }
        keys
    }

    /// Canonical names that map onto `query_name`.
    pub fn canonical_names_for(&self, query_name: &str) -> Vec<&str> {
        self.homebrew_to_repology
            .iter()
            .filter(|(_, v)| v.as_str() == query_name)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Find the cached record for `canonical`, checking the mapped name and
    /// the canonical name. The mapped entry wins when both exist.
    pub fn lookup<'s>(
        &self,
        store: &'s CacheStore,
        canonical: &str,
    ) -> Option<(String, &'s PackageRecord)> {
        let mapped = self
            .mapped_name(canonical)
            .and_then(|m| store.get(m).map(|r| (m, r)));
        let direct = store.get(canonical);

        match (mapped, direct) {
            (Some((key, record)), Some(_)) => {
                info!(
                    "{}: cache has entries under both '{}' and '{}', using '{}'",
                    canonical, key, canonical, key
                );
                Some((key.to_string(), record))
            }
            (Some((key, record)), None) => Some((key.to_string(), record)),
            (None, Some(record)) => Some((canonical.to_string(), record)),
            (None, None) => None,
        }
    }
}
