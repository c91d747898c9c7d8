//! Cached per-package availability data.

use crate::platform::EcosystemKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether the aggregation service knew the package at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStatus {
    #[default]
    Found,
    /// Confirmed absence (negative cache entry)
    NotFound,
}

/// Homebrew-specific support flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomebrewMetadata {
    pub supports_darwin: bool,
    pub supports_linux: bool,
    pub is_cask: bool,
}

impl HomebrewMetadata {
    pub fn formula() -> Self {
        Self {
            supports_darwin: true,
            supports_linux: true,
            is_cask: false,
        }
    }

    pub fn cask() -> Self {
        Self {
            supports_darwin: true,
            supports_linux: false,
            is_cask: true,
        }
    }
}

/// One cache entry. Every record carries all seven ecosystem keys in both maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    #[serde(default)]
    pub status: LookupStatus,
    pub platforms: BTreeMap<EcosystemKey, bool>,
    pub package_names: BTreeMap<EcosystemKey, Option<String>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homebrew_metadata: Option<HomebrewMetadata>,
    /// Unix time of the last successful write, 0.0 if never written
    #[serde(skip)]
    pub last_refreshed: f64,
}

impl PackageRecord {
    /// A positive record with nothing filled in yet.
    pub fn empty() -> Self {
        Self {
            status: LookupStatus::Found,
            platforms: EcosystemKey::ALL.into_iter().map(|k| (k, false)).collect(),
            package_names: EcosystemKey::ALL.into_iter().map(|k| (k, None)).collect(),
            description: None,
            homebrew_metadata: None,
            last_refreshed: 0.0,
        }
    }

    /// A confirmed "not found" result.
    pub fn not_found() -> Self {
        Self {
            status: LookupStatus::NotFound,
            ..Self::empty()
        }
    }

    pub fn is_negative(&self) -> bool {
        self.status == LookupStatus::NotFound
    }

    pub fn is_available(&self, key: EcosystemKey) -> bool {
        self.platforms.get(&key).copied().unwrap_or(false)
    }

    pub fn package_name(&self, key: EcosystemKey) -> Option<&str> {
        self.package_names
            .get(&key)
            .and_then(|n| n.as_deref())
            .filter(|n| !n.is_empty())
    }

    pub fn set_available(&mut self, key: EcosystemKey, available: bool) {
        self.platforms.insert(key, available);
    }

    /// Record a name for `key` unless one is already known (first seen wins).
    pub fn offer_name(&mut self, key: EcosystemKey, name: &str) {
        let slot = self.package_names.entry(key).or_insert(None);
        if slot.is_none() && !name.is_empty() {
            *slot = Some(name.to_string());
        }
    }

    pub fn any_available(&self) -> bool {
        self.platforms.values().any(|v| *v)
    }

    /// Whether a lookup turned up anything worth keeping.
    pub fn has_useful_data(&self) -> bool {
        !self.is_negative()
            && (self.any_available()
                || self.package_names.values().any(Option::is_some)
                || self.description.is_some())
    }

    /// Ranking used to pick between alternative lookups: available
    /// ecosystems, then known names, then whether there is a description.
    pub fn completeness(&self) -> (usize, usize, bool) {
        (
            self.platforms.values().filter(|v| **v).count(),
            self.package_names.values().filter(|n| n.is_some()).count(),
            self.description.is_some(),
        )
    }

    /// Fill in any keys missing from either map.
    pub(crate) fn complete_keys(&mut self) {
        for key in EcosystemKey::ALL {
            self.platforms.entry(key).or_insert(false);
            self.package_names.entry(key).or_insert(None);
        }
    }

    /// Seconds since the last refresh; never-refreshed records are infinitely old.
    pub fn age(&self, now: f64) -> f64 {
        if self.last_refreshed <= 0.0 {
            f64::INFINITY
        } else {
            (now - self.last_refreshed).max(0.0)
        }
    }
}

impl Default for PackageRecord {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record_has_every_key() {
        let record = PackageRecord::empty();
        assert_eq!(record.platforms.len(), 7);
        assert_eq!(record.package_names.len(), 7);
        assert!(!record.any_available());
        assert!(!record.is_negative());
    }

    #[test]
    fn test_not_found_is_tagged() {
        let record = PackageRecord::not_found();
        assert!(record.is_negative());
        assert!(!record.any_available());
    }

    #[test]
    fn test_useful_data_and_completeness() {
        assert!(!PackageRecord::empty().has_useful_data());
        assert!(!PackageRecord::not_found().has_useful_data());

        let mut described = PackageRecord::empty();
        described.description = Some("Wayland screenshots".into());
        assert!(described.has_useful_data());

        let mut packaged = PackageRecord::empty();
        packaged.set_available(EcosystemKey::ArchOfficial, true);
        packaged.offer_name(EcosystemKey::ArchOfficial, "grim");
        assert!(packaged.completeness() > described.completeness());
    }

    #[test]
    fn test_first_name_wins() {
        let mut record = PackageRecord::empty();
        record.offer_name(EcosystemKey::Debian, "ripgrep");
        record.offer_name(EcosystemKey::Debian, "rust-ripgrep");
        record.offer_name(EcosystemKey::Fedora, "");
        assert_eq!(record.package_name(EcosystemKey::Debian), Some("ripgrep"));
        assert_eq!(record.package_name(EcosystemKey::Fedora), None);
    }

    #[test]
    fn test_age() {
        let mut record = PackageRecord::empty();
        assert!(record.age(1000.0).is_infinite());
        record.last_refreshed = 400.0;
        assert_eq!(record.age(1000.0), 600.0);
        // Clock skew never yields a negative age
        assert_eq!(record.age(100.0), 0.0);
    }

    #[test]
    fn test_serialized_keys_are_snake_case() {
        let mut record = PackageRecord::empty();
        record.set_available(EcosystemKey::ArchAur, true);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["platforms"]["arch_aur"], true);
        assert_eq!(json["status"], "found");
        assert!(json.get("homebrew_metadata").is_none());
        assert!(json.get("last_refreshed").is_none());
    }
}
