//! Durable package cache (`.repology_cache.json`).
//!
//! The whole file is read into memory, mutated, and rewritten on every
//! change. Writes go to a temporary file in the same directory which is then
//! renamed over the cache, so an interrupted run never leaves half a JSON
//! document behind.
//!
//! On disk every entry is a flat object: the [`PackageRecord`] fields plus a
//! `_timestamp` (Unix epoch seconds, float). Older tooling wrote two other
//! shapes which are still accepted on load:
//!
//! ```json
//! { "ripgrep": { "_timestamp": 1700000000.0, "data": { "platforms": { ... } } } }
//! { "unknown": { "_timestamp": 1700000000.0, "data": null } }
//! ```
//!
//! Only one process should write a given cache file at a time.

use crate::error::{MapError, Result};
use crate::platform::EcosystemKey;
use crate::record::{HomebrewMetadata, LookupStatus, PackageRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const TIMESTAMP_KEY: &str = "_timestamp";
const LEGACY_DATA_KEY: &str = "data";

/// Current Unix time in seconds, with sub-second precision.
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// In-memory view of one cache file.
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    entries: BTreeMap<String, PackageRecord>,
}

#[derive(Serialize)]
struct StoredEntry<'a> {
    #[serde(flatten)]
    record: &'a PackageRecord,
    #[serde(rename = "_timestamp")]
    timestamp: f64,
}

/// Payload as it may appear in any historical cache shape.
#[derive(Deserialize, Default)]
#[serde(default)]
struct RawRecord {
    status: Option<LookupStatus>,
    platforms: BTreeMap<String, bool>,
    package_names: BTreeMap<String, Option<String>>,
    description: Option<String>,
    homebrew_metadata: Option<HomebrewMetadata>,
    #[serde(rename = "brew-supports-darwin")]
    brew_supports_darwin: Option<bool>,
    #[serde(rename = "brew-supports-linux")]
    brew_supports_linux: Option<bool>,
    #[serde(rename = "brew-is-cask")]
    brew_is_cask: Option<bool>,
}

impl CacheStore {
    /// An empty store that will be written to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the cache file.
    ///
    /// A missing file is an empty cache. A file that isn't valid JSON (or
    /// isn't UTF-8 at all) is also treated as empty, with a warning, so a
    /// corrupted cache costs a refresh, not the run. Any other read error is
    /// fatal.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = match std::fs::read(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no cache at {}, starting empty", path.display());
                return Ok(Self::new(path));
            }
            Err(e) => return Err(e.into()),
        };

        let entries = match serde_json::from_slice::<Value>(&content) {
            Ok(Value::Object(map)) => map
                .into_iter()
                .filter_map(|(name, value)| {
                    let record = normalize_entry(&name, value)?;
                    Some((name, record))
                })
                .collect(),
            Ok(_) => {
                warn!(
                    "cache {} is not a JSON object, treating as empty",
                    path.display()
                );
                BTreeMap::new()
            }
            Err(e) => {
                warn!(
                    "cache {} is malformed ({}), treating as empty",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }
        };

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PackageRecord)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Serialize the full map back to disk atomically.
    pub fn save(&self) -> Result<()> {
        let stored: BTreeMap<&str, StoredEntry<'_>> = self
            .entries
            .iter()
            .map(|(name, record)| {
                (
                    name.as_str(),
                    StoredEntry {
                        record,
                        timestamp: record.last_refreshed,
                    },
                )
            })
            .collect();

        let mut json = serde_json::to_string_pretty(&stored)?;
        json.push('\n');
        write_atomic(&self.path, json.as_bytes()).map_err(|source| MapError::CacheWrite {
            path: self.path.clone(),
            source,
        })
    }

    /// Insert or replace `name`, stamp it with the current time, and persist.
    pub fn upsert(&mut self, name: &str, record: PackageRecord) -> Result<&PackageRecord> {
        self.upsert_at(name, record, now_timestamp())
    }

    /// [`upsert`](Self::upsert) with an explicit timestamp.
    pub fn upsert_at(
        &mut self,
        name: &str,
        mut record: PackageRecord,
        timestamp: f64,
    ) -> Result<&PackageRecord> {
        record.last_refreshed = timestamp;
        self.entries.insert(name.to_string(), record);
        self.save()?;
        Ok(&self.entries[name])
    }

    /// Remove `name` and persist. Returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> Result<bool> {
        if self.entries.remove(name).is_some() {
            self.save()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Drop entries from memory only, handing them back so they can be
    /// [`restore`](Self::restore)d if the replacement lookup fails.
    pub fn evict(&mut self, names: &[String]) -> Vec<(String, PackageRecord)> {
        names
            .iter()
            .filter_map(|name| {
                let record = self.entries.remove(name)?;
                debug!("evicted cache entry {}", name);
                Some((name.clone(), record))
            })
            .collect()
    }

    /// Put evicted entries back without touching disk or timestamps.
    pub fn restore(&mut self, evicted: Vec<(String, PackageRecord)>) {
        for (name, record) in evicted {
            self.entries.entry(name).or_insert(record);
        }
    }

    /// Forget everything and delete the cache file.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MapError::CacheWrite {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn stats(&self, now: f64, ttl: Duration) -> CacheStats {
        let ttl = ttl.as_secs_f64();
        let mut stats = CacheStats {
            total: self.entries.len(),
            daily_quota: (self.entries.len() / 7).max(1),
            file_size: std::fs::metadata(&self.path).ok().map(|m| m.len()),
            ..CacheStats::default()
        };

        for record in self.entries.values() {
            if record.last_refreshed <= 0.0 {
                stats.never_refreshed += 1;
            } else if record.age(now) <= ttl {
                stats.fresh += 1;
            } else {
                stats.expired += 1;
            }
            if record.is_negative() {
                stats.negative += 1;
            }
        }

        stats
    }

    /// Remove expired (and optionally negative) entries, then persist.
    pub fn prune(&mut self, now: f64, ttl: Duration, drop_negative: bool) -> Result<PruneReport> {
        let ttl = ttl.as_secs_f64();
        let mut report = PruneReport::default();

        self.entries.retain(|name, record| {
            if drop_negative && record.is_negative() {
                debug!("pruning negative entry {}", name);
                report.negative_removed += 1;
                false
            } else if record.age(now) > ttl {
                debug!("pruning expired entry {}", name);
                report.expired_removed += 1;
                false
            } else {
                true
            }
        });
        report.kept = self.entries.len();

        if report.removed() > 0 {
            self.save()?;
        }
        Ok(report)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub fresh: usize,
    pub expired: usize,
    pub never_refreshed: usize,
    pub negative: usize,
    pub file_size: Option<u64>,
    /// Entries one daily segment refreshes
    pub daily_quota: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub kept: usize,
    pub expired_removed: usize,
    pub negative_removed: usize,
}

impl PruneReport {
    pub fn removed(&self) -> usize {
        self.expired_removed + self.negative_removed
    }
}

/// Replace `path` with `contents` via a temporary file in the same directory.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read any historical entry shape into a [`PackageRecord`].
fn normalize_entry(name: &str, value: Value) -> Option<PackageRecord> {
    let Value::Object(mut obj) = value else {
        warn!("skipping cache entry {}: not an object", name);
        return None;
    };

    let timestamp = obj
        .remove(TIMESTAMP_KEY)
        .and_then(|t| t.as_f64())
        .unwrap_or(0.0);

    let payload = match obj.remove(LEGACY_DATA_KEY) {
        Some(Value::Null) => {
            let mut record = PackageRecord::not_found();
            record.last_refreshed = timestamp;
            return Some(record);
        }
        Some(data @ Value::Object(_)) => data,
        Some(other) => {
            warn!(
                "skipping cache entry {}: unexpected legacy payload {}",
                name, other
            );
            return None;
        }
        None => Value::Object(obj),
    };

    let raw: RawRecord = match serde_json::from_value(payload) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("skipping cache entry {}: {}", name, e);
            return None;
        }
    };

    let mut record = PackageRecord::empty();
    for (key, available) in &raw.platforms {
        match key.parse::<EcosystemKey>() {
            Ok(k) => record.set_available(k, *available),
            Err(_) => debug!("{}: ignoring unknown platform key {}", name, key),
        }
    }

    for (key, pkg) in raw.package_names {
        let Some(pkg) = pkg.filter(|p| !p.is_empty()) else {
            continue;
        };
        for target in legacy_name_targets(&key, &record) {
            record.offer_name(target, &pkg);
        }
    }

    record.description = raw.description.filter(|d| !d.trim().is_empty());
    record.homebrew_metadata = raw.homebrew_metadata.or(
        match (
            raw.brew_supports_darwin,
            raw.brew_supports_linux,
            raw.brew_is_cask,
        ) {
            (None, None, None) => None,
            (darwin, linux, cask) => Some(HomebrewMetadata {
                supports_darwin: darwin.unwrap_or(false),
                supports_linux: linux.unwrap_or(false),
                is_cask: cask.unwrap_or(false),
            }),
        },
    );

    record.status = raw.status.unwrap_or_else(|| {
        // Entries written before the explicit tag: all-false with no
        // description was the only way a negative result was stored.
        if !record.any_available() && record.description.is_none() {
            LookupStatus::NotFound
        } else {
            LookupStatus::Found
        }
    });
    record.complete_keys();
    record.last_refreshed = timestamp;
    Some(record)
}

/// Ecosystem keys a `package_names` key applies to, including old aliases.
fn legacy_name_targets(key: &str, record: &PackageRecord) -> Vec<EcosystemKey> {
    if let Ok(k) = key.parse::<EcosystemKey>() {
        return vec![k];
    }
    match key {
        "apt" => vec![EcosystemKey::Debian, EcosystemKey::Ubuntu],
        "arch" => {
            if !record.is_available(EcosystemKey::ArchOfficial)
                && record.is_available(EcosystemKey::ArchAur)
            {
                vec![EcosystemKey::ArchAur]
            } else {
                vec![EcosystemKey::ArchOfficial]
            }
        }
        _ => Vec::new(),
    }
}
