//! Repology API client.
//!
//! [Repology](https://repology.org) aggregates package metadata from hundreds
//! of repositories. One request to `/api/v1/project/<name>` returns every
//! repository entry for a project; [`parse_project`] folds that list into a
//! [`PackageRecord`] for the seven ecosystems we track.
//!
//! # Outcomes
//!
//! - **200** with entries: a positive record, cached.
//! - **404** (or 200 with an empty list): a negative record, cached the same
//!   way so the name isn't re-queried until its refresh turn.
//! - Anything else (rate limiting, 5xx, timeouts, unparsable bodies): a soft
//!   error. Nothing is cached and the caller moves on.
//!
//! When the answer carries no useful data, any aliases listed in the name
//! mapping file are queried too and the most complete one is cached instead.
//!
//! Repology asks clients to identify themselves and to stay around one
//! request per second; the client sets a User-Agent and the refresh scheduler
//! sleeps between packages.
//!
//! # Examples
//!
//! ```no_run
//! use pkgmap::cache::CacheStore;
//! use pkgmap::config::Settings;
//! use pkgmap::names::NameMappings;
//! use pkgmap::repology::RepologyClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RepologyClient::new(&Settings::default())?;
//!     let mut store = CacheStore::load(".repology_cache.json")?;
//!     let outcome = client
//!         .query("ripgrep", &NameMappings::default(), &mut store)
//!         .await?;
//!     println!("{:?}", outcome.record());
//!     Ok(())
//! }
//! ```

use crate::cache::{CacheStore, now_timestamp};
use crate::config::Settings;
use crate::error::Result;
use crate::names::NameMappings;
use crate::platform::EcosystemKey;
use crate::record::{HomebrewMetadata, PackageRecord};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One repository's entry for a project.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepologyEntry {
    /// Repository identifier (`arch`, `debian_12`, `homebrew_casks`, ...)
    pub repo: String,
    #[serde(default)]
    pub binname: Option<String>,
    #[serde(default)]
    pub srcname: Option<String>,
    #[serde(default)]
    pub visiblename: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl RepologyEntry {
    /// Installable name, falling back from `binname` to `srcname` to `visiblename`.
    pub fn package_name(&self) -> Option<&str> {
        [&self.binname, &self.srcname, &self.visiblename]
            .into_iter()
            .filter_map(|n| n.as_deref())
            .find(|n| !n.is_empty())
    }
}

/// The repositories we care about, as Repology names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoTarget {
    ArchOfficial,
    Aur,
    Debian,
    Ubuntu,
    Fedora,
    HomebrewFormula,
    HomebrewCask,
    Flathub,
}

impl RepoTarget {
    pub fn classify(repo: &str) -> Option<Self> {
        let repo = repo.to_ascii_lowercase();
        match repo.as_str() {
            "arch" => return Some(RepoTarget::ArchOfficial),
            "aur" => return Some(RepoTarget::Aur),
            "homebrew" => return Some(RepoTarget::HomebrewFormula),
            "homebrew_casks" => return Some(RepoTarget::HomebrewCask),
            "flathub" => return Some(RepoTarget::Flathub),
            _ => {}
        }

        if repo.starts_with("debian") {
            Some(RepoTarget::Debian)
        } else if repo.starts_with("ubuntu") {
            Some(RepoTarget::Ubuntu)
        } else if repo.starts_with("fedora") {
            Some(RepoTarget::Fedora)
        } else {
            None
        }
    }

    pub fn ecosystem(&self) -> EcosystemKey {
        match self {
            RepoTarget::ArchOfficial => EcosystemKey::ArchOfficial,
            RepoTarget::Aur => EcosystemKey::ArchAur,
            RepoTarget::Debian => EcosystemKey::Debian,
            RepoTarget::Ubuntu => EcosystemKey::Ubuntu,
            RepoTarget::Fedora => EcosystemKey::Fedora,
            RepoTarget::HomebrewFormula | RepoTarget::HomebrewCask => EcosystemKey::Homebrew,
            RepoTarget::Flathub => EcosystemKey::Flatpak,
        }
    }
}

/// Fold a project's repository entries into one record.
///
/// First-seen name per ecosystem wins, the first non-empty summary becomes
/// the description, and the first Homebrew entry decides formula vs cask.
pub fn parse_project(entries: &[RepologyEntry]) -> PackageRecord {
    if entries.is_empty() {
        return PackageRecord::not_found();
    }

    let mut record = PackageRecord::empty();
    for entry in entries {
        if record.description.is_none()
            && let Some(summary) = entry.summary.as_deref().map(str::trim)
            && !summary.is_empty()
        {
            record.description = Some(summary.to_string());
        }

        let Some(target) = RepoTarget::classify(&entry.repo) else {
            continue;
        };
        let key = target.ecosystem();
        record.set_available(key, true);
        if let Some(name) = entry.package_name() {
            record.offer_name(key, name);
        }

        match target {
            RepoTarget::HomebrewFormula => {
                record
                    .homebrew_metadata
                    .get_or_insert_with(HomebrewMetadata::formula);
            }
            RepoTarget::HomebrewCask => {
                record
                    .homebrew_metadata
                    .get_or_insert_with(HomebrewMetadata::cask);
            }
            _ => {}
        }
    }

    record
}

/// Result of one [`RepologyClient::query`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Served from a fresh cache entry, no request made
    Cached(PackageRecord),
    Found(PackageRecord),
    /// Confirmed absence, cached as a negative record
    NotFound(PackageRecord),
    /// Transient failure; nothing was cached
    SoftError(String),
}

impl QueryOutcome {
    pub fn record(&self) -> Option<&PackageRecord> {
        match self {
            QueryOutcome::Cached(r) | QueryOutcome::Found(r) | QueryOutcome::NotFound(r) => {
                Some(r)
            }
            QueryOutcome::SoftError(_) => None,
        }
    }
}

enum ProjectResponse {
    Entries(Vec<RepologyEntry>),
    Missing,
}

/// Repology API client bound to one base URL.
#[derive(Clone)]
pub struct RepologyClient {
    client: reqwest::Client,
    base_url: Url,
    cache_ttl: Duration,
}

impl RepologyClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone())
            .build()?;

        let base_url = Url::parse(&settings.repology_url).map_err(|e| {
            anyhow::anyhow!("invalid Repology URL '{}': {}", settings.repology_url, e)
        })?;

        Ok(Self {
            client,
            base_url,
            cache_ttl: settings.cache_ttl,
        })
    }

    /// `<base>/api/v1/project/<name>`, with `name` escaped as one path segment.
    pub fn project_url(&self, name: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Repology URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(["api", "v1", "project", name]);
        Ok(url)
    }

    /// Look up `canonical`, answering from the cache when a fresh entry
    /// exists under either its mapped or canonical name.
    ///
    /// Returns `Err` only when the result could not be persisted.
    pub async fn query(
        &self,
        canonical: &str,
        names: &NameMappings,
        store: &mut CacheStore,
    ) -> Result<QueryOutcome> {
        let now = now_timestamp();
        let ttl = self.cache_ttl.as_secs_f64();
        for key in names.cache_keys(canonical) {
            if let Some(record) = store.get(&key)
                && record.age(now) < ttl
            {
                debug!("{}: fresh cache entry under '{}'", canonical, key);
                return Ok(QueryOutcome::Cached(record.clone()));
            }
        }

        self.fetch(canonical, names, store).await
    }

    /// Query the API unconditionally and persist the result.
    pub async fn fetch(
        &self,
        canonical: &str,
        names: &NameMappings,
        store: &mut CacheStore,
    ) -> Result<QueryOutcome> {
        let query_name = names.resolve_query_name(canonical);
        let cache_key = names.resolve_cache_key(canonical);
        if query_name != canonical {
            info!("{}: querying Repology as '{}'", canonical, query_name);
        }

        let response = match self.fetch_project(query_name).await {
            Ok(response) => response,
            Err(reason) => {
                warn!("{}: Repology lookup failed: {}", canonical, reason);
                return Ok(QueryOutcome::SoftError(reason));
            }
        };

        let mut record = match response {
            ProjectResponse::Missing => PackageRecord::not_found(),
            ProjectResponse::Entries(entries) => parse_project(&entries),
        };
        if !record.has_useful_data()
            && let Some((alias, best)) = self.best_alias(canonical, names).await
        {
            info!("{}: using Repology data from alias '{}'", canonical, alias);
            record = best;
        }

        let stored = store.upsert(cache_key, record)?.clone();
        if stored.is_negative() {
            debug!("{}: not known to Repology", canonical);
            Ok(QueryOutcome::NotFound(stored))
        } else {
            Ok(QueryOutcome::Found(stored))
        }
    }

    /// Query every alias of `canonical` and keep the most complete useful
    /// answer. Failed or empty alias lookups are skipped.
    async fn best_alias(
        &self,
        canonical: &str,
        names: &NameMappings,
    ) -> Option<(String, PackageRecord)> {
        let mut best: Option<(String, PackageRecord)> = None;
        for alias in names.aliases_for(canonical) {
            let record = match self.fetch_project(alias).await {
                Ok(ProjectResponse::Entries(entries)) => parse_project(&entries),
                Ok(ProjectResponse::Missing) => continue,
                Err(reason) => {
                    warn!("{}: alias '{}' lookup failed: {}", canonical, alias, reason);
                    continue;
                }
            };
            if !record.has_useful_data() {
                continue;
            }
            if best
                .as_ref()
                .is_none_or(|(_, current)| record.completeness() > current.completeness())
            {
                best = Some((alias.clone(), record));
            }
        }
        best
    }

    async fn fetch_project(&self, name: &str) -> std::result::Result<ProjectResponse, String> {
        let url = self.project_url(name).map_err(|e| e.to_string())?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| describe_transport_error(&e))?;

        match response.status() {
            StatusCode::OK => {
                let entries: Vec<RepologyEntry> = response
                    .json()
                    .await
                    .map_err(|e| format!("unreadable response body: {}", e))?;
                Ok(ProjectResponse::Entries(entries))
            }
            StatusCode::NOT_FOUND => Ok(ProjectResponse::Missing),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                Err(format!("rate limited (HTTP {})", response.status().as_u16()))
            }
            status => Err(format!("HTTP {}", status.as_u16())),
        }
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(repo: &str, binname: Option<&str>, summary: Option<&str>) -> RepologyEntry {
        RepologyEntry {
            repo: repo.to_string(),
            binname: binname.map(String::from),
            summary: summary.map(String::from),
            ..RepologyEntry::default()
        }
    }

    #[test]
    fn test_classify_repositories() {
        assert_eq!(RepoTarget::classify("arch"), Some(RepoTarget::ArchOfficial));
        assert_eq!(RepoTarget::classify("aur"), Some(RepoTarget::Aur));
        assert_eq!(RepoTarget::classify("debian_12"), Some(RepoTarget::Debian));
        assert_eq!(
            RepoTarget::classify("debian_unstable"),
            Some(RepoTarget::Debian)
        );
        assert_eq!(RepoTarget::classify("ubuntu_24_04"), Some(RepoTarget::Ubuntu));
        assert_eq!(RepoTarget::classify("fedora_rawhide"), Some(RepoTarget::Fedora));
        assert_eq!(
            RepoTarget::classify("homebrew"),
            Some(RepoTarget::HomebrewFormula)
        );
        assert_eq!(
            RepoTarget::classify("homebrew_casks"),
            Some(RepoTarget::HomebrewCask)
        );
        assert_eq!(RepoTarget::classify("flathub"), Some(RepoTarget::Flathub));

        // Prefix-only rules apply to the distro families, not to arch
        assert_eq!(RepoTarget::classify("arch_testing"), None);
        assert_eq!(RepoTarget::classify("alpine_edge"), None);
        assert_eq!(RepoTarget::classify("nix_unstable"), None);
    }

    #[test]
    fn test_cask_entry() {
        let record = parse_project(&[entry("homebrew_casks", Some("foo-app"), Some("A tool"))]);
        assert!(record.is_available(EcosystemKey::Homebrew));
        assert_eq!(record.package_name(EcosystemKey::Homebrew), Some("foo-app"));
        assert_eq!(record.description.as_deref(), Some("A tool"));
        let meta = record.homebrew_metadata.unwrap();
        assert!(meta.is_cask);
        assert!(!meta.supports_linux);
        assert!(meta.supports_darwin);
    }

    #[test]
    fn test_first_binname_and_summary_win() {
        let record = parse_project(&[
            entry("alpine_edge", Some("rg"), None),
            entry("debian_12", Some("ripgrep"), Some("")),
            entry("debian_13", Some("ripgrep-new"), Some("  Fast grep  ")),
            entry("arch", Some("ripgrep"), Some("Other summary")),
            entry("homebrew", Some("ripgrep"), None),
        ]);
        assert_eq!(record.package_name(EcosystemKey::Debian), Some("ripgrep"));
        assert_eq!(record.description.as_deref(), Some("Fast grep"));
        assert!(record.is_available(EcosystemKey::ArchOfficial));
        assert!(!record.is_available(EcosystemKey::ArchAur));
        assert!(!record.is_available(EcosystemKey::Flatpak));
        assert_eq!(record.homebrew_metadata, Some(HomebrewMetadata::formula()));
        assert!(!record.is_negative());
    }

    #[test]
    fn test_formula_seen_before_cask_keeps_formula_metadata() {
        let record = parse_project(&[
            entry("homebrew", Some("wezterm"), None),
            entry("homebrew_casks", Some("wezterm"), None),
        ]);
        assert!(!record.homebrew_metadata.unwrap().is_cask);
    }

    #[test]
    fn test_srcname_fallback() {
        let mut e = entry("fedora_40", None, None);
        e.srcname = Some("rust-ripgrep".into());
        e.visiblename = Some("ripgrep".into());
        let record = parse_project(&[e]);
        assert_eq!(record.package_name(EcosystemKey::Fedora), Some("rust-ripgrep"));
    }

    #[test]
    fn test_empty_project_is_negative() {
        assert!(parse_project(&[]).is_negative());
    }

    #[test]
    fn test_project_url_escapes_name() {
        let settings = Settings {
            repology_url: "http://127.0.0.1:9/".into(),
            ..Settings::default()
        };
        let client = RepologyClient::new(&settings).unwrap();
        assert_eq!(
            client.project_url("python@3.12").unwrap().as_str(),
            "http://127.0.0.1:9/api/v1/project/python@3.12"
        );
        assert_eq!(
            client.project_url("user/tap/tool").unwrap().as_str(),
            "http://127.0.0.1:9/api/v1/project/user%2Ftap%2Ftool"
        );
    }
}
