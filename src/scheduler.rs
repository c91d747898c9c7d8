//! Segmented, rate-limited refresh of the package cache.
//!
//! The universe is refreshed over a seven-day cycle. Each day takes one
//! segment of a staleness ordering (oldest and never-cached first):
//! `segment_size = max(1, total / 7)`, segments 0 to 5 take exactly that many
//! names and segment 6 takes whatever is left.
//!
//! Refreshing a package makes it the freshest entry, so re-sorting every day
//! would shuffle names between segments. The ordering is therefore computed
//! once per cycle (by segment 0, or by whichever segment finds none) and kept
//! next to the cache as a [`CyclePlan`].

use crate::cache::{CacheStore, now_timestamp, write_atomic};
use crate::error::{MapError, Result};
use crate::homebrew::{self, AugmentOutcome, HomebrewLookup};
use crate::names::NameMappings;
use crate::repology::{QueryOutcome, RepologyClient};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SEGMENTS: u8 = 7;

/// Which part of the universe a refresh run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// One day's slice, 0 through 6
    Day(u8),
    /// Everything, after wiping the cache
    All,
}

impl FromStr for Segment {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Segment::All);
        }
        match s.parse::<u8>() {
            Ok(day) if day < SEGMENTS => Ok(Segment::Day(day)),
            _ => Err(MapError::InvalidSegment(s.to_string())),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Day(day) => write!(f, "{}", day),
            Segment::All => f.write_str("all"),
        }
    }
}

pub fn segment_size(total: usize) -> usize {
    (total / SEGMENTS as usize).max(1)
}

/// Index range of `day` within an ordering of `total` names, using segments
/// of `size`. The last day takes everything that remains.
pub fn segment_bounds(total: usize, size: usize, day: u8) -> Range<usize> {
    let start = (day as usize * size).min(total);
    let end = if day + 1 >= SEGMENTS {
        total
    } else {
        (start + size).min(total)
    };
    start..end
}

/// `universe` sorted oldest first. Never-cached names are infinitely old;
/// ties keep universe order.
pub fn order_by_staleness(
    universe: &[String],
    store: &CacheStore,
    names: &NameMappings,
    now: f64,
) -> Vec<String> {
    let mut aged: Vec<(&String, f64)> = universe
        .iter()
        .map(|name| {
            let age = names
                .lookup(store, name)
                .map(|(_, record)| record.age(now))
                .unwrap_or(f64::INFINITY);
            (name, age)
        })
        .collect();

    aged.sort_by(|a, b| b.1.total_cmp(&a.1));
    aged.into_iter().map(|(name, _)| name.clone()).collect()
}

/// The staleness ordering fixed for the current cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CyclePlan {
    pub created: f64,
    pub order: Vec<String>,
}

impl CyclePlan {
    pub fn build(universe: &[String], store: &CacheStore, names: &NameMappings, now: f64) -> Self {
        Self {
            created: now,
            order: order_by_staleness(universe, store, names, now),
        }
    }

    /// Read a saved plan. Missing or unreadable plans are treated as absent.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&content) {
            Ok(plan) => Ok(Some(plan)),
            Err(e) => {
                warn!("ignoring malformed cycle plan {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes()).map_err(|source| MapError::CacheWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn remove(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Names `day` should refresh.
    ///
    /// Segment boundaries come from the planned order alone, so they never
    /// move during a cycle. Names added to the universe since planning are
    /// appended (landing in the last segment) and names that left it are
    /// skipped.
    pub fn select(&self, universe: &[String], day: u8) -> Vec<String> {
        let planned: HashSet<&str> = self.order.iter().map(String::as_str).collect();
        let current: HashSet<&str> = universe.iter().map(String::as_str).collect();

        let mut order: Vec<&str> = self.order.iter().map(String::as_str).collect();
        order.extend(
            universe
                .iter()
                .map(String::as_str)
                .filter(|name| !planned.contains(name)),
        );

        let range = segment_bounds(order.len(), segment_size(self.order.len()), day);
        order[range]
            .iter()
            .filter(|name| current.contains(*name))
            .map(|name| name.to_string())
            .collect()
    }
}

/// Outcome counts for one refresh run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub selected: usize,
    pub refreshed: usize,
    pub not_found: usize,
    pub soft_errors: usize,
    pub homebrew_updated: usize,
    pub homebrew_failures: usize,
    /// Packages whose lookup hit a transient error, to retry later
    pub failed: Vec<String>,
}

impl RefreshSummary {
    pub fn processed(&self) -> usize {
        self.refreshed + self.not_found + self.soft_errors
    }
}

impl fmt::Display for RefreshSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} refreshed, {} not found, {} soft errors, {} Homebrew updates",
            self.refreshed, self.not_found, self.soft_errors, self.homebrew_updated
        )?;
        if self.homebrew_failures > 0 {
            write!(f, " ({} Homebrew failures)", self.homebrew_failures)?;
        }
        Ok(())
    }
}

/// Drives refresh runs over the package universe.
pub struct RefreshScheduler<'a, H: HomebrewLookup + ?Sized> {
    repology: &'a RepologyClient,
    homebrew: &'a H,
    names: &'a NameMappings,
    delay: Duration,
    progress: Option<ProgressBar>,
}

impl<'a, H: HomebrewLookup + ?Sized> RefreshScheduler<'a, H> {
    pub fn new(
        repology: &'a RepologyClient,
        homebrew: &'a H,
        names: &'a NameMappings,
        delay: Duration,
    ) -> Self {
        Self {
            repology,
            homebrew,
            names,
            delay,
            progress: None,
        }
    }

    /// Report per-package progress on `pb`.
    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }

    /// Names a run of `segment` would refresh, updating the cycle plan as needed.
    pub fn plan(
        &self,
        store: &CacheStore,
        universe: &[String],
        segment: Segment,
        plan_path: &Path,
    ) -> Result<Vec<String>> {
        let day = match segment {
            Segment::All => return Ok(universe.to_vec()),
            Segment::Day(day) => day,
        };

        let existing = if day == 0 {
            None
        } else {
            CyclePlan::load(plan_path)?
        };
        let plan = match existing {
            Some(plan) => {
                debug!("reusing cycle plan from {}", plan.created);
                plan
            }
            None => {
                let plan = CyclePlan::build(universe, store, self.names, now_timestamp());
                plan.save(plan_path)?;
                info!(
                    "planned a new refresh cycle over {} packages",
                    plan.order.len()
                );
                plan
            }
        };

        Ok(plan.select(universe, day))
    }

    /// Refresh one segment (or everything) and report what happened.
    ///
    /// Per-package failures are counted, never returned; `Err` means the cache
    /// or plan could not be written.
    pub async fn run(
        &self,
        store: &mut CacheStore,
        universe: &[String],
        segment: Segment,
        plan_path: &Path,
    ) -> Result<RefreshSummary> {
        if segment == Segment::All {
            info!("full refresh: clearing {}", store.path().display());
            store.clear()?;
            CyclePlan::remove(plan_path)?;
        }

        let selected = self.plan(store, universe, segment, plan_path)?;
        let mut summary = RefreshSummary {
            selected: selected.len(),
            ..Default::default()
        };
        info!("segment {}: refreshing {} packages", segment, selected.len());

        if let Some(pb) = &self.progress {
            pb.set_length(selected.len() as u64);
        }

        for (i, name) in selected.iter().enumerate() {
            if let Some(pb) = &self.progress {
                pb.set_message(name.clone());
            }

            self.refresh_package(store, name, &mut summary).await?;

            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
            if i + 1 < selected.len() && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        info!("segment {}: {}", segment, summary);
        Ok(summary)
    }

    async fn refresh_package(
        &self,
        store: &mut CacheStore,
        name: &str,
        summary: &mut RefreshSummary,
    ) -> Result<()> {
        let evicted = store.evict(&self.names.cache_keys(name));

        match self.repology.fetch(name, self.names, store).await? {
            QueryOutcome::Found(_) | QueryOutcome::Cached(_) => summary.refreshed += 1,
            QueryOutcome::NotFound(_) => summary.not_found += 1,
            // Augmenting would bump the restored record's timestamp
            QueryOutcome::SoftError(reason) => {
                debug!("{}: keeping previous record after soft error ({})", name, reason);
                store.restore(evicted);
                summary.soft_errors += 1;
                summary.failed.push(name.to_string());
                return Ok(());
            }
        }

        match homebrew::augment(self.homebrew, name, self.names, store)? {
            AugmentOutcome::Updated => summary.homebrew_updated += 1,
            AugmentOutcome::Failed(_) => summary.homebrew_failures += 1,
            AugmentOutcome::Unknown | AugmentOutcome::NotCached | AugmentOutcome::Unavailable => {}
        }
        Ok(())
    }
}
