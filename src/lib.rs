//! Library interface for pkgmap
//!
//! Resolves logical package names into the names and availability flags used
//! by Arch (official and AUR), Debian/Ubuntu, Fedora, Homebrew and Flatpak,
//! keeps the answers in a durable cache, and renders them into the
//! installer-facing mapping table.
//!
//! The pieces, leaves first:
//!
//! - **platform**: OS families and the ecosystem keys they install from
//! - **names**: Homebrew-to-Repology name remapping
//! - **cache**: the on-disk package cache
//! - **repology** / **homebrew**: the two data sources
//! - **scheduler**: segmented, rate-limited refresh runs
//! - **mapping** / **validate**: table generation and roundtrip checks

pub mod cache;
pub mod config;
pub mod error;
pub mod homebrew;
pub mod mapping;
pub mod names;
pub mod overrides;
pub mod platform;
pub mod record;
pub mod repology;
pub mod scheduler;
pub mod universe;
pub mod validate;

// Re-export commonly used types
pub use cache::CacheStore;
pub use error::{MapError, Result};
pub use mapping::{MappingTable, MappingTableGenerator};
pub use names::NameMappings;
pub use platform::{EcosystemKey, OsFamily, PlatformDescriptor};
pub use record::PackageRecord;
pub use repology::{QueryOutcome, RepologyClient};
pub use scheduler::{RefreshScheduler, RefreshSummary, Segment};
