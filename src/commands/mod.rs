//! Command implementations for the pkgmap CLI
//!
//! - **refresh**: segmented cache refresh runs
//! - **table**: mapping table generation and validation
//! - **query**: ad-hoc package lookups
//! - **cache**: cache inspection and maintenance
//! - **platform**: platform detection report
//! - **utils**: Shared utility functions (internal)

pub mod cache;
pub mod platform;
pub mod query;
pub mod refresh;
pub mod table;
pub(crate) mod utils;

pub use cache::{cache_clear, cache_evict, cache_prune, cache_stats};
pub use platform::platform;
pub use query::query;
pub use refresh::refresh;
pub use table::{generate, validate};
