//! Folio cache layer.
//!
//! A tag-addressable read-through cache for resolved documents, URI listings
//! and global surfaces. Every entry is tagged with the identities and paths it
//! was computed from, so a write invalidates exactly the affected entries:
//!
//! - item tags (`item:{collection}:{id}`) for one document
//! - URI and path tags for everything served at a location
//! - collection and collection-index tags for listings
//! - global tags for header, footer and settings
//!
//! Configuration lives under `[cache]`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! entry_limit = 1000
//! default_ttl_secs = 3600
//! ```

mod config;
mod keys;
mod layer;
mod lock;
mod planner;
mod registry;
mod store;

pub use config::CacheConfig;
pub use keys::{CacheKey, CacheTag, GlobalSurface};
pub use layer::{CacheInvalidator, CacheLayer};
pub use planner::InvalidationPlan;
pub use registry::TagRegistry;
pub use store::{CacheEntry, EntryStore, Lookup};
