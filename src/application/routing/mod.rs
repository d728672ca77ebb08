//! URI generation and the URI secondary index.

pub mod generator;
pub mod index;
pub mod refresh;

pub use generator::{GeneratedUri, GenerationError, UriGenerator, UriRequest};
pub use index::{UriClaimant, UriConflict, UriIndexService, UriUpsert};
pub use refresh::{RefreshedUri, refresh};
