//! Content routing and cache consistency for a content-managed site.
//!
//! Documents from several collections are mapped to URIs, kept in a URI
//! index, served through a tag-addressable read cache and kept consistent by
//! change detection, targeted invalidation and durable cascades.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
