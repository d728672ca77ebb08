//! Application services: URI routing, change analysis, cache invalidation and
//! cascades, plus the read and write entry points built on them.

pub mod cascade;
pub mod changes;
pub mod dependencies;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod invalidation;
pub mod navigation;
pub mod reindex;
pub mod repos;
pub mod resolver;
pub mod routing;

pub use engine::{EngineSettings, RoutingEngine};
