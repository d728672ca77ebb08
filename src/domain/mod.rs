//! Domain layer types and invariants.

pub mod collections;
pub mod entities;
pub mod error;
pub mod slug;
pub mod types;
pub mod uri;
