//! Cache key and tag definitions.
//!
//! A `CacheKey` addresses one entry. A `CacheTag` groups entries for
//! invalidation; every entry carries one or more tags.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::uri::display_path;

/// Ordered tuple of strings addressing one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("|"))
    }
}

/// Shared layout surfaces cached independently of any document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalSurface {
    Header,
    Footer,
    Settings,
}

impl GlobalSurface {
    pub fn as_str(self) -> &'static str {
        match self {
            GlobalSurface::Header => "header",
            GlobalSurface::Footer => "footer",
            GlobalSurface::Settings => "settings",
        }
    }
}

/// Label attached to cache entries for group invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CacheTag(String);

impl CacheTag {
    /// Identity of one document.
    pub fn item(collection: &str, id: Uuid) -> Self {
        Self(format!("item:{collection}:{id}"))
    }

    /// Everything served at a URI, whichever document owns it.
    pub fn uri(uri: &str) -> Self {
        Self(format!("uri:{}", display_path(uri)))
    }

    /// Rendered output of a request path.
    pub fn path(path: &str) -> Self {
        Self(format!("path:{}", display_path(path)))
    }

    /// Listings of a whole collection.
    pub fn collection(collection: &str) -> Self {
        Self(format!("collection:{collection}"))
    }

    /// Index pages of a collection served under its archive page.
    pub fn collection_index(collection: &str) -> Self {
        Self(format!("collection-index:{collection}"))
    }

    pub fn global(surface: GlobalSurface) -> Self {
        Self(format!("global:{}", surface.as_str()))
    }

    /// Enumerations of indexed URIs (static generation, sitemap).
    pub fn uri_listing() -> Self {
        Self("uri-listing".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
