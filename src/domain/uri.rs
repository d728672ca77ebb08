//! Pure URI construction rules.
//!
//! URIs are stored without a trailing slash. The homepage is the empty string
//! and is displayed as `/`.

use crate::domain::types::PAGES_COLLECTION;

/// Slug that marks a page as the homepage.
pub const HOMEPAGE_SLUG: &str = "home";
/// Stored URI of the homepage.
pub const HOMEPAGE_URI: &str = "";
/// Maximum number of prior URIs kept per index entry.
pub const MAX_URI_HISTORY: usize = 10;

pub fn is_homepage(collection: &str, slug: &str) -> bool {
    collection == PAGES_COLLECTION && slug == HOMEPAGE_SLUG
}

/// URI of a page given its parent's resolved URI, if any.
pub fn page_uri(slug: &str, parent_uri: Option<&str>) -> String {
    match parent_uri {
        Some(parent) => format!("{parent}/{slug}"),
        None => format!("/{slug}"),
    }
}

/// URI of an item living under a collection archive page.
pub fn archive_uri(archive_slug: &str, slug: &str) -> String {
    format!("/{archive_slug}/{slug}")
}

/// URI of an item in a collection without an archive page.
pub fn collection_uri(collection: &str, slug: &str) -> String {
    format!("/{collection}/{slug}")
}

/// Minimal URI used when generation fails.
pub fn fallback_uri(collection: &str, slug: &str) -> String {
    if collection == PAGES_COLLECTION {
        format!("/{slug}")
    } else {
        collection_uri(collection, slug)
    }
}

/// Normalize a request path into the stored URI form.
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return HOMEPAGE_URI.to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Render a stored URI as a request path.
pub fn display_path(uri: &str) -> &str {
    if uri.is_empty() { "/" } else { uri }
}

/// Record `previous` in a newest-first history, keeping it bounded and free of
/// duplicates and of the `current` URI.
pub fn push_history(history: &mut Vec<String>, previous: &str, current: &str) {
    history.retain(|uri| uri != current);
    if previous != current && !history.iter().any(|uri| uri == previous) {
        history.insert(0, previous.to_string());
    }
    history.truncate(MAX_URI_HISTORY);
}
