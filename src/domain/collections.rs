//! Ordered list of collections that are served on the public site.
//!
//! Declaration order is the conflict priority: when several documents claim
//! the same URI, the one from the earliest collection owns it.

use serde::Serialize;

use crate::domain::error::DomainError;
use crate::domain::types::PAGES_COLLECTION;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrontendCollections {
    ordered: Vec<String>,
}

impl FrontendCollections {
    /// Build the list, forcing `pages` to the front and dropping duplicates.
    pub fn new<I, S>(collections: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered = vec![PAGES_COLLECTION.to_string()];
        for collection in collections {
            let collection = collection.into();
            let trimmed = collection.trim();
            if trimmed.is_empty() {
                return Err(DomainError::validation("collection name must not be empty"));
            }
            if trimmed.contains('/') {
                return Err(DomainError::validation(format!(
                    "collection name `{trimmed}` must not contain `/`"
                )));
            }
            if !ordered.iter().any(|existing| existing == trimmed) {
                ordered.push(trimmed.to_string());
            }
        }
        Ok(Self { ordered })
    }

    /// Position in the priority order; lower wins.
    pub fn priority(&self, collection: &str) -> Option<usize> {
        self.ordered.iter().position(|name| name == collection)
    }

    pub fn contains(&self, collection: &str) -> bool {
        self.priority(collection).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ordered.iter().map(String::as_str)
    }

    /// Frontend collections other than `pages`.
    pub fn item_collections(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|name| *name != PAGES_COLLECTION)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

impl Default for FrontendCollections {
    fn default() -> Self {
        Self {
            ordered: vec![PAGES_COLLECTION.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_always_first() {
        let collections = FrontendCollections::new(["posts", "pages", "case-studies"]).unwrap();
        assert_eq!(
            collections.iter().collect::<Vec<_>>(),
            vec!["pages", "posts", "case-studies"]
        );
        assert_eq!(collections.priority("pages"), Some(0));
        assert_eq!(collections.priority("case-studies"), Some(2));
        assert_eq!(collections.priority("forms"), None);
    }

    #[test]
    fn rejects_invalid_names() {
        assert!(FrontendCollections::new([" "]).is_err());
        assert!(FrontendCollections::new(["blog/posts"]).is_err());
    }

    #[test]
    fn item_collections_skip_pages() {
        let collections = FrontendCollections::new(["posts"]).unwrap();
        assert_eq!(collections.item_collections().collect::<Vec<_>>(), vec!["posts"]);
    }
}
