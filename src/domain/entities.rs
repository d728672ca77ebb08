//! Domain entities mirrored from persistent storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{CascadeOperation, DocumentStatus, JobState, PAGES_COLLECTION};

/// A content document from any frontend collection.
///
/// `uri` is derived by the routing engine and never edited directly. An empty
/// string is the homepage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub collection: String,
    pub slug: String,
    pub uri: Option<String>,
    pub status: DocumentStatus,
    pub parent_id: Option<Uuid>,
    pub title: String,
    pub in_navigation: bool,
    pub content: serde_json::Value,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl DocumentRecord {
    pub fn is_page(&self) -> bool {
        self.collection == PAGES_COLLECTION
    }

    pub fn is_published(&self) -> bool {
        self.status == DocumentStatus::Published
    }
}

/// Site-wide routing singleton.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingSettingsRecord {
    pub homepage_id: Option<Uuid>,
    /// Collection name → page that owns the collection's URI prefix.
    pub archive_pages: BTreeMap<String, Uuid>,
    /// Collection name → template used to render its items.
    pub templates: BTreeMap<String, Uuid>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub updated_at: Option<OffsetDateTime>,
}

impl RoutingSettingsRecord {
    pub fn archive_page_for(&self, collection: &str) -> Option<Uuid> {
        self.archive_pages.get(collection).copied()
    }

    pub fn template_for(&self, collection: &str) -> Option<Uuid> {
        self.templates.get(collection).copied()
    }

    /// Collections whose archive page is `page_id`, in name order.
    pub fn collections_archived_by(&self, page_id: Uuid) -> Vec<String> {
        self.archive_pages
            .iter()
            .filter(|(_, page)| **page == page_id)
            .map(|(collection, _)| collection.clone())
            .collect()
    }
}

/// One row of the URI secondary index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UriIndexRecord {
    pub id: Uuid,
    pub uri: String,
    pub source_collection: String,
    pub document_id: Uuid,
    pub status: DocumentStatus,
    pub template_id: Option<Uuid>,
    /// Prior URIs, newest first.
    pub previous_uris: Vec<String>,
    pub updated_at: OffsetDateTime,
}

/// A queued bulk dependent update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeJobRecord {
    pub id: Uuid,
    pub operation: CascadeOperation,
    pub triggering_entity_id: Uuid,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
    pub state: JobState,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    /// Dependents already regenerated; skipped when the job resumes.
    pub processed_ids: Vec<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collections_archived_by_filters_on_page() {
        let archive = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut settings = RoutingSettingsRecord::default();
        settings.archive_pages.insert("posts".into(), archive);
        settings.archive_pages.insert("case-studies".into(), archive);
        settings.archive_pages.insert("events".into(), other);

        assert_eq!(
            settings.collections_archived_by(archive),
            vec!["case-studies".to_string(), "posts".to_string()]
        );
        assert!(settings.collections_archived_by(Uuid::nil()).is_empty());
    }
}
