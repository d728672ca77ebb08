//! Bulk dependent updates.
//!
//! A cascade is queued as a durable job before it runs, then executed inline
//! by the write that triggered it. The job row records which dependents were
//! already regenerated, so a job interrupted by a crash resumes where it
//! stopped instead of redoing or skipping work.

mod executor;
mod queue;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::CascadeOperation;

pub use executor::{CascadeExecutor, CascadeFailure, CascadeReport, RegeneratedUri};
pub use queue::{CascadeQueue, idempotency_key};

pub(crate) const METRIC_CASCADE_MS: &str = "folio_cascade_ms";
pub(crate) const METRIC_CASCADE_FAILURES: &str = "folio_cascade_failures_total";

pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// What a cascade job has to do. Stored as the job payload.
///
/// `revision` is the timestamp of the write that triggered the job. It keeps
/// two identical edits made at different times from sharing an idempotency
/// key while a replay of the same write still does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CascadePayload {
    ArchivePageUpdate {
        page_id: Uuid,
        old_slug: Option<String>,
        new_slug: String,
        #[serde(with = "time::serde::rfc3339")]
        revision: OffsetDateTime,
    },
    PageHierarchyUpdate {
        page_id: Uuid,
        old_uri: Option<String>,
        new_uri: Option<String>,
        #[serde(with = "time::serde::rfc3339")]
        revision: OffsetDateTime,
    },
    HomepageChange {
        outgoing: Option<Uuid>,
        incoming: Option<Uuid>,
        #[serde(with = "time::serde::rfc3339")]
        revision: OffsetDateTime,
    },
    SettingsChange {
        /// Collections whose archive or template assignment changed.
        collections: Vec<String>,
        #[serde(with = "time::serde::rfc3339")]
        revision: OffsetDateTime,
    },
}

impl CascadePayload {
    pub fn operation(&self) -> CascadeOperation {
        match self {
            CascadePayload::ArchivePageUpdate { .. } => CascadeOperation::ArchivePageUpdate,
            CascadePayload::PageHierarchyUpdate { .. } => CascadeOperation::PageHierarchyUpdate,
            CascadePayload::HomepageChange { .. } => CascadeOperation::HomepageChange,
            CascadePayload::SettingsChange { .. } => CascadeOperation::SettingsChange,
        }
    }

    /// The document whose write triggered the job. Settings-wide jobs use the
    /// incoming homepage when there is one and the nil id otherwise.
    pub fn triggering_entity_id(&self) -> Uuid {
        match self {
            CascadePayload::ArchivePageUpdate { page_id, .. }
            | CascadePayload::PageHierarchyUpdate { page_id, .. } => *page_id,
            CascadePayload::HomepageChange {
                incoming, outgoing, ..
            } => incoming.or(*outgoing).unwrap_or_else(Uuid::nil),
            CascadePayload::SettingsChange { .. } => Uuid::nil(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn payload_serializes_with_kind_tag() {
        let page_id = Uuid::nil();
        let payload = CascadePayload::ArchivePageUpdate {
            page_id,
            old_slug: Some("news".into()),
            new_slug: "blog".into(),
            revision: OffsetDateTime::UNIX_EPOCH,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["kind"], json!("archive-page-update"));
        assert_eq!(value["new_slug"], json!("blog"));
        assert_eq!(payload.operation(), CascadeOperation::ArchivePageUpdate);
        assert_eq!(payload.triggering_entity_id(), page_id);

        let back: CascadePayload = serde_json::from_value(value).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn homepage_change_is_triggered_by_incoming_page() {
        let outgoing = Uuid::new_v4();
        let incoming = Uuid::new_v4();
        let payload = CascadePayload::HomepageChange {
            outgoing: Some(outgoing),
            incoming: Some(incoming),
            revision: OffsetDateTime::UNIX_EPOCH,
        };
        assert_eq!(payload.triggering_entity_id(), incoming);

        let cleared = CascadePayload::HomepageChange {
            outgoing: Some(outgoing),
            incoming: None,
            revision: OffsetDateTime::UNIX_EPOCH,
        };
        assert_eq!(cleared.triggering_entity_id(), outgoing);
    }
}
