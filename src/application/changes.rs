//! Change detection between document revisions.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::DocumentRecord;
use crate::domain::types::{DocumentStatus, Severity, WriteOperation};

/// What differs between two revisions of one document. Computed per write,
/// never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub operation: WriteOperation,
    pub collection: String,
    pub document_id: Uuid,

    pub uri_changed: bool,
    pub slug_changed: bool,
    pub status_changed: bool,
    pub parent_changed: bool,
    pub title_changed: bool,
    pub content_changed: bool,

    pub old_uri: Option<String>,
    pub new_uri: Option<String>,
    pub old_slug: Option<String>,
    pub new_slug: Option<String>,
    pub old_status: Option<DocumentStatus>,
    pub new_status: Option<DocumentStatus>,
    pub old_parent: Option<Uuid>,
    pub new_parent: Option<Uuid>,
    pub old_title: Option<String>,
    pub new_title: Option<String>,
}

/// Structural consequences of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImpactAssessment {
    pub requires_uri_regeneration: bool,
    pub requires_cascade: bool,
    pub requires_nav_update: bool,
    pub requires_redirect: bool,
    pub severity: Severity,
}

/// Diff `document` against `previous`.
///
/// For a create every field is new. For a delete `document` is the removed
/// revision and every field is old. An update without a previous revision is
/// treated like a create.
pub fn detect(
    document: &DocumentRecord,
    previous: Option<&DocumentRecord>,
    operation: WriteOperation,
) -> ChangeRecord {
    match (operation, previous) {
        (WriteOperation::Delete, _) => whole(document, operation, Side::Old),
        (WriteOperation::Update, Some(previous)) => diff(previous, document),
        (_, _) => whole(document, operation, Side::New),
    }
}

enum Side {
    Old,
    New,
}

fn whole(document: &DocumentRecord, operation: WriteOperation, side: Side) -> ChangeRecord {
    let values = Values::of(document);
    let (old, new) = match side {
        Side::Old => (values, Values::default()),
        Side::New => (Values::default(), values),
    };
    ChangeRecord {
        operation,
        collection: document.collection.clone(),
        document_id: document.id,
        uri_changed: true,
        slug_changed: true,
        status_changed: true,
        parent_changed: true,
        title_changed: true,
        content_changed: true,
        old_uri: old.uri,
        new_uri: new.uri,
        old_slug: old.slug,
        new_slug: new.slug,
        old_status: old.status,
        new_status: new.status,
        old_parent: old.parent,
        new_parent: new.parent,
        old_title: old.title,
        new_title: new.title,
    }
}

fn diff(previous: &DocumentRecord, next: &DocumentRecord) -> ChangeRecord {
    ChangeRecord {
        operation: WriteOperation::Update,
        collection: next.collection.clone(),
        document_id: next.id,
        uri_changed: previous.uri != next.uri,
        slug_changed: previous.slug != next.slug,
        status_changed: previous.status != next.status,
        parent_changed: previous.parent_id != next.parent_id,
        title_changed: previous.title != next.title,
        content_changed: content_differs(previous, next),
        old_uri: previous.uri.clone(),
        new_uri: next.uri.clone(),
        old_slug: Some(previous.slug.clone()),
        new_slug: Some(next.slug.clone()),
        old_status: Some(previous.status),
        new_status: Some(next.status),
        old_parent: previous.parent_id,
        new_parent: next.parent_id,
        old_title: Some(previous.title.clone()),
        new_title: Some(next.title.clone()),
    }
}

/// Deep equality over everything except identity, system and routing fields.
fn content_differs(previous: &DocumentRecord, next: &DocumentRecord) -> bool {
    previous.content != next.content || previous.in_navigation != next.in_navigation
}

#[derive(Default)]
struct Values {
    uri: Option<String>,
    slug: Option<String>,
    status: Option<DocumentStatus>,
    parent: Option<Uuid>,
    title: Option<String>,
}

impl Values {
    fn of(document: &DocumentRecord) -> Self {
        Self {
            uri: document.uri.clone(),
            slug: Some(document.slug.clone()),
            status: Some(document.status),
            parent: document.parent_id,
            title: Some(document.title.clone()),
        }
    }
}

impl ChangeRecord {
    pub fn has_changes(&self) -> bool {
        self.uri_changed
            || self.slug_changed
            || self.status_changed
            || self.parent_changed
            || self.title_changed
            || self.content_changed
    }

    pub fn classify(&self) -> ImpactAssessment {
        classify(self)
    }
}

/// Map a change onto the work it requires.
pub fn classify(change: &ChangeRecord) -> ImpactAssessment {
    let mut impact = ImpactAssessment {
        requires_uri_regeneration: false,
        requires_cascade: false,
        requires_nav_update: false,
        requires_redirect: false,
        severity: Severity::None,
    };

    if change.uri_changed || change.slug_changed {
        impact.severity = impact.severity.max(Severity::High);
        impact.requires_uri_regeneration = true;
        impact.requires_redirect = change.old_uri.is_some();
    }
    if change.parent_changed {
        impact.severity = impact.severity.max(Severity::High);
        impact.requires_cascade = true;
        impact.requires_uri_regeneration = true;
    }
    if change.status_changed {
        impact.severity = impact.severity.max(Severity::High);
        impact.requires_nav_update = true;
    }
    if change.title_changed {
        impact.severity = impact.severity.max(Severity::Medium);
        impact.requires_nav_update = true;
    }
    if change.content_changed {
        impact.severity = impact.severity.max(Severity::Low);
    }
    impact
}
