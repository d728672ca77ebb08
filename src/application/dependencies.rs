//! Dependency analysis: which documents must follow when an archive page, a
//! parent page, the homepage or the routing settings change.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::application::changes::ChangeRecord;
use crate::application::error::AppError;
use crate::application::repos::{DocumentFilter, DocumentsRepo, ParentFilter, find_all};
use crate::domain::entities::{DocumentRecord, RoutingSettingsRecord};
use crate::domain::error::DomainError;
use crate::domain::types::{DocumentStatus, PAGES_COLLECTION, WriteOperation};

/// A collection whose archive page or template assignment changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentChange {
    pub collection: String,
    pub old: Option<Uuid>,
    pub new: Option<Uuid>,
}

/// Field diff between two routing settings snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettingsDiff {
    /// `(outgoing, incoming)` when the homepage moved.
    pub homepage: Option<(Option<Uuid>, Option<Uuid>)>,
    pub archive_pages: Vec<AssignmentChange>,
    pub templates: Vec<AssignmentChange>,
}

impl SettingsDiff {
    pub fn between(previous: &RoutingSettingsRecord, next: &RoutingSettingsRecord) -> Self {
        let homepage = (previous.homepage_id != next.homepage_id)
            .then_some((previous.homepage_id, next.homepage_id));
        Self {
            homepage,
            archive_pages: assignment_changes(&previous.archive_pages, &next.archive_pages),
            templates: assignment_changes(&previous.templates, &next.templates),
        }
    }

    pub fn homepage_changed(&self) -> bool {
        self.homepage.is_some()
    }

    pub fn archives_changed(&self) -> bool {
        !self.archive_pages.is_empty()
    }

    /// Collections whose items need new URIs or index metadata, in name order.
    pub fn affected_collections(&self) -> Vec<String> {
        let mut collections: Vec<String> = self
            .archive_pages
            .iter()
            .chain(self.templates.iter())
            .map(|change| change.collection.clone())
            .collect();
        collections.sort();
        collections.dedup();
        collections
    }

    pub fn is_empty(&self) -> bool {
        self.homepage.is_none() && self.archive_pages.is_empty() && self.templates.is_empty()
    }
}

fn assignment_changes(
    previous: &std::collections::BTreeMap<String, Uuid>,
    next: &std::collections::BTreeMap<String, Uuid>,
) -> Vec<AssignmentChange> {
    let mut collections: Vec<&String> = previous.keys().chain(next.keys()).collect();
    collections.sort();
    collections.dedup();
    collections
        .into_iter()
        .filter_map(|collection| {
            let old = previous.get(collection).copied();
            let new = next.get(collection).copied();
            (old != new).then(|| AssignmentChange {
                collection: collection.clone(),
                old,
                new,
            })
        })
        .collect()
}

/// Archive cascade: the page is some collection's archive and its slug changed.
pub fn archive_cascade_required(
    document: &DocumentRecord,
    change: &ChangeRecord,
    settings: &RoutingSettingsRecord,
) -> bool {
    document.collection == PAGES_COLLECTION
        && change.operation == WriteOperation::Update
        && change.slug_changed
        && !settings.collections_archived_by(document.id).is_empty()
}

/// Hierarchy cascade: a published page changed its parent.
pub fn hierarchy_cascade_required(document: &DocumentRecord, change: &ChangeRecord) -> bool {
    document.collection == PAGES_COLLECTION
        && change.operation == WriteOperation::Update
        && change.parent_changed
        && document.status == DocumentStatus::Published
}

/// A published page moved without a parent change, so descendants that embed
/// its URI must follow.
pub fn descendant_refresh_required(document: &DocumentRecord, change: &ChangeRecord) -> bool {
    document.collection == PAGES_COLLECTION
        && change.operation == WriteOperation::Update
        && change.uri_changed
        && !change.parent_changed
        && document.status == DocumentStatus::Published
}

pub struct DependencyAnalyzer {
    documents: Arc<dyn DocumentsRepo>,
    max_depth: usize,
}

impl DependencyAnalyzer {
    pub fn new(documents: Arc<dyn DocumentsRepo>, max_depth: usize) -> Self {
        Self {
            documents,
            max_depth: max_depth.max(1),
        }
    }

    /// Collections that use `page_id` as their archive page.
    pub fn archive_users(&self, settings: &RoutingSettingsRecord, page_id: Uuid) -> Vec<String> {
        settings.collections_archived_by(page_id)
    }

    /// Every descendant of `page_id`, parents before children.
    ///
    /// Fails with `ParentCycle` if the walk comes back to a page it has
    /// already seen and with `DepthExceeded` past the configured depth.
    pub async fn descendants(&self, page_id: Uuid) -> Result<Vec<DocumentRecord>, AppError> {
        let mut visited = HashSet::from([page_id]);
        let mut queue = VecDeque::from([(page_id, 0usize)]);
        let mut descendants = Vec::new();

        while let Some((parent_id, depth)) = queue.pop_front() {
            let filter = DocumentFilter::collection(PAGES_COLLECTION)
                .with_parent(ParentFilter::Child(parent_id));
            for child in self.all(&filter).await? {
                if !visited.insert(child.id) {
                    return Err(DomainError::ParentCycle { page_id: child.id }.into());
                }
                if depth + 1 > self.max_depth {
                    return Err(DomainError::DepthExceeded {
                        limit: self.max_depth,
                    }
                    .into());
                }
                queue.push_back((child.id, depth + 1));
                descendants.push(child);
            }
        }
        Ok(descendants)
    }

    /// Published items of `collection`, oldest first.
    pub async fn published_items(&self, collection: &str) -> Result<Vec<DocumentRecord>, AppError> {
        let filter = DocumentFilter::collection(collection).with_status(DocumentStatus::Published);
        self.all(&filter).await
    }

    async fn all(&self, filter: &DocumentFilter) -> Result<Vec<DocumentRecord>, AppError> {
        Ok(find_all(self.documents.as_ref(), filter).await?)
    }
}
