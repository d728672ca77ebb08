//! Repository traits describing persistence adapters.
//!
//! The document store itself is an external collaborator; these traits are the
//! narrow CRUD surface the routing engine relies on.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{
    CascadeJobRecord, DocumentRecord, RoutingSettingsRecord, UriIndexRecord,
};
use crate::domain::types::{CascadeOperation, DocumentStatus};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Parent constraint for document queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParentFilter {
    #[default]
    Any,
    Root,
    Child(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFilter {
    pub collection: String,
    pub status: Option<DocumentStatus>,
    pub slug: Option<String>,
    pub parent: ParentFilter,
}

impl DocumentFilter {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            status: None,
            slug: None,
            parent: ParentFilter::Any,
        }
    }

    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_parent(mut self, parent: ParentFilter) -> Self {
        self.parent = parent;
        self
    }

    pub fn matches(&self, document: &DocumentRecord) -> bool {
        if document.collection != self.collection {
            return false;
        }
        if self.status.is_some_and(|status| status != document.status) {
            return false;
        }
        if self
            .slug
            .as_deref()
            .is_some_and(|slug| slug != document.slug)
        {
            return false;
        }
        match self.parent {
            ParentFilter::Any => true,
            ParentFilter::Root => document.parent_id.is_none(),
            ParentFilter::Child(parent) => document.parent_id == Some(parent),
        }
    }
}

/// Offset pagination for bulk scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u64,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 200;

    pub fn new(limit: u32, offset: u64) -> Self {
        Self {
            limit: limit.max(1),
            offset,
        }
    }

    pub fn first() -> Self {
        Self::new(Self::DEFAULT_LIMIT, 0)
    }

    pub fn next(self) -> Self {
        Self::new(self.limit, self.offset + u64::from(self.limit))
    }
}

#[derive(Debug, Clone)]
pub struct CreateDocumentParams {
    pub collection: String,
    pub slug: String,
    pub uri: Option<String>,
    pub status: DocumentStatus,
    pub parent_id: Option<Uuid>,
    pub title: String,
    pub in_navigation: bool,
    pub content: serde_json::Value,
}

#[async_trait]
pub trait DocumentsRepo: Send + Sync {
    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<DocumentRecord>, RepoError>;

    async fn find_one(&self, filter: &DocumentFilter) -> Result<Option<DocumentRecord>, RepoError>;

    /// Documents matching `filter`, ordered by creation time then id.
    async fn find_many(
        &self,
        filter: &DocumentFilter,
        page: PageRequest,
    ) -> Result<Vec<DocumentRecord>, RepoError>;

    async fn create(&self, params: CreateDocumentParams) -> Result<DocumentRecord, RepoError>;

    async fn update(&self, document: DocumentRecord) -> Result<DocumentRecord, RepoError>;

    async fn delete(&self, collection: &str, id: Uuid) -> Result<(), RepoError>;
}

/// Every document matching `filter`, fetched page by page.
pub async fn find_all<R>(
    repo: &R,
    filter: &DocumentFilter,
) -> Result<Vec<DocumentRecord>, RepoError>
where
    R: DocumentsRepo + ?Sized,
{
    let mut page = PageRequest::first();
    let mut documents = Vec::new();
    loop {
        let batch = repo.find_many(filter, page).await?;
        let exhausted = batch.len() < page.limit as usize;
        documents.extend(batch);
        if exhausted {
            return Ok(documents);
        }
        page = page.next();
    }
}

#[async_trait]
pub trait RoutingSettingsRepo: Send + Sync {
    /// Load the singleton, returning defaults when it was never saved.
    async fn load_routing_settings(&self) -> Result<RoutingSettingsRecord, RepoError>;

    async fn save_routing_settings(
        &self,
        settings: RoutingSettingsRecord,
    ) -> Result<RoutingSettingsRecord, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewUriIndexEntry {
    pub uri: String,
    pub source_collection: String,
    pub document_id: Uuid,
    pub status: DocumentStatus,
    pub template_id: Option<Uuid>,
    pub previous_uris: Vec<String>,
}

#[async_trait]
pub trait UriIndexRepo: Send + Sync {
    async fn find_by_uri(
        &self,
        uri: &str,
        status: Option<DocumentStatus>,
    ) -> Result<Vec<UriIndexRecord>, RepoError>;

    /// Entries whose history contains `uri`, most recently updated first.
    async fn find_by_previous_uri(
        &self,
        uri: &str,
        status: Option<DocumentStatus>,
    ) -> Result<Vec<UriIndexRecord>, RepoError>;

    async fn find_for_document(
        &self,
        collection: &str,
        document_id: Uuid,
    ) -> Result<Option<UriIndexRecord>, RepoError>;

    async fn insert_entry(&self, entry: NewUriIndexEntry) -> Result<UriIndexRecord, RepoError>;

    async fn update_entry(&self, entry: UriIndexRecord) -> Result<UriIndexRecord, RepoError>;

    /// Remove the entry of a document, returning how many rows were dropped.
    async fn delete_for_document(
        &self,
        collection: &str,
        document_id: Uuid,
    ) -> Result<u64, RepoError>;

    /// Entries with any of `statuses`, ordered by URI.
    async fn list_entries(
        &self,
        statuses: &[DocumentStatus],
    ) -> Result<Vec<UriIndexRecord>, RepoError>;

    async fn clear(&self) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewCascadeJob {
    pub operation: CascadeOperation,
    pub triggering_entity_id: Uuid,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
    pub max_attempts: i32,
}

#[async_trait]
pub trait CascadeJobsRepo: Send + Sync {
    async fn enqueue_job(&self, job: NewCascadeJob) -> Result<CascadeJobRecord, RepoError>;

    async fn find_job(&self, id: Uuid) -> Result<Option<CascadeJobRecord>, RepoError>;

    /// Most recent job carrying `key`.
    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<CascadeJobRecord>, RepoError>;

    async fn update_job(&self, job: CascadeJobRecord) -> Result<(), RepoError>;

    /// Jobs left pending or running, oldest first.
    async fn list_resumable(&self) -> Result<Vec<CascadeJobRecord>, RepoError>;
}
