//! Canonical URI generation.
//!
//! Generation never blocks a write: lookup failures and broken hierarchies
//! degrade to a minimal fallback URI, and conflicts are reported to the caller
//! instead of rejected here.

use std::collections::HashSet;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::repos::{DocumentsRepo, RepoError};
use crate::application::routing::index::{UriConflict, UriIndexService};
use crate::domain::entities::{DocumentRecord, RoutingSettingsRecord};
use crate::domain::error::DomainError;
use crate::domain::types::{DocumentStatus, PAGES_COLLECTION};
use crate::domain::uri::{
    HOMEPAGE_URI, archive_uri, collection_uri, fallback_uri, is_homepage, page_uri,
};

pub(crate) const METRIC_URI_CONFLICTS: &str = "folio_uri_conflicts_total";

pub const DEFAULT_MAX_PARENT_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Hierarchy(#[from] DomainError),
    #[error("parent page `{parent_id}` does not exist")]
    MissingParent { parent_id: Uuid },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// The document a URI is generated for.
#[derive(Debug, Clone, Copy)]
pub struct UriRequest<'a> {
    pub collection: &'a str,
    pub slug: &'a str,
    /// `None` while the document is being created.
    pub document_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub status: DocumentStatus,
}

impl<'a> UriRequest<'a> {
    pub fn for_document(document: &'a DocumentRecord) -> Self {
        Self {
            collection: &document.collection,
            slug: &document.slug,
            document_id: Some(document.id),
            parent_id: document.parent_id,
            status: document.status,
        }
    }
}

/// Outcome of `UriGenerator::generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedUri {
    pub uri: String,
    /// Set when other documents already claim `uri`.
    pub conflict: Option<UriConflict>,
    /// Set when generation failed and `uri` is the fallback form.
    pub degraded: bool,
}

pub struct UriGenerator {
    documents: Arc<dyn DocumentsRepo>,
    index: Arc<UriIndexService>,
    max_parent_depth: usize,
}

impl UriGenerator {
    pub fn new(
        documents: Arc<dyn DocumentsRepo>,
        index: Arc<UriIndexService>,
        max_parent_depth: usize,
    ) -> Self {
        Self {
            documents,
            index,
            max_parent_depth: max_parent_depth.max(1),
        }
    }

    /// Generate the URI of a document and check it against the index.
    pub async fn generate(
        &self,
        request: UriRequest<'_>,
        settings: &RoutingSettingsRecord,
    ) -> GeneratedUri {
        let (uri, degraded) = match self.compute(request, settings).await {
            Ok(uri) => (uri, false),
            Err(err) => {
                let fallback = fallback_uri(request.collection, request.slug);
                warn!(
                    collection = request.collection,
                    slug = request.slug,
                    fallback = %fallback,
                    error = %err,
                    "uri generation degraded to fallback"
                );
                (fallback, true)
            }
        };

        let conflict = match self
            .index
            .check_conflict(&uri, request.status, request.collection, request.document_id)
            .await
        {
            Ok(conflict) => conflict,
            Err(err) => {
                warn!(uri = %uri, error = %err, "uri conflict check failed");
                None
            }
        };

        if let Some(conflict) = &conflict {
            let winner = conflict.winner();
            counter!(METRIC_URI_CONFLICTS).increment(1);
            warn!(
                uri = %uri,
                collection = request.collection,
                claimants = conflict.claimants.len(),
                winner_collection = %winner.collection,
                winner_id = ?winner.document_id,
                "uri conflict detected"
            );
        }

        debug!(
            collection = request.collection,
            slug = request.slug,
            uri = %uri,
            degraded,
            "uri generated"
        );
        GeneratedUri {
            uri,
            conflict,
            degraded,
        }
    }

    /// Compute the canonical URI without falling back.
    pub async fn compute(
        &self,
        request: UriRequest<'_>,
        settings: &RoutingSettingsRecord,
    ) -> Result<String, GenerationError> {
        if request.collection == PAGES_COLLECTION {
            let designated =
                request.document_id.is_some() && request.document_id == settings.homepage_id;
            if is_homepage(request.collection, request.slug) || designated {
                return Ok(HOMEPAGE_URI.to_string());
            }
            return self.page_uri(request, settings).await;
        }

        let Some(archive_id) = settings.archive_page_for(request.collection) else {
            return Ok(collection_uri(request.collection, request.slug));
        };
        match self.documents.find_by_id(PAGES_COLLECTION, archive_id).await? {
            Some(archive) if !archive.slug.is_empty() => {
                Ok(archive_uri(&archive.slug, request.slug))
            }
            _ => Ok(collection_uri(request.collection, request.slug)),
        }
    }

    /// Walk the parent chain upwards until a resolved URI or the root.
    async fn page_uri(
        &self,
        request: UriRequest<'_>,
        settings: &RoutingSettingsRecord,
    ) -> Result<String, GenerationError> {
        let mut visited: HashSet<Uuid> = request.document_id.into_iter().collect();
        let mut pending_slugs = vec![request.slug.to_string()];
        let mut base: Option<String> = None;
        let mut next = request.parent_id;
        let mut depth = 0;

        while let Some(parent_id) = next {
            if !visited.insert(parent_id) {
                return Err(DomainError::ParentCycle { page_id: parent_id }.into());
            }
            depth += 1;
            if depth > self.max_parent_depth {
                return Err(DomainError::DepthExceeded {
                    limit: self.max_parent_depth,
                }
                .into());
            }

            let parent = self
                .documents
                .find_by_id(PAGES_COLLECTION, parent_id)
                .await?
                .ok_or(GenerationError::MissingParent { parent_id })?;

            let parent_is_home = settings.homepage_id == Some(parent.id)
                || is_homepage(PAGES_COLLECTION, &parent.slug);
            if parent_is_home {
                base = Some(HOMEPAGE_URI.to_string());
                break;
            }
            if let Some(uri) = parent.uri {
                base = Some(uri);
                break;
            }
            pending_slugs.push(parent.slug);
            next = parent.parent_id;
        }

        let uri = pending_slugs
            .iter()
            .rev()
            .fold(base, |parent, slug| Some(page_uri(slug, parent.as_deref())))
            .unwrap_or_default();
        Ok(uri)
    }
}
