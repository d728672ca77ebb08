//! Read path used by every render: URI → document.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::DocumentsRepo;
use crate::application::routing::UriIndexService;
use crate::cache::{CacheKey, CacheLayer, CacheTag};
use crate::domain::entities::DocumentRecord;
use crate::domain::types::DocumentStatus;
use crate::domain::uri::{display_path, normalize};

/// Outcome of resolving a request path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    Found {
        collection: String,
        document: DocumentRecord,
        template_id: Option<Uuid>,
    },
    /// The path used to belong to a document that now lives at `location`.
    Redirect {
        location: String,
        collection: String,
        document_id: Uuid,
    },
    NotFound,
}

/// Values kept in the read cache.
#[derive(Debug, Clone)]
pub enum CachedRead {
    Resolution(Resolution),
    Uris(Vec<String>),
}

pub struct Resolver {
    documents: Arc<dyn DocumentsRepo>,
    index: Arc<UriIndexService>,
    cache: Arc<CacheLayer<CachedRead>>,
}

impl Resolver {
    pub fn new(
        documents: Arc<dyn DocumentsRepo>,
        index: Arc<UriIndexService>,
        cache: Arc<CacheLayer<CachedRead>>,
    ) -> Self {
        Self {
            documents,
            index,
            cache,
        }
    }

    /// Resolve `path` for the published site or, with `draft`, for preview.
    pub async fn resolve(&self, path: &str, draft: bool) -> Result<Resolution, AppError> {
        let uri = normalize(path);
        let key = CacheKey::new(["resolve", mode(draft), display_path(&uri)]);
        let mut tags = BTreeSet::from([CacheTag::uri(&uri), CacheTag::path(&uri)]);

        if let Some(CachedRead::Resolution(resolution)) = self.cache.get(&key) {
            return Ok(resolution);
        }

        let resolution = self.lookup(&uri, draft).await?;
        match &resolution {
            Resolution::Found {
                collection,
                document,
                ..
            } => {
                tags.insert(CacheTag::item(collection, document.id));
            }
            Resolution::Redirect {
                collection,
                document_id,
                ..
            } => {
                tags.insert(CacheTag::item(collection, *document_id));
            }
            Resolution::NotFound => {}
        }
        self.cache
            .insert(key, CachedRead::Resolution(resolution.clone()), tags);
        Ok(resolution)
    }

    /// Every routable path in display form, for static generation and the
    /// sitemap.
    pub async fn list_all_uris(&self, draft: bool) -> Result<Vec<String>, AppError> {
        let key = CacheKey::new(["uris", mode(draft)]);
        let tags = BTreeSet::from([CacheTag::uri_listing()]);
        let index = self.index.clone();
        let cached = self
            .cache
            .read_through(key, tags, move || async move {
                let uris = index.list_for_mode(draft).await?;
                Ok::<_, AppError>(CachedRead::Uris(
                    uris.iter().map(|uri| display_path(uri).to_string()).collect(),
                ))
            })
            .await?;
        match cached {
            CachedRead::Uris(uris) => Ok(uris),
            CachedRead::Resolution(_) => {
                Err(AppError::unexpected("uri listing cache holds a resolution"))
            }
        }
    }

    async fn lookup(&self, uri: &str, draft: bool) -> Result<Resolution, AppError> {
        if let Some(entry) = self.index.lookup_for_mode(uri, draft).await? {
            let document = self
                .documents
                .find_by_id(&entry.source_collection, entry.document_id)
                .await?;
            return Ok(match document {
                Some(document) if draft || document.status == DocumentStatus::Published => {
                    debug!(uri, collection = %entry.source_collection, "uri resolved");
                    Resolution::Found {
                        collection: entry.source_collection,
                        document,
                        template_id: entry.template_id,
                    }
                }
                _ => {
                    warn!(
                        uri,
                        collection = %entry.source_collection,
                        document_id = %entry.document_id,
                        "index entry points at a missing or hidden document"
                    );
                    Resolution::NotFound
                }
            });
        }

        if let Some(entry) = self.index.find_redirect(uri, draft).await?
            && entry.uri != uri
        {
            return Ok(Resolution::Redirect {
                location: display_path(&entry.uri).to_string(),
                collection: entry.source_collection,
                document_id: entry.document_id,
            });
        }
        Ok(Resolution::NotFound)
    }
}

fn mode(draft: bool) -> &'static str {
    DocumentStatus::for_draft_mode(draft).as_str()
}
