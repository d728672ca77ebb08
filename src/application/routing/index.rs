//! URI secondary index service.
//!
//! The index maps every routed URI to the document that owns it so the read
//! path resolves a URI with one keyed lookup instead of scanning collections.
//!
//! Consistency: the index is maintained after the primary write commits and
//! is not part of that write's transaction. A failed index update is logged
//! and the document write still succeeds, so the index may briefly disagree
//! with the documents (a fresh document unreachable by URI, or a stale URI
//! still pointing at its old owner) until the next successful write, cascade
//! or `reindex`. Two cascades racing over the same dependents converge on the
//! result of whichever finishes last. Callers that need a strict answer
//! should regenerate from the documents rather than trust the index.

use std::cmp::Reverse;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::repos::{NewUriIndexEntry, RepoError, UriIndexRepo};
use crate::domain::collections::FrontendCollections;
use crate::domain::entities::UriIndexRecord;
use crate::domain::types::DocumentStatus;
use crate::domain::uri::{normalize, push_history};

/// One document claiming a URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UriClaimant {
    pub collection: String,
    pub document_id: Option<Uuid>,
    /// Position in the frontend collection order; `None` ranks last.
    pub priority: Option<usize>,
}

/// Several documents resolving to the same URI for one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UriConflict {
    pub uri: String,
    pub status: DocumentStatus,
    /// Every claimant, highest priority first. The first one owns the URI.
    pub claimants: Vec<UriClaimant>,
}

impl UriConflict {
    pub fn winner(&self) -> &UriClaimant {
        &self.claimants[0]
    }

    /// Whether the document being written is the owner of the URI.
    pub fn candidate_wins(&self, collection: &str, document_id: Option<Uuid>) -> bool {
        let winner = self.winner();
        winner.collection == collection && winner.document_id == document_id
    }
}

/// Arguments of an index upsert.
#[derive(Debug, Clone)]
pub struct UriUpsert {
    pub uri: String,
    pub collection: String,
    pub document_id: Uuid,
    pub status: DocumentStatus,
    pub template_id: Option<Uuid>,
    /// URI the document was served at before this write, if known.
    pub previous_uri: Option<String>,
}

pub struct UriIndexService {
    repo: Arc<dyn UriIndexRepo>,
    collections: FrontendCollections,
}

impl UriIndexService {
    pub fn new(repo: Arc<dyn UriIndexRepo>, collections: FrontendCollections) -> Self {
        Self { repo, collections }
    }

    pub fn collections(&self) -> &FrontendCollections {
        &self.collections
    }

    /// Create or update the entry of a document.
    ///
    /// An existing entry is updated in place. The URI it carried before and
    /// the explicit `previous_uri` are both pushed onto its bounded history,
    /// the latter as the newest.
    pub async fn upsert(&self, upsert: UriUpsert) -> Result<UriIndexRecord, RepoError> {
        let uri = normalize(&upsert.uri);
        let existing = self
            .repo
            .find_for_document(&upsert.collection, upsert.document_id)
            .await?;

        let record = match existing {
            Some(mut entry) => {
                // The entry may lag behind the document after a failed
                // update, so its own URI is kept as well as the caller's.
                push_history(&mut entry.previous_uris, &entry.uri, &uri);
                if let Some(previous) = upsert.previous_uri.as_deref() {
                    push_history(&mut entry.previous_uris, &normalize(previous), &uri);
                }
                entry.uri = uri;
                entry.status = upsert.status;
                entry.template_id = upsert.template_id;
                self.repo.update_entry(entry).await?
            }
            None => {
                let mut previous_uris = Vec::new();
                if let Some(previous) = upsert.previous_uri.as_deref() {
                    push_history(&mut previous_uris, &normalize(previous), &uri);
                }
                self.repo
                    .insert_entry(NewUriIndexEntry {
                        uri,
                        source_collection: upsert.collection,
                        document_id: upsert.document_id,
                        status: upsert.status,
                        template_id: upsert.template_id,
                        previous_uris,
                    })
                    .await?
            }
        };

        info!(
            uri = %record.uri,
            collection = %record.source_collection,
            document_id = %record.document_id,
            status = %record.status,
            history = record.previous_uris.len(),
            "uri index upserted"
        );
        Ok(record)
    }

    pub async fn delete(&self, collection: &str, document_id: Uuid) -> Result<u64, RepoError> {
        let removed = self.repo.delete_for_document(collection, document_id).await?;
        debug!(collection, %document_id, removed, "uri index entry deleted");
        Ok(removed)
    }

    /// Entry owning `uri`. With several claimants the highest-priority
    /// collection wins; without a status filter published entries win ties.
    pub async fn lookup(
        &self,
        uri: &str,
        status: Option<DocumentStatus>,
    ) -> Result<Option<UriIndexRecord>, RepoError> {
        let uri = normalize(uri);
        let entries = self.repo.find_by_uri(&uri, status).await?;
        Ok(self.rank(entries).into_iter().next())
    }

    /// Lookup as seen by the read path: drafts see draft entries first and
    /// fall back to published ones.
    pub async fn lookup_for_mode(
        &self,
        uri: &str,
        draft: bool,
    ) -> Result<Option<UriIndexRecord>, RepoError> {
        if draft && let Some(entry) = self.lookup(uri, Some(DocumentStatus::Draft)).await? {
            return Ok(Some(entry));
        }
        self.lookup(uri, Some(DocumentStatus::Published)).await
    }

    /// Current entry of a document that used to be served at `uri`.
    pub async fn find_redirect(
        &self,
        uri: &str,
        draft: bool,
    ) -> Result<Option<UriIndexRecord>, RepoError> {
        let status = (!draft).then_some(DocumentStatus::Published);
        let entries = self.repo.find_by_previous_uri(&normalize(uri), status).await?;
        Ok(entries.into_iter().next())
    }

    pub async fn find_for_document(
        &self,
        collection: &str,
        document_id: Uuid,
    ) -> Result<Option<UriIndexRecord>, RepoError> {
        self.repo.find_for_document(collection, document_id).await
    }

    /// Every indexed URI with `status`, sorted and deduplicated.
    pub async fn list_all(&self, status: DocumentStatus) -> Result<Vec<String>, RepoError> {
        self.list_statuses(&[status]).await
    }

    /// URIs visible to the read path in the given mode.
    pub async fn list_for_mode(&self, draft: bool) -> Result<Vec<String>, RepoError> {
        if draft {
            self.list_statuses(&[DocumentStatus::Draft, DocumentStatus::Published])
                .await
        } else {
            self.list_statuses(&[DocumentStatus::Published]).await
        }
    }

    async fn list_statuses(&self, statuses: &[DocumentStatus]) -> Result<Vec<String>, RepoError> {
        let mut uris: Vec<String> = self
            .repo
            .list_entries(statuses)
            .await?
            .into_iter()
            .map(|entry| entry.uri)
            .collect();
        uris.sort();
        uris.dedup();
        Ok(uris)
    }

    /// Report other documents already claiming `uri` for `status`.
    ///
    /// The candidate is ranked with the existing claimants; within one
    /// collection an existing claimant outranks the candidate.
    pub async fn check_conflict(
        &self,
        uri: &str,
        status: DocumentStatus,
        collection: &str,
        document_id: Option<Uuid>,
    ) -> Result<Option<UriConflict>, RepoError> {
        let uri = normalize(uri);
        let others: Vec<UriIndexRecord> = self
            .repo
            .find_by_uri(&uri, Some(status))
            .await?
            .into_iter()
            .filter(|entry| {
                !(entry.source_collection == collection && Some(entry.document_id) == document_id)
            })
            .collect();
        if others.is_empty() {
            return Ok(None);
        }

        let mut claimants: Vec<UriClaimant> = self
            .rank(others)
            .into_iter()
            .map(|entry| UriClaimant {
                priority: self.collections.priority(&entry.source_collection),
                collection: entry.source_collection,
                document_id: Some(entry.document_id),
            })
            .collect();
        claimants.push(UriClaimant {
            collection: collection.to_string(),
            document_id,
            priority: self.collections.priority(collection),
        });
        claimants.sort_by_key(|claimant| claimant.priority.unwrap_or(usize::MAX));

        Ok(Some(UriConflict {
            uri,
            status,
            claimants,
        }))
    }

    /// Order entries by collection priority, then published before draft,
    /// then oldest update first.
    fn rank(&self, mut entries: Vec<UriIndexRecord>) -> Vec<UriIndexRecord> {
        entries.sort_by_key(|entry| {
            (
                self.collections
                    .priority(&entry.source_collection)
                    .unwrap_or(usize::MAX),
                Reverse(entry.status == DocumentStatus::Published),
                entry.updated_at,
            )
        });
        entries
    }
}
