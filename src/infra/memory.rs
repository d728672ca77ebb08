//! Process-local repositories backing tests and `serve --in-memory`.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::repos::{
    CascadeJobsRepo, CreateDocumentParams, DocumentFilter, DocumentsRepo, NewCascadeJob,
    NewUriIndexEntry, PageRequest, RepoError, RoutingSettingsRepo, UriIndexRepo,
};
use crate::domain::entities::{
    CascadeJobRecord, DocumentRecord, RoutingSettingsRecord, UriIndexRecord,
};
use crate::domain::types::{DocumentStatus, JobState};

#[derive(Default)]
struct Store {
    documents: HashMap<Uuid, DocumentRecord>,
    settings: RoutingSettingsRecord,
    entries: HashMap<Uuid, UriIndexRecord>,
    jobs: HashMap<Uuid, CascadeJobRecord>,
}

#[derive(Default)]
pub struct InMemoryRepositories {
    store: RwLock<Store>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}

fn status_matches(entry: &UriIndexRecord, status: Option<DocumentStatus>) -> bool {
    status.is_none_or(|status| entry.status == status)
}

#[async_trait]
impl DocumentsRepo for InMemoryRepositories {
    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<DocumentRecord>, RepoError> {
        let store = self.store.read().await;
        Ok(store
            .documents
            .get(&id)
            .filter(|doc| doc.collection == collection)
            .cloned())
    }

    async fn find_one(&self, filter: &DocumentFilter) -> Result<Option<DocumentRecord>, RepoError> {
        let mut found = self.find_many(filter, PageRequest::new(1, 0)).await?;
        Ok(found.pop())
    }

    async fn find_many(
        &self,
        filter: &DocumentFilter,
        page: PageRequest,
    ) -> Result<Vec<DocumentRecord>, RepoError> {
        let store = self.store.read().await;
        let mut matching: Vec<&DocumentRecord> = store
            .documents
            .values()
            .filter(|doc| filter.matches(doc))
            .collect();
        matching.sort_by_key(|doc| (doc.created_at, doc.id));

        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    async fn create(&self, params: CreateDocumentParams) -> Result<DocumentRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = DocumentRecord {
            id: Uuid::new_v4(),
            collection: params.collection,
            slug: params.slug,
            uri: params.uri,
            status: params.status,
            parent_id: params.parent_id,
            title: params.title,
            in_navigation: params.in_navigation,
            content: params.content,
            created_at: now,
            updated_at: now,
        };
        self.store
            .write()
            .await
            .documents
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(&self, mut document: DocumentRecord) -> Result<DocumentRecord, RepoError> {
        let mut store = self.store.write().await;
        let existing = store
            .documents
            .get_mut(&document.id)
            .filter(|doc| doc.collection == document.collection)
            .ok_or(RepoError::NotFound)?;
        document.created_at = existing.created_at;
        document.updated_at = OffsetDateTime::now_utc();
        *existing = document.clone();
        Ok(document)
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<(), RepoError> {
        let mut store = self.store.write().await;
        match store.documents.get(&id) {
            Some(doc) if doc.collection == collection => {
                store.documents.remove(&id);
                Ok(())
            }
            _ => Err(RepoError::NotFound),
        }
    }
}

#[async_trait]
impl RoutingSettingsRepo for InMemoryRepositories {
    async fn load_routing_settings(&self) -> Result<RoutingSettingsRecord, RepoError> {
        Ok(self.store.read().await.settings.clone())
    }

    async fn save_routing_settings(
        &self,
        mut settings: RoutingSettingsRecord,
    ) -> Result<RoutingSettingsRecord, RepoError> {
        settings.updated_at = Some(OffsetDateTime::now_utc());
        self.store.write().await.settings = settings.clone();
        Ok(settings)
    }
}

#[async_trait]
impl UriIndexRepo for InMemoryRepositories {
    async fn find_by_uri(
        &self,
        uri: &str,
        status: Option<DocumentStatus>,
    ) -> Result<Vec<UriIndexRecord>, RepoError> {
        let store = self.store.read().await;
        let mut entries: Vec<UriIndexRecord> = store
            .entries
            .values()
            .filter(|entry| entry.uri == uri && status_matches(entry, status))
            .cloned()
            .collect();
        entries.sort_by_key(|entry| (entry.updated_at, entry.id));
        Ok(entries)
    }

    async fn find_by_previous_uri(
        &self,
        uri: &str,
        status: Option<DocumentStatus>,
    ) -> Result<Vec<UriIndexRecord>, RepoError> {
        let store = self.store.read().await;
        let mut entries: Vec<UriIndexRecord> = store
            .entries
            .values()
            .filter(|entry| {
                status_matches(entry, status) && entry.previous_uris.iter().any(|p| p == uri)
            })
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    async fn find_for_document(
        &self,
        collection: &str,
        document_id: Uuid,
    ) -> Result<Option<UriIndexRecord>, RepoError> {
        let store = self.store.read().await;
        Ok(store
            .entries
            .values()
            .find(|entry| entry.source_collection == collection && entry.document_id == document_id)
            .cloned())
    }

    async fn insert_entry(&self, entry: NewUriIndexEntry) -> Result<UriIndexRecord, RepoError> {
        let mut store = self.store.write().await;
        let taken = store.entries.values().any(|existing| {
            existing.source_collection == entry.source_collection
                && existing.document_id == entry.document_id
        });
        if taken {
            return Err(RepoError::Duplicate {
                constraint: "uri_index_document_key".into(),
            });
        }

        let record = UriIndexRecord {
            id: Uuid::new_v4(),
            uri: entry.uri,
            source_collection: entry.source_collection,
            document_id: entry.document_id,
            status: entry.status,
            template_id: entry.template_id,
            previous_uris: entry.previous_uris,
            updated_at: OffsetDateTime::now_utc(),
        };
        store.entries.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_entry(&self, mut entry: UriIndexRecord) -> Result<UriIndexRecord, RepoError> {
        let mut store = self.store.write().await;
        let existing = store.entries.get_mut(&entry.id).ok_or(RepoError::NotFound)?;
        entry.updated_at = OffsetDateTime::now_utc();
        *existing = entry.clone();
        Ok(entry)
    }

    async fn delete_for_document(
        &self,
        collection: &str,
        document_id: Uuid,
    ) -> Result<u64, RepoError> {
        let mut store = self.store.write().await;
        let before = store.entries.len();
        store.entries.retain(|_, entry| {
            !(entry.source_collection == collection && entry.document_id == document_id)
        });
        Ok((before - store.entries.len()) as u64)
    }

    async fn list_entries(
        &self,
        statuses: &[DocumentStatus],
    ) -> Result<Vec<UriIndexRecord>, RepoError> {
        let store = self.store.read().await;
        let mut entries: Vec<UriIndexRecord> = store
            .entries
            .values()
            .filter(|entry| statuses.contains(&entry.status))
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.uri.cmp(&b.uri).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    async fn clear(&self) -> Result<(), RepoError> {
        self.store.write().await.entries.clear();
        Ok(())
    }
}

#[async_trait]
impl CascadeJobsRepo for InMemoryRepositories {
    async fn enqueue_job(&self, job: NewCascadeJob) -> Result<CascadeJobRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = CascadeJobRecord {
            id: Uuid::new_v4(),
            operation: job.operation,
            triggering_entity_id: job.triggering_entity_id,
            payload: job.payload,
            idempotency_key: job.idempotency_key,
            state: JobState::Pending,
            attempts: 0,
            max_attempts: job.max_attempts,
            last_error: None,
            processed_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.store
            .write()
            .await
            .jobs
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<CascadeJobRecord>, RepoError> {
        Ok(self.store.read().await.jobs.get(&id).cloned())
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<CascadeJobRecord>, RepoError> {
        let store = self.store.read().await;
        Ok(store
            .jobs
            .values()
            .filter(|job| job.idempotency_key == key)
            .max_by_key(|job| (job.created_at, job.id))
            .cloned())
    }

    async fn update_job(&self, mut job: CascadeJobRecord) -> Result<(), RepoError> {
        let mut store = self.store.write().await;
        let existing = store.jobs.get_mut(&job.id).ok_or(RepoError::NotFound)?;
        job.updated_at = OffsetDateTime::now_utc();
        *existing = job;
        Ok(())
    }

    async fn list_resumable(&self) -> Result<Vec<CascadeJobRecord>, RepoError> {
        let store = self.store.read().await;
        let mut jobs: Vec<CascadeJobRecord> = store
            .jobs
            .values()
            .filter(|job| !job.state.is_terminal())
            .cloned()
            .collect();
        jobs.sort_by_key(|job| (job.created_at, job.id));
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::types::CascadeOperation;

    fn page(slug: &str) -> CreateDocumentParams {
        CreateDocumentParams {
            collection: "pages".into(),
            slug: slug.into(),
            uri: None,
            status: DocumentStatus::Published,
            parent_id: None,
            title: slug.into(),
            in_navigation: false,
            content: json!({}),
        }
    }

    #[tokio::test]
    async fn find_many_pages_in_creation_order() {
        let repos = InMemoryRepositories::new();
        let mut ids = Vec::new();
        for slug in ["a", "b", "c"] {
            ids.push(repos.create(page(slug)).await.unwrap().id);
        }

        let filter = DocumentFilter::collection("pages");
        let first = repos.find_many(&filter, PageRequest::new(2, 0)).await.unwrap();
        let rest = repos.find_many(&filter, PageRequest::new(2, 2)).await.unwrap();
        let all = repos.find_many(&filter, PageRequest::first()).await.unwrap();
        let seen: Vec<Uuid> = first.iter().chain(rest.iter()).map(|d| d.id).collect();
        let listed: Vec<Uuid> = all.iter().map(|d| d.id).collect();

        assert_eq!(first.len(), 2);
        assert_eq!(rest.len(), 1);
        assert_eq!(seen, listed);
        ids.sort();
        let mut sorted = listed;
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn update_of_other_collection_is_not_found() {
        let repos = InMemoryRepositories::new();
        let mut doc = repos.create(page("a")).await.unwrap();
        doc.collection = "posts".into();
        assert!(matches!(repos.update(doc).await, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn index_rejects_second_entry_for_document() {
        let repos = InMemoryRepositories::new();
        let entry = NewUriIndexEntry {
            uri: "/a".into(),
            source_collection: "pages".into(),
            document_id: Uuid::new_v4(),
            status: DocumentStatus::Published,
            template_id: None,
            previous_uris: vec!["/old".into()],
        };
        repos.insert_entry(entry.clone()).await.unwrap();
        assert!(matches!(
            repos.insert_entry(entry).await,
            Err(RepoError::Duplicate { .. })
        ));

        let redirects = repos
            .find_by_previous_uri("/old", Some(DocumentStatus::Published))
            .await
            .unwrap();
        assert_eq!(redirects.len(), 1);
        assert!(
            repos
                .find_by_previous_uri("/old", Some(DocumentStatus::Draft))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn resumable_jobs_exclude_terminal_states() {
        let repos = InMemoryRepositories::new();
        let job = NewCascadeJob {
            operation: CascadeOperation::HomepageChange,
            triggering_entity_id: Uuid::new_v4(),
            payload: json!({}),
            idempotency_key: "k".into(),
            max_attempts: 3,
        };
        let mut done = repos.enqueue_job(job.clone()).await.unwrap();
        let pending = repos.enqueue_job(job).await.unwrap();
        done.state = JobState::Done;
        repos.update_job(done).await.unwrap();

        let resumable = repos.list_resumable().await.unwrap();
        assert_eq!(resumable.len(), 1);
        assert_eq!(resumable[0].id, pending.id);
        assert_eq!(resumable[0].attempts, 0);
    }
}
