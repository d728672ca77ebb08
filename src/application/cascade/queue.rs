use std::sync::Arc;

use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::repos::{CascadeJobsRepo, NewCascadeJob, RepoError};
use crate::domain::entities::CascadeJobRecord;
use crate::domain::types::JobState;

use super::CascadePayload;

/// SHA-256 over operation, triggering entity and payload, hex-encoded.
pub fn idempotency_key(payload: &CascadePayload) -> Result<String, RepoError> {
    let body = serde_json::to_vec(payload).map_err(RepoError::from_persistence)?;
    let mut hasher = Sha256::new();
    hasher.update(payload.operation().as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(payload.triggering_entity_id().as_bytes());
    hasher.update([0u8]);
    hasher.update(&body);
    Ok(hex::encode(hasher.finalize()))
}

/// Durable bookkeeping for cascade jobs.
#[derive(Clone)]
pub struct CascadeQueue {
    repo: Arc<dyn CascadeJobsRepo>,
    max_attempts: i32,
}

impl CascadeQueue {
    pub fn new(repo: Arc<dyn CascadeJobsRepo>, max_attempts: i32) -> Self {
        Self {
            repo,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> i32 {
        self.max_attempts
    }

    /// Queue `payload` unless a job with the same key is pending, running or
    /// done, in which case that job is returned.
    pub async fn enqueue(&self, payload: &CascadePayload) -> Result<CascadeJobRecord, RepoError> {
        let key = idempotency_key(payload)?;
        if let Some(existing) = self.repo.find_by_idempotency_key(&key).await?
            && existing.state != JobState::Failed
        {
            debug!(
                job_id = %existing.id,
                operation = existing.operation.as_str(),
                state = existing.state.as_str(),
                "cascade job already queued"
            );
            return Ok(existing);
        }

        let payload_value = serde_json::to_value(payload).map_err(RepoError::from_persistence)?;
        let job = self
            .repo
            .enqueue_job(NewCascadeJob {
                operation: payload.operation(),
                triggering_entity_id: payload.triggering_entity_id(),
                payload: payload_value,
                idempotency_key: key,
                max_attempts: self.max_attempts,
            })
            .await?;
        debug!(
            job_id = %job.id,
            operation = job.operation.as_str(),
            "cascade job queued"
        );
        Ok(job)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<CascadeJobRecord>, RepoError> {
        self.repo.find_job(id).await
    }

    /// Jobs left pending or running, oldest first.
    pub async fn resumable(&self) -> Result<Vec<CascadeJobRecord>, RepoError> {
        self.repo.list_resumable().await
    }

    /// Start an attempt.
    pub async fn begin_attempt(&self, job: &mut CascadeJobRecord) -> Result<(), RepoError> {
        job.state = JobState::Running;
        job.attempts += 1;
        job.updated_at = OffsetDateTime::now_utc();
        self.repo.update_job(job.clone()).await
    }

    /// Record one finished dependent. Bookkeeping failures are logged only;
    /// the worst outcome is that a resumed job redoes this dependent.
    pub async fn record_progress(&self, job: &mut CascadeJobRecord, document_id: Uuid) {
        if job.processed_ids.contains(&document_id) {
            return;
        }
        job.processed_ids.push(document_id);
        job.updated_at = OffsetDateTime::now_utc();
        if let Err(err) = self.repo.update_job(job.clone()).await {
            warn!(
                job_id = %job.id,
                %document_id,
                error = %err,
                "failed to record cascade progress"
            );
        }
    }

    pub async fn complete(&self, job: &mut CascadeJobRecord) -> Result<(), RepoError> {
        job.state = JobState::Done;
        job.last_error = None;
        job.updated_at = OffsetDateTime::now_utc();
        self.repo.update_job(job.clone()).await
    }

    /// Close a failed attempt. Returns whether another attempt is allowed.
    pub async fn fail_attempt(
        &self,
        job: &mut CascadeJobRecord,
        error: String,
    ) -> Result<bool, RepoError> {
        let retry = job.attempts < job.max_attempts;
        job.state = if retry {
            JobState::Pending
        } else {
            JobState::Failed
        };
        job.last_error = Some(error);
        job.updated_at = OffsetDateTime::now_utc();
        self.repo.update_job(job.clone()).await?;
        Ok(retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::InMemoryRepositories;

    fn payload(revision: OffsetDateTime) -> CascadePayload {
        CascadePayload::PageHierarchyUpdate {
            page_id: Uuid::from_u128(7),
            old_uri: Some("/team".into()),
            new_uri: Some("/about/team".into()),
            revision,
        }
    }

    #[test]
    fn key_is_stable_hex() {
        let a = idempotency_key(&payload(OffsetDateTime::UNIX_EPOCH)).unwrap();
        let b = idempotency_key(&payload(OffsetDateTime::UNIX_EPOCH)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));

        let later = OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(1);
        assert_ne!(a, idempotency_key(&payload(later)).unwrap());
    }

    #[tokio::test]
    async fn enqueue_returns_existing_job_for_same_key() {
        let queue = CascadeQueue::new(Arc::new(InMemoryRepositories::new()), 3);
        let first = queue.enqueue(&payload(OffsetDateTime::UNIX_EPOCH)).await.unwrap();
        let second = queue.enqueue(&payload(OffsetDateTime::UNIX_EPOCH)).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.state, JobState::Pending);
        assert_eq!(first.max_attempts, 3);
    }

    #[tokio::test]
    async fn failed_job_is_requeued() {
        let queue = CascadeQueue::new(Arc::new(InMemoryRepositories::new()), 1);
        let mut job = queue.enqueue(&payload(OffsetDateTime::UNIX_EPOCH)).await.unwrap();
        queue.begin_attempt(&mut job).await.unwrap();
        let retry = queue.fail_attempt(&mut job, "boom".into()).await.unwrap();
        assert!(!retry);
        assert_eq!(job.state, JobState::Failed);

        let fresh = queue.enqueue(&payload(OffsetDateTime::UNIX_EPOCH)).await.unwrap();
        assert_ne!(fresh.id, job.id);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let queue = CascadeQueue::new(Arc::new(InMemoryRepositories::new()), 2);
        let mut job = queue.enqueue(&payload(OffsetDateTime::UNIX_EPOCH)).await.unwrap();

        queue.begin_attempt(&mut job).await.unwrap();
        assert!(queue.fail_attempt(&mut job, "first".into()).await.unwrap());
        assert_eq!(job.state, JobState::Pending);

        queue.begin_attempt(&mut job).await.unwrap();
        assert!(!queue.fail_attempt(&mut job, "second".into()).await.unwrap());
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.last_error.as_deref(), Some("second"));

        let stored = queue.find(job.id).await.unwrap().unwrap();
        assert_eq!(stored.attempts, 2);
    }

    #[tokio::test]
    async fn progress_is_persisted_once_per_document() {
        let queue = CascadeQueue::new(Arc::new(InMemoryRepositories::new()), 3);
        let mut job = queue.enqueue(&payload(OffsetDateTime::UNIX_EPOCH)).await.unwrap();
        let id = Uuid::new_v4();
        queue.record_progress(&mut job, id).await;
        queue.record_progress(&mut job, id).await;

        let stored = queue.find(job.id).await.unwrap().unwrap();
        assert_eq!(stored.processed_ids, vec![id]);
        assert_eq!(queue.resumable().await.unwrap().len(), 1);
    }
}
