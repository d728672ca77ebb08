use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CascadeJobsRepo, NewCascadeJob, RepoError},
    domain::{
        entities::CascadeJobRecord,
        types::{CascadeOperation, JobState},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

const JOB_COLUMNS: &str = "id, operation, triggering_entity_id, payload, idempotency_key, state, \
    attempts, max_attempts, last_error, processed_ids, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CascadeJobRow {
    id: Uuid,
    operation: String,
    triggering_entity_id: Uuid,
    payload: serde_json::Value,
    idempotency_key: String,
    state: String,
    attempts: i32,
    max_attempts: i32,
    last_error: Option<String>,
    processed_ids: Vec<Uuid>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<CascadeJobRow> for CascadeJobRecord {
    type Error = RepoError;

    fn try_from(row: CascadeJobRow) -> Result<Self, Self::Error> {
        let operation = CascadeOperation::try_from(row.operation.as_str()).map_err(|_| {
            RepoError::from_persistence(format!("unknown cascade operation `{}`", row.operation))
        })?;

        let state = JobState::try_from(row.state.as_str()).map_err(|_| {
            RepoError::from_persistence(format!("unknown job state `{}`", row.state))
        })?;

        Ok(Self {
            id: row.id,
            operation,
            triggering_entity_id: row.triggering_entity_id,
            payload: row.payload,
            idempotency_key: row.idempotency_key,
            state,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            last_error: row.last_error,
            processed_ids: row.processed_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl CascadeJobsRepo for PostgresRepositories {
    async fn enqueue_job(&self, job: NewCascadeJob) -> Result<CascadeJobRecord, RepoError> {
        let sql = format!(
            "INSERT INTO cascade_jobs (id, operation, triggering_entity_id, payload, \
             idempotency_key, state, attempts, max_attempts) \
             VALUES ($1, $2, $3, $4, $5, $6, 0, $7) RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CascadeJobRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(job.operation.as_str())
            .bind(job.triggering_entity_id)
            .bind(&job.payload)
            .bind(&job.idempotency_key)
            .bind(JobState::Pending.as_str())
            .bind(job.max_attempts)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        CascadeJobRecord::try_from(row)
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<CascadeJobRecord>, RepoError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM cascade_jobs WHERE id = $1");
        let row = sqlx::query_as::<_, CascadeJobRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(CascadeJobRecord::try_from).transpose()
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<CascadeJobRecord>, RepoError> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM cascade_jobs WHERE idempotency_key = $1 \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, CascadeJobRow>(&sql)
            .bind(key)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(CascadeJobRecord::try_from).transpose()
    }

    async fn update_job(&self, job: CascadeJobRecord) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE cascade_jobs
            SET state = $2,
                attempts = $3,
                last_error = $4,
                processed_ids = $5,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(job.state.as_str())
        .bind(job.attempts)
        .bind(job.last_error.as_deref())
        .bind(&job.processed_ids)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn list_resumable(&self) -> Result<Vec<CascadeJobRecord>, RepoError> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM cascade_jobs WHERE state IN ('Pending', 'Running') \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, CascadeJobRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(CascadeJobRecord::try_from).collect()
    }
}
