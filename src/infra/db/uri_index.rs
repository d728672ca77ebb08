use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{NewUriIndexEntry, RepoError, UriIndexRepo},
    domain::{entities::UriIndexRecord, types::DocumentStatus},
};

use super::{PostgresRepositories, map_sqlx_error, parse_status};

const ENTRY_COLUMNS: &str =
    "id, uri, source_collection, document_id, status, template_id, previous_uris, updated_at";

#[derive(sqlx::FromRow)]
struct UriIndexRow {
    id: Uuid,
    uri: String,
    source_collection: String,
    document_id: Uuid,
    status: String,
    template_id: Option<Uuid>,
    previous_uris: Vec<String>,
    updated_at: OffsetDateTime,
}

impl TryFrom<UriIndexRow> for UriIndexRecord {
    type Error = RepoError;

    fn try_from(row: UriIndexRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            uri: row.uri,
            source_collection: row.source_collection,
            document_id: row.document_id,
            status: parse_status(&row.status)?,
            template_id: row.template_id,
            previous_uris: row.previous_uris,
            updated_at: row.updated_at,
        })
    }
}

fn into_records(rows: Vec<UriIndexRow>) -> Result<Vec<UriIndexRecord>, RepoError> {
    rows.into_iter().map(UriIndexRecord::try_from).collect()
}

#[async_trait]
impl UriIndexRepo for PostgresRepositories {
    async fn find_by_uri(
        &self,
        uri: &str,
        status: Option<DocumentStatus>,
    ) -> Result<Vec<UriIndexRecord>, RepoError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM uri_index \
             WHERE uri = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY updated_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, UriIndexRow>(&sql)
            .bind(uri)
            .bind(status.map(DocumentStatus::as_str))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        into_records(rows)
    }

    async fn find_by_previous_uri(
        &self,
        uri: &str,
        status: Option<DocumentStatus>,
    ) -> Result<Vec<UriIndexRecord>, RepoError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM uri_index \
             WHERE previous_uris @> ARRAY[$1]::text[] AND ($2::text IS NULL OR status = $2) \
             ORDER BY updated_at DESC, id ASC"
        );
        let rows = sqlx::query_as::<_, UriIndexRow>(&sql)
            .bind(uri)
            .bind(status.map(DocumentStatus::as_str))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        into_records(rows)
    }

    async fn find_for_document(
        &self,
        collection: &str,
        document_id: Uuid,
    ) -> Result<Option<UriIndexRecord>, RepoError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM uri_index \
             WHERE source_collection = $1 AND document_id = $2"
        );
        let row = sqlx::query_as::<_, UriIndexRow>(&sql)
            .bind(collection)
            .bind(document_id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(UriIndexRecord::try_from).transpose()
    }

    async fn insert_entry(&self, entry: NewUriIndexEntry) -> Result<UriIndexRecord, RepoError> {
        let sql = format!(
            "INSERT INTO uri_index (id, uri, source_collection, document_id, status, \
             template_id, previous_uris) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {ENTRY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UriIndexRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&entry.uri)
            .bind(&entry.source_collection)
            .bind(entry.document_id)
            .bind(entry.status.as_str())
            .bind(entry.template_id)
            .bind(&entry.previous_uris)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        UriIndexRecord::try_from(row)
    }

    async fn update_entry(&self, entry: UriIndexRecord) -> Result<UriIndexRecord, RepoError> {
        let sql = format!(
            "UPDATE uri_index SET uri = $2, status = $3, template_id = $4, previous_uris = $5, \
             updated_at = now() WHERE id = $1 RETURNING {ENTRY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UriIndexRow>(&sql)
            .bind(entry.id)
            .bind(&entry.uri)
            .bind(entry.status.as_str())
            .bind(entry.template_id)
            .bind(&entry.previous_uris)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        UriIndexRecord::try_from(row)
    }

    async fn delete_for_document(
        &self,
        collection: &str,
        document_id: Uuid,
    ) -> Result<u64, RepoError> {
        let result =
            sqlx::query("DELETE FROM uri_index WHERE source_collection = $1 AND document_id = $2")
                .bind(collection)
                .bind(document_id)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn list_entries(
        &self,
        statuses: &[DocumentStatus],
    ) -> Result<Vec<UriIndexRecord>, RepoError> {
        let statuses: Vec<&str> = statuses.iter().map(|status| status.as_str()).collect();
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM uri_index WHERE status = ANY($1) ORDER BY uri ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, UriIndexRow>(&sql)
            .bind(&statuses)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        into_records(rows)
    }

    async fn clear(&self) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM uri_index")
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
