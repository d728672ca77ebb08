use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreateDocumentParams, DocumentFilter, DocumentsRepo, PageRequest, ParentFilter, RepoError,
    },
    domain::entities::DocumentRecord,
};

use super::{PostgresRepositories, map_sqlx_error, parse_status};

const DOCUMENT_COLUMNS: &str = "id, collection, slug, uri, status, parent_id, title, \
    in_navigation, content, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    collection: String,
    slug: String,
    uri: Option<String>,
    status: String,
    parent_id: Option<Uuid>,
    title: String,
    in_navigation: bool,
    content: serde_json::Value,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<DocumentRow> for DocumentRecord {
    type Error = RepoError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            collection: row.collection,
            slug: row.slug,
            uri: row.uri,
            status: parse_status(&row.status)?,
            parent_id: row.parent_id,
            title: row.title,
            in_navigation: row.in_navigation,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl PostgresRepositories {
    fn apply_document_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q DocumentFilter) {
        qb.push(" WHERE collection = ");
        qb.push_bind(filter.collection.as_str());

        if let Some(status) = filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status.as_str());
        }

        if let Some(slug) = filter.slug.as_deref() {
            qb.push(" AND slug = ");
            qb.push_bind(slug);
        }

        match filter.parent {
            ParentFilter::Any => {}
            ParentFilter::Root => {
                qb.push(" AND parent_id IS NULL");
            }
            ParentFilter::Child(parent) => {
                qb.push(" AND parent_id = ");
                qb.push_bind(parent);
            }
        }
    }
}

#[async_trait]
impl DocumentsRepo for PostgresRepositories {
    async fn find_by_id(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<DocumentRecord>, RepoError> {
        let sql =
            format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 AND collection = $2");
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .bind(collection)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(DocumentRecord::try_from).transpose()
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
        let offset = i64::try_from(page.offset).map_err(|_| RepoError::InvalidInput {
            message: "offset exceeds supported range".to_string(),
        })?;

        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {DOCUMENT_COLUMNS} FROM documents"));
        Self::apply_document_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at ASC, id ASC LIMIT ");
        qb.push_bind(i64::from(page.limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<DocumentRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(DocumentRecord::try_from).collect()
    }

    async fn create(&self, params: CreateDocumentParams) -> Result<DocumentRecord, RepoError> {
        let sql = format!(
            "INSERT INTO documents (id, collection, slug, uri, status, parent_id, title, \
             in_navigation, content) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {DOCUMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&params.collection)
            .bind(&params.slug)
            .bind(params.uri.as_deref())
            .bind(params.status.as_str())
            .bind(params.parent_id)
            .bind(&params.title)
            .bind(params.in_navigation)
            .bind(&params.content)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        DocumentRecord::try_from(row)
    }

    async fn update(&self, document: DocumentRecord) -> Result<DocumentRecord, RepoError> {
        let sql = format!(
            "UPDATE documents SET slug = $3, uri = $4, status = $5, parent_id = $6, title = $7, \
             in_navigation = $8, content = $9, updated_at = now() \
             WHERE id = $1 AND collection = $2 RETURNING {DOCUMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(document.id)
            .bind(&document.collection)
            .bind(&document.slug)
            .bind(document.uri.as_deref())
            .bind(document.status.as_str())
            .bind(document.parent_id)
            .bind(&document.title)
            .bind(document.in_navigation)
            .bind(&document.content)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        DocumentRecord::try_from(row)
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1 AND collection = $2")
            .bind(id)
            .bind(collection)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
