use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{RepoError, RoutingSettingsRepo},
    domain::entities::RoutingSettingsRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct RoutingSettingsRow {
    homepage_id: Option<Uuid>,
    archive_pages: Json<BTreeMap<String, Uuid>>,
    templates: Json<BTreeMap<String, Uuid>>,
    updated_at: Option<OffsetDateTime>,
}

impl From<RoutingSettingsRow> for RoutingSettingsRecord {
    fn from(row: RoutingSettingsRow) -> Self {
        Self {
            homepage_id: row.homepage_id,
            archive_pages: row.archive_pages.0,
            templates: row.templates.0,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl RoutingSettingsRepo for PostgresRepositories {
    async fn load_routing_settings(&self) -> Result<RoutingSettingsRecord, RepoError> {
        let row = sqlx::query_as::<_, RoutingSettingsRow>(
            r#"
            SELECT homepage_id, archive_pages, templates, updated_at
            FROM routing_settings
            WHERE id = 1
            "#,
        )
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(RoutingSettingsRecord::from).unwrap_or_default())
    }

    async fn save_routing_settings(
        &self,
        settings: RoutingSettingsRecord,
    ) -> Result<RoutingSettingsRecord, RepoError> {
        let row = sqlx::query_as::<_, RoutingSettingsRow>(
            r#"
            INSERT INTO routing_settings (id, homepage_id, archive_pages, templates, updated_at)
            VALUES (1, $1, $2, $3, now())
            ON CONFLICT (id) DO UPDATE SET
                homepage_id = EXCLUDED.homepage_id,
                archive_pages = EXCLUDED.archive_pages,
                templates = EXCLUDED.templates,
                updated_at = EXCLUDED.updated_at
            RETURNING homepage_id, archive_pages, templates, updated_at
            "#,
        )
        .bind(settings.homepage_id)
        .bind(Json(&settings.archive_pages))
        .bind(Json(&settings.templates))
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }
}
