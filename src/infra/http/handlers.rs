use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use folio_api_types as api;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::application::resolver::Resolution;

use super::error::ApiError;
use super::models::{
    cascade_summaries, conflict_view, document_view, invalidated_paths, invalidated_tags,
};
use super::state::HttpState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResolveQuery {
    pub uri: Option<String>,
    pub draft: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DraftQuery {
    pub draft: bool,
}

pub async fn health() -> Json<api::HealthResponse> {
    Json(api::HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn resolve(
    State(state): State<HttpState>,
    Query(query): Query<ResolveQuery>,
) -> Result<Response, ApiError> {
    let Some(uri) = query.uri else {
        return Err(ApiError::bad_request(
            "Missing uri parameter",
            Some("pass ?uri=/path".to_string()),
        ));
    };

    let resolution = state.engine.resolver.resolve(&uri, query.draft).await?;
    match resolution {
        Resolution::Found {
            collection,
            document,
            template_id,
        } => Ok(Json(api::ResolvedDocument {
            collection,
            template_id,
            document: document_view(document),
        })
        .into_response()),
        Resolution::Redirect {
            location,
            collection,
            document_id,
        } => Ok((
            StatusCode::PERMANENT_REDIRECT,
            [(header::LOCATION, location.clone())],
            Json(api::RedirectTarget {
                location,
                collection,
                document_id,
            }),
        )
            .into_response()),
        Resolution::NotFound => Err(ApiError::not_found("No document at this uri")),
    }
}

pub async fn list_uris(
    State(state): State<HttpState>,
    Query(query): Query<DraftQuery>,
) -> Result<Json<api::UriListResponse>, ApiError> {
    let uris = state.engine.resolver.list_all_uris(query.draft).await?;
    Ok(Json(api::UriListResponse { uris }))
}

pub async fn create_document(
    State(state): State<HttpState>,
    Path(collection): Path<String>,
    Json(request): Json<api::DocumentWriteRequest>,
) -> Result<(StatusCode, Json<api::WriteResponse>), ApiError> {
    let outcome = state
        .engine
        .hooks
        .create_document(&collection, request.into())
        .await?;
    Ok((StatusCode::CREATED, Json(write_response(outcome))))
}

pub async fn update_document(
    State(state): State<HttpState>,
    Path((collection, id)): Path<(String, Uuid)>,
    Json(request): Json<api::DocumentWriteRequest>,
) -> Result<Json<api::WriteResponse>, ApiError> {
    let outcome = state
        .engine
        .hooks
        .update_document(&collection, id, request.into())
        .await?;
    Ok(Json(write_response(outcome)))
}

pub async fn delete_document(
    State(state): State<HttpState>,
    Path((collection, id)): Path<(String, Uuid)>,
) -> Result<Json<api::DeleteResponse>, ApiError> {
    let report = state.engine.hooks.delete_document(&collection, id).await?;
    Ok(Json(api::DeleteResponse {
        id,
        invalidated_tags: invalidated_tags(&report.invalidation),
        invalidated_paths: invalidated_paths(&report.invalidation),
        cascades: cascade_summaries(&report.cascades),
    }))
}

pub async fn save_routing_settings(
    State(state): State<HttpState>,
    Json(request): Json<api::RoutingSettingsRequest>,
) -> Result<Json<api::RoutingSettingsResponse>, ApiError> {
    let report = state
        .engine
        .hooks
        .save_routing_settings(request.into())
        .await?;
    Ok(Json(api::RoutingSettingsResponse {
        homepage_id: report.settings.homepage_id,
        archive_pages: report.settings.archive_pages,
        templates: report.settings.templates,
        updated_at: report.settings.updated_at,
        invalidated_tags: invalidated_tags(&report.invalidation),
        cascades: cascade_summaries(&report.cascades),
    }))
}

pub async fn clear_cache(State(state): State<HttpState>) -> Json<api::CacheClearResponse> {
    let removed = state.engine.invalidation.emergency_clear();
    info!(removed, "cache cleared on request");
    Json(api::CacheClearResponse { removed })
}

fn write_response(outcome: crate::application::hooks::WriteOutcome) -> api::WriteResponse {
    let after = &outcome.after;
    api::WriteResponse {
        degraded: outcome.generated.degraded,
        conflict: outcome.generated.conflict.as_ref().map(conflict_view),
        index_error: after.index_error.clone(),
        invalidated_tags: invalidated_tags(&after.invalidation),
        invalidated_paths: invalidated_paths(&after.invalidation),
        cascades: cascade_summaries(&after.cascades),
        document: document_view(outcome.document),
    }
}
