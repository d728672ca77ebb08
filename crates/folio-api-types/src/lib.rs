//! Request and response bodies of the Folio routing API.
//!
//! These types are shared by the server and by clients. They carry no
//! behaviour beyond serde.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Publication state as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Published,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Body of `POST /collections/{collection}/documents` and
/// `PUT /collections/{collection}/documents/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentWriteRequest {
    /// Derived from the title when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub title: String,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub in_navigation: bool,
    #[serde(default = "empty_object")]
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentView {
    pub id: Uuid,
    pub collection: String,
    pub slug: String,
    /// Request path of the document, `/` for the homepage.
    pub uri: Option<String>,
    pub status: DocumentStatus,
    pub parent_id: Option<Uuid>,
    pub title: String,
    pub in_navigation: bool,
    pub content: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriClaimantView {
    pub collection: String,
    pub document_id: Option<Uuid>,
}

/// Documents competing for one URI, owner first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriConflictView {
    pub uri: String,
    pub claimants: Vec<UriClaimantView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeSummary {
    pub job_id: Uuid,
    pub operation: String,
    pub state: String,
    pub attempts: i32,
    pub regenerated: usize,
    pub skipped: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub document: DocumentView,
    /// Set when the URI fell back to `/{collection}/{id}`.
    #[serde(default)]
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<UriConflictView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_error: Option<String>,
    pub invalidated_tags: Vec<String>,
    pub invalidated_paths: Vec<String>,
    #[serde(default)]
    pub cascades: Vec<CascadeSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub id: Uuid,
    pub invalidated_tags: Vec<String>,
    pub invalidated_paths: Vec<String>,
    #[serde(default)]
    pub cascades: Vec<CascadeSummary>,
}

/// Body of `GET /resolve` when the path belongs to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDocument {
    pub collection: String,
    pub template_id: Option<Uuid>,
    pub document: DocumentView,
}

/// Body of `GET /resolve` when the path moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectTarget {
    pub location: String,
    pub collection: String,
    pub document_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriListResponse {
    pub uris: Vec<String>,
}

/// Body of `PUT /settings/routing`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSettingsRequest {
    #[serde(default)]
    pub homepage_id: Option<Uuid>,
    /// Collection name to the page that owns its URI prefix.
    #[serde(default)]
    pub archive_pages: BTreeMap<String, Uuid>,
    /// Collection name to the template rendering its items.
    #[serde(default)]
    pub templates: BTreeMap<String, Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSettingsResponse {
    pub homepage_id: Option<Uuid>,
    pub archive_pages: BTreeMap<String, Uuid>,
    pub templates: BTreeMap<String, Uuid>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub updated_at: Option<OffsetDateTime>,
    pub invalidated_tags: Vec<String>,
    #[serde(default)]
    pub cascades: Vec<CascadeSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheClearResponse {
    pub removed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}
