//! Conversions between engine records and wire types.

use folio_api_types as api;

use crate::application::cascade::CascadeReport;
use crate::application::hooks::DocumentInput;
use crate::application::invalidation::InvalidationSummary;
use crate::application::routing::UriConflict;
use crate::domain::entities::{DocumentRecord, RoutingSettingsRecord};
use crate::domain::types::DocumentStatus;
use crate::domain::uri::display_path;

pub fn status_from_api(status: api::DocumentStatus) -> DocumentStatus {
    match status {
        api::DocumentStatus::Draft => DocumentStatus::Draft,
        api::DocumentStatus::Published => DocumentStatus::Published,
    }
}

pub fn status_to_api(status: DocumentStatus) -> api::DocumentStatus {
    match status {
        DocumentStatus::Draft => api::DocumentStatus::Draft,
        DocumentStatus::Published => api::DocumentStatus::Published,
    }
}

impl From<api::DocumentWriteRequest> for DocumentInput {
    fn from(request: api::DocumentWriteRequest) -> Self {
        Self {
            slug: request.slug,
            title: request.title,
            status: status_from_api(request.status),
            parent_id: request.parent_id,
            in_navigation: request.in_navigation,
            content: request.content,
        }
    }
}

pub fn document_view(document: DocumentRecord) -> api::DocumentView {
    api::DocumentView {
        id: document.id,
        uri: document.uri.as_deref().map(|uri| display_path(uri).to_string()),
        collection: document.collection,
        slug: document.slug,
        status: status_to_api(document.status),
        parent_id: document.parent_id,
        title: document.title,
        in_navigation: document.in_navigation,
        content: document.content,
        created_at: document.created_at,
        updated_at: document.updated_at,
    }
}

pub fn conflict_view(conflict: &UriConflict) -> api::UriConflictView {
    api::UriConflictView {
        uri: display_path(&conflict.uri).to_string(),
        claimants: conflict
            .claimants
            .iter()
            .map(|claimant| api::UriClaimantView {
                collection: claimant.collection.clone(),
                document_id: claimant.document_id,
            })
            .collect(),
    }
}

pub fn cascade_summary(report: &CascadeReport) -> api::CascadeSummary {
    api::CascadeSummary {
        job_id: report.job_id,
        operation: report.operation.as_str().to_string(),
        state: report.state.as_str().to_string(),
        attempts: report.attempts,
        regenerated: report.regenerated.len(),
        skipped: report.skipped,
        errors: report
            .errors
            .iter()
            .map(|failure| match failure.document_id {
                Some(id) => format!("{id}: {}", failure.message),
                None => failure.message.clone(),
            })
            .collect(),
    }
}

pub fn cascade_summaries(reports: &[CascadeReport]) -> Vec<api::CascadeSummary> {
    reports.iter().map(cascade_summary).collect()
}

pub fn invalidated_tags(summary: &InvalidationSummary) -> Vec<String> {
    summary
        .tags_invalidated
        .iter()
        .map(|tag| tag.as_str().to_string())
        .collect()
}

pub fn invalidated_paths(summary: &InvalidationSummary) -> Vec<String> {
    summary.paths_invalidated.iter().cloned().collect()
}

impl From<api::RoutingSettingsRequest> for RoutingSettingsRecord {
    fn from(request: api::RoutingSettingsRequest) -> Self {
        Self {
            homepage_id: request.homepage_id,
            archive_pages: request.archive_pages,
            templates: request.templates,
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn homepage_document_shows_root_path() {
        let now = OffsetDateTime::now_utc();
        let view = document_view(DocumentRecord {
            id: Uuid::new_v4(),
            collection: "pages".into(),
            slug: "home".into(),
            uri: Some(String::new()),
            status: DocumentStatus::Published,
            parent_id: None,
            title: "Home".into(),
            in_navigation: true,
            content: json!({}),
            created_at: now,
            updated_at: now,
        });
        assert_eq!(view.uri.as_deref(), Some("/"));
        assert_eq!(view.status, api::DocumentStatus::Published);
    }
}
