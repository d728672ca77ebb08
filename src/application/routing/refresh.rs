//! Regeneration of a stored document's URI, shared by cascades and reindex.

use tracing::debug;

use crate::application::changes::detect;
use crate::application::error::AppError;
use crate::application::invalidation::DocumentChange;
use crate::application::repos::DocumentsRepo;
use crate::domain::entities::{DocumentRecord, RoutingSettingsRecord};
use crate::domain::types::WriteOperation;

use super::{GeneratedUri, UriGenerator, UriIndexService, UriRequest, UriUpsert};

/// Outcome of [`refresh`].
#[derive(Debug, Clone)]
pub struct RefreshedUri {
    pub generated: GeneratedUri,
    /// The URI the document was reachable at before: its index entry's, or
    /// the stored one when the document has no entry yet.
    pub old_uri: Option<String>,
    /// Whether the stored document had to be rewritten.
    pub document_updated: bool,
    pub change: DocumentChange,
}

/// Regenerate the URI of `document`, persist it and refresh its index entry.
///
/// The change record compares against the indexed URI, not the stored one.
/// After an earlier pass updated the document but failed on the index, the
/// stored URI is already the new one while the index still serves the old
/// path, and that path has to be invalidated.
pub async fn refresh(
    documents: &dyn DocumentsRepo,
    generator: &UriGenerator,
    index: &UriIndexService,
    document: DocumentRecord,
    settings: &RoutingSettingsRecord,
) -> Result<RefreshedUri, AppError> {
    let generated = generator
        .generate(UriRequest::for_document(&document), settings)
        .await;
    let indexed = index
        .find_for_document(&document.collection, document.id)
        .await?
        .map(|entry| entry.uri);
    let old_uri = indexed.or_else(|| document.uri.clone());

    let document_updated = document.uri.as_deref() != Some(generated.uri.as_str());
    let updated = if document_updated {
        let mut next = document.clone();
        next.uri = Some(generated.uri.clone());
        documents.update(next).await?
    } else {
        document.clone()
    };

    index
        .upsert(UriUpsert {
            uri: generated.uri.clone(),
            collection: document.collection.clone(),
            document_id: document.id,
            status: document.status,
            template_id: settings.template_for(&document.collection),
            previous_uri: document.uri.clone(),
        })
        .await?;

    let mut before = document;
    if before.uri != old_uri {
        debug!(
            document_id = %before.id,
            stored = before.uri.as_deref().unwrap_or(""),
            indexed = old_uri.as_deref().unwrap_or(""),
            "index lagged behind the stored uri"
        );
        before.uri = old_uri.clone();
    }
    let change = detect(&updated, Some(&before), WriteOperation::Update);

    Ok(RefreshedUri {
        generated,
        old_uri,
        document_updated,
        change: DocumentChange {
            document: updated,
            change,
        },
    })
}
