//! Editorial write path.
//!
//! Every document write goes through `before_write` (slug and URI injection),
//! the store, then `after_write` (index, invalidation, cascades). Failures
//! after the store write are logged and reported, never returned: the
//! editorial write is already committed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::cascade::{CascadeExecutor, CascadePayload, CascadeReport};
use crate::application::changes::{ChangeRecord, ImpactAssessment, detect};
use crate::application::dependencies::{
    SettingsDiff, archive_cascade_required, descendant_refresh_required,
    hierarchy_cascade_required,
};
use crate::application::error::AppError;
use crate::application::invalidation::{InvalidationOrchestrator, InvalidationSummary};
use crate::application::repos::{
    CreateDocumentParams, DocumentFilter, DocumentsRepo, ParentFilter, RoutingSettingsRepo,
};
use crate::application::routing::{
    GeneratedUri, UriGenerator, UriIndexService, UriRequest, UriUpsert,
};
use crate::domain::entities::{DocumentRecord, RoutingSettingsRecord};
use crate::domain::slug::{derive_slug, validate_slug};
use crate::domain::types::{DocumentStatus, PAGES_COLLECTION, WriteOperation};

/// What `before_write` does when the new document would lose a URI conflict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Log the conflict and let the write proceed.
    #[default]
    Warn,
    /// Refuse the write.
    Reject,
}

/// Editor-supplied fields of a document write.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInput {
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub title: String,
    pub status: DocumentStatus,
    pub parent_id: Option<Uuid>,
    pub in_navigation: bool,
    pub content: serde_json::Value,
}

/// A write ready for the store, with slug and URI filled in.
#[derive(Debug, Clone)]
pub struct PreparedWrite {
    pub collection: String,
    pub slug: String,
    pub input: DocumentInput,
    pub generated: GeneratedUri,
}

impl PreparedWrite {
    pub fn uri(&self) -> &str {
        &self.generated.uri
    }

    fn into_create_params(self) -> CreateDocumentParams {
        CreateDocumentParams {
            collection: self.collection,
            slug: self.slug,
            uri: Some(self.generated.uri),
            status: self.input.status,
            parent_id: self.input.parent_id,
            title: self.input.title,
            in_navigation: self.input.in_navigation,
            content: self.input.content,
        }
    }

    fn apply_to(self, previous: &DocumentRecord) -> DocumentRecord {
        DocumentRecord {
            slug: self.slug,
            uri: Some(self.generated.uri),
            status: self.input.status,
            parent_id: self.input.parent_id,
            title: self.input.title,
            in_navigation: self.input.in_navigation,
            content: self.input.content,
            ..previous.clone()
        }
    }
}

/// Follow-up work done after a document write.
#[derive(Debug, Clone, Serialize)]
pub struct AfterWriteReport {
    pub change: ChangeRecord,
    pub impact: ImpactAssessment,
    /// Set when the index could not be updated.
    pub index_error: Option<String>,
    pub invalidation: InvalidationSummary,
    pub cascades: Vec<CascadeReport>,
}

/// A document write and everything it triggered.
#[derive(Debug, Clone, Serialize)]
pub struct WriteOutcome {
    pub document: DocumentRecord,
    pub generated: GeneratedUri,
    pub after: AfterWriteReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsWriteReport {
    pub settings: RoutingSettingsRecord,
    pub diff: SettingsDiff,
    pub invalidation: InvalidationSummary,
    pub cascades: Vec<CascadeReport>,
}

pub struct EditorialHooks {
    documents: Arc<dyn DocumentsRepo>,
    settings: Arc<dyn RoutingSettingsRepo>,
    generator: Arc<UriGenerator>,
    index: Arc<UriIndexService>,
    invalidation: Arc<InvalidationOrchestrator>,
    cascades: Arc<CascadeExecutor>,
    conflict_policy: ConflictPolicy,
}

impl EditorialHooks {
    pub fn new(
        documents: Arc<dyn DocumentsRepo>,
        settings: Arc<dyn RoutingSettingsRepo>,
        generator: Arc<UriGenerator>,
        index: Arc<UriIndexService>,
        invalidation: Arc<InvalidationOrchestrator>,
        cascades: Arc<CascadeExecutor>,
        conflict_policy: ConflictPolicy,
    ) -> Self {
        Self {
            documents,
            settings,
            generator,
            index,
            invalidation,
            cascades,
            conflict_policy,
        }
    }

    /// Validate a write and inject its slug and URI.
    pub async fn before_write(
        &self,
        collection: &str,
        input: DocumentInput,
        previous: Option<&DocumentRecord>,
    ) -> Result<PreparedWrite, AppError> {
        if !self.index.collections().contains(collection) {
            return Err(AppError::validation(format!(
                "collection `{collection}` is not served on the frontend"
            )));
        }
        if collection != PAGES_COLLECTION && input.parent_id.is_some() {
            return Err(AppError::validation("only pages can have a parent"));
        }
        if input.title.trim().is_empty() {
            return Err(AppError::validation("title must not be empty"));
        }

        let slug = match input.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => {
                validate_slug(slug).map_err(|err| AppError::validation(err.to_string()))?;
                slug.to_string()
            }
            _ => derive_slug(&input.title).map_err(|err| AppError::validation(err.to_string()))?,
        };

        let settings = self.settings.load_routing_settings().await?;
        let request = UriRequest {
            collection,
            slug: &slug,
            document_id: previous.map(|document| document.id),
            parent_id: input.parent_id,
            status: input.status,
        };
        let generated = self.generator.generate(request, &settings).await;

        if self.conflict_policy == ConflictPolicy::Reject
            && let Some(conflict) = &generated.conflict
            && !conflict.candidate_wins(collection, request.document_id)
        {
            let winner = conflict.winner();
            return Err(AppError::UriConflict {
                uri: conflict.uri.clone(),
                winner_collection: winner.collection.clone(),
                winner_id: winner.document_id.unwrap_or_else(Uuid::nil),
            });
        }

        Ok(PreparedWrite {
            collection: collection.to_string(),
            slug,
            input,
            generated,
        })
    }

    /// Update the index, invalidate caches and run any triggered cascade.
    pub async fn after_write(
        &self,
        document: &DocumentRecord,
        previous: Option<&DocumentRecord>,
    ) -> AfterWriteReport {
        let operation = if previous.is_some() {
            WriteOperation::Update
        } else {
            WriteOperation::Create
        };
        let change = detect(document, previous, operation);
        let impact = change.classify();
        let settings = self.current_settings().await;

        let index_error = self.sync_index(document, previous, &settings).await;
        let invalidation = self.invalidation.invalidate(document, &change, &settings);

        let mut cascades = Vec::new();
        for payload in cascade_payloads(document, &change, &settings) {
            if let Some(report) = self.run_cascade(&payload).await {
                cascades.push(report);
            }
        }

        info!(
            collection = %document.collection,
            document_id = %document.id,
            uri = ?document.uri,
            severity = ?impact.severity,
            cascades = cascades.len(),
            "document write processed"
        );
        AfterWriteReport {
            change,
            impact,
            index_error,
            invalidation,
            cascades,
        }
    }

    /// Drop the index entry of a removed document and invalidate its caches.
    /// Child pages are regenerated since their parent is gone.
    pub async fn after_delete(&self, document: &DocumentRecord) -> AfterWriteReport {
        let change = detect(document, None, WriteOperation::Delete);
        let impact = change.classify();
        let settings = self.current_settings().await;

        let index_error = match self.index.delete(&document.collection, document.id).await {
            Ok(_) => None,
            Err(err) => {
                warn!(
                    collection = %document.collection,
                    document_id = %document.id,
                    error = %err,
                    "uri index delete failed"
                );
                Some(err.to_string())
            }
        };
        let invalidation = self.invalidation.invalidate(document, &change, &settings);

        let mut cascades = Vec::new();
        if document.is_page() && self.has_children(document.id).await {
            let payload = CascadePayload::PageHierarchyUpdate {
                page_id: document.id,
                old_uri: document.uri.clone(),
                new_uri: None,
                revision: OffsetDateTime::now_utc(),
            };
            if let Some(report) = self.run_cascade(&payload).await {
                cascades.push(report);
            }
        }

        AfterWriteReport {
            change,
            impact,
            index_error,
            invalidation,
            cascades,
        }
    }

    /// Invalidate global surfaces and queue the cascades a settings change
    /// needs: the homepage swap and the collections whose archive or template
    /// assignment moved.
    pub async fn after_settings_write(
        &self,
        previous: &RoutingSettingsRecord,
        next: &RoutingSettingsRecord,
    ) -> SettingsWriteReport {
        let diff = SettingsDiff::between(previous, next);
        let collections = diff.affected_collections();
        let invalidation = self.invalidation.invalidate_settings(&collections);
        let revision = next.updated_at.unwrap_or_else(OffsetDateTime::now_utc);

        let mut payloads = Vec::new();
        if let Some((outgoing, incoming)) = diff.homepage {
            payloads.push(CascadePayload::HomepageChange {
                outgoing,
                incoming,
                revision,
            });
        }
        if !collections.is_empty() {
            payloads.push(CascadePayload::SettingsChange {
                collections,
                revision,
            });
        }

        let mut cascades = Vec::new();
        for payload in &payloads {
            if let Some(report) = self.run_cascade(payload).await {
                cascades.push(report);
            }
        }

        SettingsWriteReport {
            settings: next.clone(),
            diff,
            invalidation,
            cascades,
        }
    }

    pub async fn create_document(
        &self,
        collection: &str,
        input: DocumentInput,
    ) -> Result<WriteOutcome, AppError> {
        let prepared = self.before_write(collection, input, None).await?;
        let generated = prepared.generated.clone();
        let document = self
            .documents
            .create(prepared.into_create_params())
            .await?;
        let after = self.after_write(&document, None).await;
        Ok(WriteOutcome {
            document,
            generated,
            after,
        })
    }

    pub async fn update_document(
        &self,
        collection: &str,
        id: Uuid,
        input: DocumentInput,
    ) -> Result<WriteOutcome, AppError> {
        let previous = self
            .documents
            .find_by_id(collection, id)
            .await?
            .ok_or(AppError::NotFound)?;
        let prepared = self.before_write(collection, input, Some(&previous)).await?;
        let generated = prepared.generated.clone();
        let document = self.documents.update(prepared.apply_to(&previous)).await?;
        let after = self.after_write(&document, Some(&previous)).await;
        Ok(WriteOutcome {
            document,
            generated,
            after,
        })
    }

    pub async fn delete_document(
        &self,
        collection: &str,
        id: Uuid,
    ) -> Result<AfterWriteReport, AppError> {
        let document = self
            .documents
            .find_by_id(collection, id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.documents.delete(collection, id).await?;
        Ok(self.after_delete(&document).await)
    }

    pub async fn save_routing_settings(
        &self,
        next: RoutingSettingsRecord,
    ) -> Result<SettingsWriteReport, AppError> {
        for (collection, _) in next.archive_pages.iter().chain(next.templates.iter()) {
            if collection == PAGES_COLLECTION || !self.index.collections().contains(collection) {
                return Err(AppError::validation(format!(
                    "`{collection}` is not a frontend item collection"
                )));
            }
        }
        if let Some(homepage_id) = next.homepage_id
            && self
                .documents
                .find_by_id(PAGES_COLLECTION, homepage_id)
                .await?
                .is_none()
        {
            return Err(AppError::validation(format!(
                "homepage `{homepage_id}` is not an existing page"
            )));
        }

        let previous = self.settings.load_routing_settings().await?;
        let saved = self.settings.save_routing_settings(next).await?;
        Ok(self.after_settings_write(&previous, &saved).await)
    }

    async fn current_settings(&self) -> RoutingSettingsRecord {
        match self.settings.load_routing_settings().await {
            Ok(settings) => settings,
            Err(err) => {
                warn!(error = %err, "routing settings unavailable, using defaults");
                RoutingSettingsRecord::default()
            }
        }
    }

    async fn sync_index(
        &self,
        document: &DocumentRecord,
        previous: Option<&DocumentRecord>,
        settings: &RoutingSettingsRecord,
    ) -> Option<String> {
        let result = match &document.uri {
            Some(uri) => self
                .index
                .upsert(UriUpsert {
                    uri: uri.clone(),
                    collection: document.collection.clone(),
                    document_id: document.id,
                    status: document.status,
                    template_id: settings.template_for(&document.collection),
                    previous_uri: previous.and_then(|previous| previous.uri.clone()),
                })
                .await
                .map(|_| ()),
            None => self
                .index
                .delete(&document.collection, document.id)
                .await
                .map(|_| ()),
        };
        result.err().map(|err| {
            warn!(
                collection = %document.collection,
                document_id = %document.id,
                error = %err,
                "uri index update failed"
            );
            err.to_string()
        })
    }

    async fn has_children(&self, page_id: Uuid) -> bool {
        let filter =
            DocumentFilter::collection(PAGES_COLLECTION).with_parent(ParentFilter::Child(page_id));
        match self.documents.find_one(&filter).await {
            Ok(child) => child.is_some(),
            Err(err) => {
                warn!(%page_id, error = %err, "child lookup failed");
                false
            }
        }
    }

    async fn run_cascade(&self, payload: &CascadePayload) -> Option<CascadeReport> {
        match self.cascades.submit(payload).await {
            Ok(report) => Some(report),
            Err(err) => {
                error!(
                    operation = payload.operation().as_str(),
                    entity_id = %payload.triggering_entity_id(),
                    error = %err,
                    "cascade job could not run"
                );
                None
            }
        }
    }
}

fn cascade_payloads(
    document: &DocumentRecord,
    change: &ChangeRecord,
    settings: &RoutingSettingsRecord,
) -> Vec<CascadePayload> {
    let mut payloads = Vec::new();
    if archive_cascade_required(document, change, settings) {
        payloads.push(CascadePayload::ArchivePageUpdate {
            page_id: document.id,
            old_slug: change.old_slug.clone(),
            new_slug: document.slug.clone(),
            revision: document.updated_at,
        });
    }
    if hierarchy_cascade_required(document, change) || descendant_refresh_required(document, change)
    {
        payloads.push(CascadePayload::PageHierarchyUpdate {
            page_id: document.id,
            old_uri: change.old_uri.clone(),
            new_uri: change.new_uri.clone(),
            revision: document.updated_at,
        });
    }
    payloads
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::application::cascade::CascadeQueue;
    use crate::application::invalidation::tests::RecordingInvalidator;
    use crate::application::navigation::NavigationImpactAnalyzer;
    use crate::application::repos::UriIndexRepo;
    use crate::application::routing::index::tests::FlakyIndex;
    use crate::cache::CacheTag;
    use crate::domain::collections::FrontendCollections;
    use crate::domain::types::{CascadeOperation, Severity};
    use crate::infra::memory::InMemoryRepositories;

    struct Harness {
        repos: Arc<InMemoryRepositories>,
        index: Arc<UriIndexService>,
        hooks: EditorialHooks,
    }

    fn harness(policy: ConflictPolicy) -> Harness {
        let repos = Arc::new(InMemoryRepositories::new());
        harness_with(policy, repos.clone(), repos)
    }

    fn harness_with(
        policy: ConflictPolicy,
        repos: Arc<InMemoryRepositories>,
        entries: Arc<dyn UriIndexRepo>,
    ) -> Harness {
        let collections = FrontendCollections::new(["posts"]).unwrap();
        let index = Arc::new(UriIndexService::new(entries, collections.clone()));
        let generator = Arc::new(UriGenerator::new(repos.clone(), index.clone(), 32));
        let invalidation = Arc::new(InvalidationOrchestrator::new(
            Arc::new(RecordingInvalidator::default()),
            NavigationImpactAnalyzer::new(collections),
        ));
        let cascades = Arc::new(CascadeExecutor::new(
            repos.clone(),
            repos.clone(),
            generator.clone(),
            index.clone(),
            invalidation.clone(),
            CascadeQueue::new(repos.clone(), 3),
            32,
        ));
        let hooks = EditorialHooks::new(
            repos.clone(),
            repos.clone(),
            generator,
            index.clone(),
            invalidation,
            cascades,
            policy,
        );
        Harness {
            repos,
            index,
            hooks,
        }
    }

    fn input(title: &str, parent_id: Option<Uuid>) -> DocumentInput {
        DocumentInput {
            slug: None,
            title: title.into(),
            status: DocumentStatus::Published,
            parent_id,
            in_navigation: false,
            content: json!({}),
        }
    }

    #[tokio::test]
    async fn create_derives_slug_and_indexes_uri() {
        let h = harness(ConflictPolicy::Warn);
        let outcome = h
            .hooks
            .create_document("pages", input("About Us", None))
            .await
            .unwrap();
        assert_eq!(outcome.document.slug, "about-us");
        assert_eq!(outcome.document.uri.as_deref(), Some("/about-us"));
        assert!(outcome.after.index_error.is_none());

        let entry = h
            .index
            .lookup("/about-us", Some(DocumentStatus::Published))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.document_id, outcome.document.id);
    }

    #[tokio::test]
    async fn before_write_rejects_bad_input() {
        let h = harness(ConflictPolicy::Warn);
        let unknown = h
            .hooks
            .before_write("forms", input("Contact", None), None)
            .await;
        assert!(matches!(unknown, Err(AppError::Validation(_))));

        let parented = h
            .hooks
            .before_write("posts", input("Launch", Some(Uuid::new_v4())), None)
            .await;
        assert!(matches!(parented, Err(AppError::Validation(_))));

        let mut bad_slug = input("Launch", None);
        bad_slug.slug = Some("Not A Slug".into());
        let malformed = h.hooks.before_write("posts", bad_slug, None).await;
        assert!(matches!(malformed, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn conflict_is_reported_under_warn_policy() {
        let h = harness(ConflictPolicy::Warn);
        let mut settings = RoutingSettingsRecord::default();
        let archive = h
            .hooks
            .create_document("pages", input("About", None))
            .await
            .unwrap();
        settings.archive_pages.insert("posts".into(), archive.document.id);
        h.repos.save_routing_settings(settings).await.unwrap();
        h.hooks
            .create_document("pages", input("Team", Some(archive.document.id)))
            .await
            .unwrap();

        let post = h
            .hooks
            .create_document("posts", input("Team", None))
            .await
            .unwrap();
        assert_eq!(post.document.uri.as_deref(), Some("/about/team"));
        let conflict = post.generated.conflict.expect("conflict");
        assert_eq!(conflict.winner().collection, "pages");
    }

    #[tokio::test]
    async fn losing_write_is_refused_under_reject_policy() {
        let h = harness(ConflictPolicy::Reject);
        h.hooks
            .create_document("posts", input("Launch", None))
            .await
            .unwrap();
        let err = h
            .hooks
            .before_write(
                "posts",
                DocumentInput {
                    slug: Some("launch".into()),
                    ..input("Launch again", None)
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::UriConflict { ref winner_collection, .. } if winner_collection == "posts"
        ));
    }

    #[tokio::test]
    async fn update_records_history_and_invalidates_old_path() {
        let h = harness(ConflictPolicy::Warn);
        let created = h
            .hooks
            .create_document("pages", input("About", None))
            .await
            .unwrap();
        let updated = h
            .hooks
            .update_document(
                "pages",
                created.document.id,
                DocumentInput {
                    slug: Some("company".into()),
                    ..input("About", None)
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.document.uri.as_deref(), Some("/company"));
        assert_eq!(updated.after.impact.severity, Severity::High);
        assert!(updated.after.impact.requires_redirect);
        let paths = &updated.after.invalidation.paths_invalidated;
        assert!(paths.contains("/about") && paths.contains("/company"));

        let redirect = h
            .index
            .find_redirect("/about", false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(redirect.uri, "/company");
    }

    #[tokio::test]
    async fn uri_held_by_a_stale_entry_still_redirects_after_the_next_rename() {
        let repos = Arc::new(InMemoryRepositories::new());
        let entries = Arc::new(FlakyIndex::new(repos.clone()));
        let h = harness_with(ConflictPolicy::Warn, repos, entries.clone());
        let about = h
            .hooks
            .create_document("pages", input("About", None))
            .await
            .unwrap();
        let renamed = |slug: &str| DocumentInput {
            slug: Some(slug.into()),
            ..input("About", None)
        };

        entries.fail_next_updates(1);
        let lost = h
            .hooks
            .update_document("pages", about.document.id, renamed("company"))
            .await
            .unwrap();
        assert_eq!(lost.document.uri.as_deref(), Some("/company"));
        assert!(lost.after.index_error.is_some());

        let applied = h
            .hooks
            .update_document("pages", about.document.id, renamed("team"))
            .await
            .unwrap();
        assert!(applied.after.index_error.is_none());

        let entry = h
            .index
            .find_for_document("pages", about.document.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.uri, "/team");
        assert_eq!(
            entry.previous_uris,
            vec!["/company".to_string(), "/about".to_string()]
        );
        for old in ["/about", "/company"] {
            let redirect = h.index.find_redirect(old, false).await.unwrap().unwrap();
            assert_eq!(redirect.uri, "/team", "{old}");
        }
    }

    #[tokio::test]
    async fn moving_a_page_cascades_to_children() {
        let h = harness(ConflictPolicy::Warn);
        let company = h
            .hooks
            .create_document("pages", input("Company", None))
            .await
            .unwrap();
        let about = h
            .hooks
            .create_document("pages", input("About", None))
            .await
            .unwrap();
        let team = h
            .hooks
            .create_document("pages", input("Team", Some(about.document.id)))
            .await
            .unwrap();
        assert_eq!(team.document.uri.as_deref(), Some("/about/team"));

        let moved = h
            .hooks
            .update_document(
                "pages",
                about.document.id,
                input("About", Some(company.document.id)),
            )
            .await
            .unwrap();
        assert_eq!(moved.document.uri.as_deref(), Some("/company/about"));
        assert_eq!(moved.after.cascades.len(), 1);
        assert_eq!(
            moved.after.cascades[0].operation,
            CascadeOperation::PageHierarchyUpdate
        );
        assert!(
            moved
                .after
                .invalidation
                .tags_invalidated
                .contains(&CacheTag::item("pages", company.document.id))
        );

        let team_now = h
            .repos
            .find_by_id("pages", team.document.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(team_now.uri.as_deref(), Some("/company/about/team"));
    }

    #[tokio::test]
    async fn renaming_an_archive_page_moves_its_items() {
        let h = harness(ConflictPolicy::Warn);
        let news = h
            .hooks
            .create_document("pages", input("News", None))
            .await
            .unwrap();
        let mut settings = RoutingSettingsRecord::default();
        settings.archive_pages.insert("posts".into(), news.document.id);
        h.hooks.save_routing_settings(settings).await.unwrap();

        let post = h
            .hooks
            .create_document("posts", input("Launch", None))
            .await
            .unwrap();
        assert_eq!(post.document.uri.as_deref(), Some("/news/launch"));

        let renamed = h
            .hooks
            .update_document(
                "pages",
                news.document.id,
                DocumentInput {
                    slug: Some("blog".into()),
                    ..input("News", None)
                },
            )
            .await
            .unwrap();
        let archive_job = renamed
            .after
            .cascades
            .iter()
            .find(|report| report.operation == CascadeOperation::ArchivePageUpdate)
            .expect("archive cascade");
        assert_eq!(archive_job.regenerated.len(), 1);
        assert_eq!(archive_job.regenerated[0].new_uri, "/blog/launch");

        let moved = h
            .index
            .lookup("/blog/launch", Some(DocumentStatus::Published))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.document_id, post.document.id);
    }

    #[tokio::test]
    async fn settings_write_swaps_homepage() {
        let h = harness(ConflictPolicy::Warn);
        let start = h
            .hooks
            .create_document("pages", input("Start", None))
            .await
            .unwrap();
        let welcome = h
            .hooks
            .create_document("pages", input("Welcome", None))
            .await
            .unwrap();
        h.hooks
            .save_routing_settings(RoutingSettingsRecord {
                homepage_id: Some(start.document.id),
                ..Default::default()
            })
            .await
            .unwrap();
        let start_now = h
            .repos
            .find_by_id("pages", start.document.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(start_now.uri.as_deref(), Some(""));

        let report = h
            .hooks
            .save_routing_settings(RoutingSettingsRecord {
                homepage_id: Some(welcome.document.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(report.diff.homepage_changed());
        assert_eq!(report.cascades[0].operation, CascadeOperation::HomepageChange);

        let start_now = h
            .repos
            .find_by_id("pages", start.document.id)
            .await
            .unwrap()
            .unwrap();
        let welcome_now = h
            .repos
            .find_by_id("pages", welcome.document.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(start_now.uri.as_deref(), Some("/start"));
        assert_eq!(welcome_now.uri.as_deref(), Some(""));
        let paths = &report.cascades[0].invalidation.paths_invalidated;
        assert!(paths.contains("/") && paths.contains("/welcome"));
    }

    #[tokio::test]
    async fn settings_reject_unknown_collections_and_pages() {
        let h = harness(ConflictPolicy::Warn);
        let mut settings = RoutingSettingsRecord::default();
        settings.archive_pages.insert("forms".into(), Uuid::new_v4());
        assert!(matches!(
            h.hooks.save_routing_settings(settings).await,
            Err(AppError::Validation(_))
        ));

        let missing_home = RoutingSettingsRecord {
            homepage_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(matches!(
            h.hooks.save_routing_settings(missing_home).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_index_entry() {
        let h = harness(ConflictPolicy::Warn);
        let created = h
            .hooks
            .create_document("posts", input("Launch", None))
            .await
            .unwrap();
        let report = h
            .hooks
            .delete_document("posts", created.document.id)
            .await
            .unwrap();
        assert!(report.index_error.is_none());
        let paths = &report.invalidation.paths_invalidated;
        assert!(paths.contains("/posts/launch"));
        assert!(
            h.index
                .lookup("/posts/launch", None)
                .await
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            h.hooks.delete_document("posts", created.document.id).await,
            Err(AppError::NotFound)
        ));
    }
}
