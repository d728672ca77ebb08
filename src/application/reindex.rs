//! Full index rebuild.
//!
//! Regenerates the URI of every document in every frontend collection,
//! rewrites the index and drops entries whose document is gone. History of
//! surviving entries is kept so old links still redirect.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::invalidation::{
    DocumentChange, InvalidationOrchestrator, InvalidationSummary,
};
use crate::application::repos::{
    DocumentFilter, DocumentsRepo, RoutingSettingsRepo, UriIndexRepo, find_all,
};
use crate::application::routing::{UriGenerator, UriIndexService, refresh};
use crate::domain::entities::{DocumentRecord, RoutingSettingsRecord};
use crate::domain::types::{DocumentStatus, PAGES_COLLECTION};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReindexFailure {
    pub collection: String,
    pub document_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReindexReport {
    pub documents: usize,
    /// Documents whose stored URI changed.
    pub updated: usize,
    pub degraded: usize,
    pub conflicts: usize,
    /// Index entries removed because their document no longer exists.
    pub stale_removed: u64,
    pub errors: Vec<ReindexFailure>,
    pub invalidation: InvalidationSummary,
}

pub struct Reindexer {
    documents: Arc<dyn DocumentsRepo>,
    settings: Arc<dyn RoutingSettingsRepo>,
    entries: Arc<dyn UriIndexRepo>,
    index: Arc<UriIndexService>,
    generator: Arc<UriGenerator>,
    invalidation: Arc<InvalidationOrchestrator>,
}

impl Reindexer {
    pub fn new(
        documents: Arc<dyn DocumentsRepo>,
        settings: Arc<dyn RoutingSettingsRepo>,
        entries: Arc<dyn UriIndexRepo>,
        index: Arc<UriIndexService>,
        generator: Arc<UriGenerator>,
        invalidation: Arc<InvalidationOrchestrator>,
    ) -> Self {
        Self {
            documents,
            settings,
            entries,
            index,
            generator,
            invalidation,
        }
    }

    pub async fn rebuild(&self) -> Result<ReindexReport, AppError> {
        let settings = self.settings.load_routing_settings().await?;
        let mut report = ReindexReport::default();
        let mut changes = Vec::new();
        let mut seen: HashSet<(String, Uuid)> = HashSet::new();

        let collections: Vec<String> = self
            .index
            .collections()
            .iter()
            .map(str::to_string)
            .collect();
        for collection in collections {
            let filter = DocumentFilter::collection(&collection);
            let mut documents = find_all(self.documents.as_ref(), &filter).await?;
            if collection == PAGES_COLLECTION {
                documents = parents_first(documents);
            }

            for document in documents {
                seen.insert((document.collection.clone(), document.id));
                report.documents += 1;
                let document_id = document.id;
                match self.regenerate(document, &settings, &mut report).await {
                    Ok(change) => changes.push(change),
                    Err(err) => {
                        warn!(
                            collection = %collection,
                            %document_id,
                            error = %err,
                            "reindex failed for document"
                        );
                        report.errors.push(ReindexFailure {
                            collection: collection.clone(),
                            document_id,
                            message: err.to_string(),
                        });
                    }
                }
            }
        }

        let entries = self
            .entries
            .list_entries(&[DocumentStatus::Draft, DocumentStatus::Published])
            .await?;
        for entry in entries {
            if !seen.contains(&(entry.source_collection.clone(), entry.document_id)) {
                report.stale_removed += self
                    .index
                    .delete(&entry.source_collection, entry.document_id)
                    .await?;
            }
        }

        report.invalidation = self.invalidation.invalidate_batch(&changes, &settings);
        info!(
            documents = report.documents,
            updated = report.updated,
            degraded = report.degraded,
            conflicts = report.conflicts,
            stale_removed = report.stale_removed,
            failures = report.errors.len(),
            "uri index rebuilt"
        );
        Ok(report)
    }

    async fn regenerate(
        &self,
        document: DocumentRecord,
        settings: &RoutingSettingsRecord,
        report: &mut ReindexReport,
    ) -> Result<DocumentChange, AppError> {
        let refreshed = refresh(
            self.documents.as_ref(),
            &self.generator,
            &self.index,
            document,
            settings,
        )
        .await?;
        report.updated += usize::from(refreshed.document_updated);
        report.degraded += usize::from(refreshed.generated.degraded);
        report.conflicts += usize::from(refreshed.generated.conflict.is_some());
        Ok(refreshed.change)
    }
}

/// Order pages so every parent precedes its children. Pages whose parent is
/// missing count as roots; pages caught in a cycle come last.
fn parents_first(pages: Vec<DocumentRecord>) -> Vec<DocumentRecord> {
    let ids: HashSet<Uuid> = pages.iter().map(|page| page.id).collect();
    let mut children: HashMap<Uuid, Vec<usize>> = HashMap::new();
    let mut queue = VecDeque::new();
    for (position, page) in pages.iter().enumerate() {
        match page.parent_id {
            Some(parent) if ids.contains(&parent) && parent != page.id => {
                children.entry(parent).or_default().push(position)
            }
            _ => queue.push_back(position),
        }
    }

    let mut order = Vec::with_capacity(pages.len());
    let mut placed = vec![false; pages.len()];
    while let Some(position) = queue.pop_front() {
        if std::mem::replace(&mut placed[position], true) {
            continue;
        }
        order.push(position);
        if let Some(kids) = children.get(&pages[position].id) {
            queue.extend(kids.iter().copied());
        }
    }
    order.extend((0..pages.len()).filter(|position| !placed[*position]));

    let mut slots: Vec<Option<DocumentRecord>> = pages.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|position| slots[position].take())
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::OffsetDateTime;

    use super::*;
    use crate::application::invalidation::tests::RecordingInvalidator;
    use crate::application::navigation::NavigationImpactAnalyzer;
    use crate::application::repos::{CreateDocumentParams, NewUriIndexEntry};
    use crate::domain::collections::FrontendCollections;
    use crate::infra::memory::InMemoryRepositories;

    fn page(slug: &str, parent_id: Option<Uuid>) -> DocumentRecord {
        DocumentRecord {
            id: Uuid::new_v4(),
            collection: PAGES_COLLECTION.into(),
            slug: slug.into(),
            uri: None,
            status: DocumentStatus::Published,
            parent_id,
            title: slug.into(),
            in_navigation: false,
            content: json!({}),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn parents_precede_children() {
        let root = page("root", None);
        let child = page("child", Some(root.id));
        let grandchild = page("grandchild", Some(child.id));
        let orphan = page("orphan", Some(Uuid::new_v4()));

        let ordered = parents_first(vec![grandchild, child, orphan, root]);
        let slugs: Vec<&str> = ordered.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["orphan", "root", "child", "grandchild"]);
    }

    #[test]
    fn cycles_are_kept_at_the_end() {
        let mut a = page("a", None);
        let b = page("b", Some(a.id));
        a.parent_id = Some(b.id);
        let root = page("root", None);

        let ordered = parents_first(vec![a, b, root]);
        assert_eq!(ordered.len(), 3);
        assert_eq!(ordered[0].slug, "root");
    }

    #[tokio::test]
    async fn rebuild_fixes_stale_uris_and_drops_orphan_entries() {
        let repos = Arc::new(InMemoryRepositories::new());
        let collections = FrontendCollections::new(["posts"]).unwrap();
        let index = Arc::new(UriIndexService::new(repos.clone(), collections.clone()));
        let generator = Arc::new(UriGenerator::new(repos.clone(), index.clone(), 32));
        let recorder = Arc::new(RecordingInvalidator::default());
        let invalidation = Arc::new(InvalidationOrchestrator::new(
            recorder.clone(),
            NavigationImpactAnalyzer::new(collections),
        ));
        let reindexer = Reindexer::new(
            repos.clone(),
            repos.clone(),
            repos.clone(),
            index.clone(),
            generator,
            invalidation,
        );

        let params = |collection: &str, slug: &str, uri: Option<&str>, parent_id| {
            CreateDocumentParams {
                collection: collection.into(),
                slug: slug.into(),
                uri: uri.map(str::to_string),
                status: DocumentStatus::Published,
                parent_id,
                title: slug.into(),
                in_navigation: false,
                content: json!({}),
            }
        };
        let about = repos.create(params("pages", "about", None, None)).await.unwrap();
        repos
            .create(params("pages", "team", Some("/team"), Some(about.id)))
            .await
            .unwrap();
        repos
            .create(params("posts", "launch", Some("/posts/launch"), None))
            .await
            .unwrap();
        repos
            .insert_entry(NewUriIndexEntry {
                uri: "/gone".into(),
                source_collection: "posts".into(),
                document_id: Uuid::new_v4(),
                status: DocumentStatus::Published,
                template_id: None,
                previous_uris: Vec::new(),
            })
            .await
            .unwrap();

        let report = reindexer.rebuild().await.unwrap();
        assert_eq!(report.documents, 3);
        assert_eq!(report.updated, 2);
        assert_eq!(report.stale_removed, 1);
        assert!(report.errors.is_empty());
        assert_eq!(recorder.tag_calls.lock().unwrap().len(), 1);

        assert_eq!(
            index.list_all(DocumentStatus::Published).await.unwrap(),
            vec!["/about", "/about/team", "/posts/launch"]
        );
        let team = index
            .lookup("/about/team", Some(DocumentStatus::Published))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(team.previous_uris, vec!["/team".to_string()]);
    }
}
