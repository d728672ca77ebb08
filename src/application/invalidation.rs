//! Invalidation orchestrator.
//!
//! Turns one document change into the exact set of cache tags and paths to
//! drop, and applies them. Batches merge the per-change plans and hit the cache
//! once. Invalidating a tag that is already gone is a no-op, so replaying a
//! change is harmless.

use std::collections::BTreeSet;
use std::sync::Arc;

use metrics::histogram;
use serde::Serialize;
use tracing::info;

use crate::application::changes::ChangeRecord;
use crate::application::navigation::{NavigationImpact, NavigationImpactAnalyzer};
use crate::cache::{CacheInvalidator, CacheTag, GlobalSurface, InvalidationPlan};
use crate::domain::entities::{DocumentRecord, RoutingSettingsRecord};
use crate::domain::types::PAGES_COLLECTION;
use crate::domain::uri::display_path;

pub(crate) const METRIC_INVALIDATION_BATCH_SIZE: &str = "folio_invalidation_batch_size";

/// One document revision paired with its change record.
#[derive(Debug, Clone)]
pub struct DocumentChange {
    /// The current revision, or the removed one for deletes.
    pub document: DocumentRecord,
    pub change: ChangeRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationSummary {
    pub tags_invalidated: BTreeSet<CacheTag>,
    /// Request paths in display form, `/` for the homepage.
    pub paths_invalidated: BTreeSet<String>,
    pub changes: usize,
    pub entries_removed: usize,
    /// Tag and path requests dropped as duplicates across the batch.
    pub deduplicated: usize,
}

pub struct InvalidationOrchestrator {
    cache: Arc<dyn CacheInvalidator>,
    navigation: NavigationImpactAnalyzer,
}

impl InvalidationOrchestrator {
    pub fn new(cache: Arc<dyn CacheInvalidator>, navigation: NavigationImpactAnalyzer) -> Self {
        Self { cache, navigation }
    }

    /// Invalidate everything one change touches.
    pub fn invalidate(
        &self,
        document: &DocumentRecord,
        change: &ChangeRecord,
        settings: &RoutingSettingsRecord,
    ) -> InvalidationSummary {
        let plan = self.plan(document, change, settings);
        self.apply(plan, 1)
    }

    /// Invalidate a batch of changes with one deduplicated cache call.
    pub fn invalidate_batch(
        &self,
        changes: &[DocumentChange],
        settings: &RoutingSettingsRecord,
    ) -> InvalidationSummary {
        let plan = InvalidationPlan::from_plans(
            changes
                .iter()
                .map(|entry| self.plan(&entry.document, &entry.change, settings)),
        );
        histogram!(METRIC_INVALIDATION_BATCH_SIZE).record(changes.len() as f64);
        self.apply(plan, changes.len())
    }

    /// Invalidate the site-wide surfaces after a settings write, plus the
    /// listings of `collections` whose assignments moved.
    pub fn invalidate_settings(&self, collections: &[String]) -> InvalidationSummary {
        let mut plan = InvalidationPlan::default();
        for surface in [
            GlobalSurface::Settings,
            GlobalSurface::Header,
            GlobalSurface::Footer,
        ] {
            plan.add_tag(CacheTag::global(surface));
        }
        for collection in collections {
            plan.add_tag(CacheTag::collection(collection));
            plan.add_tag(CacheTag::collection_index(collection));
        }
        self.apply(plan, 0)
    }

    /// Drop every cache entry. Never part of an automatic flow.
    pub fn emergency_clear(&self) -> usize {
        self.cache.clear_all()
    }

    /// The tags and paths for one change, in a fixed order.
    pub fn plan(
        &self,
        document: &DocumentRecord,
        change: &ChangeRecord,
        settings: &RoutingSettingsRecord,
    ) -> InvalidationPlan {
        let mut plan = InvalidationPlan::default();
        let collection = document.collection.as_str();

        // 1. item identity
        plan.add_tag(CacheTag::item(collection, document.id));

        // 2. current URI
        let current = change.new_uri.as_deref();
        if let Some(uri) = current {
            plan.add_tag(CacheTag::uri(uri));
            plan.add_path(display_path(uri));
        }

        // 3. the URI it was served at before
        if change.uri_changed
            && let Some(old) = change.old_uri.as_deref()
            && Some(old) != current
        {
            plan.add_tag(CacheTag::uri(old));
            plan.add_path(display_path(old));
        }
        if change.uri_changed || change.status_changed {
            plan.add_tag(CacheTag::uri_listing());
        }

        // 4. shared layout
        let navigation = self.navigation.analyze(document, change, settings);
        add_navigation(&mut plan, &navigation);

        // 5. collections served under this archive page
        if collection == PAGES_COLLECTION {
            for dependent in settings.collections_archived_by(document.id) {
                plan.add_tag(CacheTag::collection(&dependent));
                plan.add_tag(CacheTag::collection_index(&dependent));
            }
        }

        // 6. listings reflect visibility
        if change.status_changed {
            plan.add_tag(CacheTag::collection(collection));
        }

        // 7. parent listings of children
        if collection == PAGES_COLLECTION && change.parent_changed {
            for parent in [change.old_parent, change.new_parent].into_iter().flatten() {
                plan.add_tag(CacheTag::item(PAGES_COLLECTION, parent));
            }
        }

        plan
    }

    fn apply(&self, plan: InvalidationPlan, changes: usize) -> InvalidationSummary {
        let deduplicated = plan.deduplicated();
        let mut entries_removed = 0;
        if !plan.tags.is_empty() {
            entries_removed += self.cache.invalidate_tags(&plan.tags);
        }
        if !plan.paths.is_empty() {
            entries_removed += self.cache.invalidate_paths(&plan.paths);
        }

        info!(
            changes,
            tags = plan.tags.len(),
            paths = plan.paths.len(),
            deduplicated,
            entries_removed,
            "cache tags invalidated"
        );

        InvalidationSummary {
            tags_invalidated: plan.tags,
            paths_invalidated: plan.paths,
            changes,
            entries_removed,
            deduplicated,
        }
    }
}

fn add_navigation(plan: &mut InvalidationPlan, impact: &NavigationImpact) {
    if impact.affects_header {
        plan.add_tag(CacheTag::global(GlobalSurface::Header));
    }
    if impact.affects_footer {
        plan.add_tag(CacheTag::global(GlobalSurface::Footer));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::application::changes::detect;
    use crate::domain::collections::FrontendCollections;
    use crate::domain::types::{DocumentStatus, WriteOperation};

    /// Records every call instead of touching a cache.
    #[derive(Default)]
    pub(crate) struct RecordingInvalidator {
        pub tag_calls: Mutex<Vec<BTreeSet<CacheTag>>>,
        pub path_calls: Mutex<Vec<BTreeSet<String>>>,
    }

    impl CacheInvalidator for RecordingInvalidator {
        fn invalidate_tags(&self, tags: &BTreeSet<CacheTag>) -> usize {
            self.tag_calls.lock().unwrap().push(tags.clone());
            0
        }

        fn invalidate_paths(&self, paths: &BTreeSet<String>) -> usize {
            self.path_calls.lock().unwrap().push(paths.clone());
            0
        }

        fn clear_all(&self) -> usize {
            0
        }
    }

    fn orchestrator() -> (Arc<RecordingInvalidator>, InvalidationOrchestrator) {
        let recorder = Arc::new(RecordingInvalidator::default());
        let orchestrator = InvalidationOrchestrator::new(
            recorder.clone(),
            NavigationImpactAnalyzer::new(FrontendCollections::new(["posts"]).unwrap()),
        );
        (recorder, orchestrator)
    }

    fn doc(collection: &str, slug: &str, uri: &str) -> DocumentRecord {
        DocumentRecord {
            id: Uuid::new_v4(),
            collection: collection.into(),
            slug: slug.into(),
            uri: Some(uri.into()),
            status: DocumentStatus::Published,
            parent_id: None,
            title: slug.into(),
            in_navigation: false,
            content: json!({}),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn uri_change_invalidates_old_and_new_paths() {
        let (_, orchestrator) = orchestrator();
        let previous = doc("pages", "about", "/about");
        let mut next = previous.clone();
        next.slug = "company".into();
        next.uri = Some("/company".into());
        let change = detect(&next, Some(&previous), WriteOperation::Update);

        let summary = orchestrator.invalidate(&next, &change, &RoutingSettingsRecord::default());
        assert!(summary.tags_invalidated.contains(&CacheTag::item("pages", next.id)));
        assert!(summary.tags_invalidated.contains(&CacheTag::uri("/company")));
        assert!(summary.tags_invalidated.contains(&CacheTag::uri("/about")));
        assert!(summary.paths_invalidated.contains("/company"));
        assert!(summary.paths_invalidated.contains("/about"));
    }

    #[test]
    fn content_change_touches_only_identity_and_location() {
        let (_, orchestrator) = orchestrator();
        let previous = doc("posts", "launch", "/news/launch");
        let mut next = previous.clone();
        next.content = json!({ "body": "v2" });
        let change = detect(&next, Some(&previous), WriteOperation::Update);

        let summary = orchestrator.invalidate(&next, &change, &RoutingSettingsRecord::default());
        let expected: BTreeSet<CacheTag> = [
            CacheTag::item("posts", next.id),
            CacheTag::uri("/news/launch"),
        ]
        .into_iter()
        .collect();
        assert_eq!(summary.tags_invalidated, expected);
        assert_eq!(summary.paths_invalidated.len(), 1);
    }

    #[test]
    fn status_change_invalidates_collection_listing_and_layout() {
        let (_, orchestrator) = orchestrator();
        let previous = doc("posts", "launch", "/news/launch");
        let mut next = previous.clone();
        next.status = DocumentStatus::Draft;
        let change = detect(&next, Some(&previous), WriteOperation::Update);

        let summary = orchestrator.invalidate(&next, &change, &RoutingSettingsRecord::default());
        assert!(summary.tags_invalidated.contains(&CacheTag::collection("posts")));
        assert!(summary.tags_invalidated.contains(&CacheTag::uri_listing()));
        assert!(
            summary
                .tags_invalidated
                .contains(&CacheTag::global(GlobalSurface::Header))
        );
        assert!(
            summary
                .tags_invalidated
                .contains(&CacheTag::global(GlobalSurface::Footer))
        );
    }

    #[test]
    fn archive_page_invalidates_dependent_collections() {
        let (_, orchestrator) = orchestrator();
        let previous = doc("pages", "news", "/news");
        let mut next = previous.clone();
        next.slug = "blog".into();
        next.uri = Some("/blog".into());
        let change = detect(&next, Some(&previous), WriteOperation::Update);
        let mut settings = RoutingSettingsRecord::default();
        settings.archive_pages.insert("posts".into(), next.id);

        let summary = orchestrator.invalidate(&next, &change, &settings);
        assert!(summary.tags_invalidated.contains(&CacheTag::collection("posts")));
        assert!(
            summary
                .tags_invalidated
                .contains(&CacheTag::collection_index("posts"))
        );
    }

    #[test]
    fn parent_change_from_none_tags_only_new_parent() {
        let (_, orchestrator) = orchestrator();
        let previous = doc("pages", "team", "/team");
        let parent = Uuid::new_v4();
        let mut next = previous.clone();
        next.parent_id = Some(parent);
        next.uri = Some("/about/team".into());
        let change = detect(&next, Some(&previous), WriteOperation::Update);
        assert!(change.parent_changed);
        assert!(change.classify().requires_cascade);

        let summary = orchestrator.invalidate(&next, &change, &RoutingSettingsRecord::default());
        let parent_tags: Vec<_> = summary
            .tags_invalidated
            .iter()
            .filter(|tag| {
                tag.as_str().starts_with("item:pages:") && **tag != CacheTag::item("pages", next.id)
            })
            .collect();
        assert_eq!(parent_tags, vec![&CacheTag::item("pages", parent)]);
    }

    #[test]
    fn delete_invalidates_the_removed_uri() {
        let (_, orchestrator) = orchestrator();
        let removed = doc("posts", "launch", "/news/launch");
        let change = detect(&removed, None, WriteOperation::Delete);

        let summary = orchestrator.invalidate(&removed, &change, &RoutingSettingsRecord::default());
        assert!(summary.paths_invalidated.contains("/news/launch"));
        assert!(summary.tags_invalidated.contains(&CacheTag::collection("posts")));
    }

    #[test]
    fn invalidation_is_idempotent() {
        let (recorder, orchestrator) = orchestrator();
        let previous = doc("pages", "about", "/about");
        let mut next = previous.clone();
        next.title = "About us".into();
        let change = detect(&next, Some(&previous), WriteOperation::Update);
        let settings = RoutingSettingsRecord::default();

        let once = orchestrator.invalidate(&next, &change, &settings);
        let twice = orchestrator.invalidate(&next, &change, &settings);
        assert!(twice.tags_invalidated.is_subset(&once.tags_invalidated));
        assert_eq!(once.paths_invalidated, twice.paths_invalidated);

        let calls = recorder.tag_calls.lock().unwrap();
        assert_eq!(calls[0], calls[1]);
    }

    #[test]
    fn batch_deduplicates_and_calls_cache_once() {
        let (recorder, orchestrator) = orchestrator();
        let mut settings = RoutingSettingsRecord::default();
        let archive = Uuid::new_v4();
        settings.archive_pages.insert("posts".into(), archive);

        let changes: Vec<DocumentChange> = (0..5)
            .map(|n| {
                let previous = doc("posts", &format!("p{n}"), &format!("/news/p{n}"));
                let mut next = previous.clone();
                next.uri = Some(format!("/blog/p{n}"));
                let change = detect(&next, Some(&previous), WriteOperation::Update);
                DocumentChange {
                    document: next,
                    change,
                }
            })
            .collect();

        let summary = orchestrator.invalidate_batch(&changes, &settings);
        assert_eq!(summary.changes, 5);
        assert_eq!(summary.paths_invalidated.len(), 10);
        // the listing tag is requested once per change
        assert_eq!(summary.deduplicated, 4);
        assert_eq!(recorder.tag_calls.lock().unwrap().len(), 1);
        assert_eq!(recorder.path_calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn globals_cover_settings_header_and_footer() {
        let (_, orchestrator) = orchestrator();
        let summary = orchestrator.invalidate_settings(&[]);
        assert_eq!(summary.tags_invalidated.len(), 3);
        assert!(summary.paths_invalidated.is_empty());

        let summary = orchestrator.invalidate_settings(&["posts".to_string()]);
        assert_eq!(summary.tags_invalidated.len(), 5);
        assert!(
            summary
                .tags_invalidated
                .contains(&CacheTag::collection_index("posts"))
        );
        assert!(summary.paths_invalidated.is_empty());
    }
}
