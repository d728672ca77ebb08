//! Decides whether a change reaches the shared header and footer.

use serde::Serialize;

use crate::application::changes::ChangeRecord;
use crate::domain::collections::FrontendCollections;
use crate::domain::entities::{DocumentRecord, RoutingSettingsRecord};
use crate::domain::types::PAGES_COLLECTION;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavigationReason {
    /// Visibility changed.
    StatusChanged,
    /// A menu page moved, was renamed or was edited.
    NavigationPage,
    /// The document owns the URI prefix of these collections.
    ArchivePage { collections: Vec<String> },
    Homepage,
    /// Latest-content widgets list this collection.
    LatestContent { collection: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavigationImpact {
    pub affects_header: bool,
    pub affects_footer: bool,
    pub reasons: Vec<NavigationReason>,
}

impl NavigationImpact {
    fn both(reason: NavigationReason) -> Self {
        Self {
            affects_header: true,
            affects_footer: true,
            reasons: vec![reason],
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.affects_header && !self.affects_footer
    }
}

pub struct NavigationImpactAnalyzer {
    collections: FrontendCollections,
}

impl NavigationImpactAnalyzer {
    pub fn new(collections: FrontendCollections) -> Self {
        Self { collections }
    }

    /// Apply the rules in order; the first match decides.
    pub fn analyze(
        &self,
        document: &DocumentRecord,
        change: &ChangeRecord,
        settings: &RoutingSettingsRecord,
    ) -> NavigationImpact {
        let is_page = document.collection == PAGES_COLLECTION;
        let is_item = !is_page && self.collections.contains(&document.collection);

        if change.status_changed && !is_item {
            return NavigationImpact::both(NavigationReason::StatusChanged);
        }
        if is_page
            && document.in_navigation
            && (change.uri_changed || change.title_changed || change.content_changed)
        {
            return NavigationImpact::both(NavigationReason::NavigationPage);
        }
        if only_content_changed(change) {
            return NavigationImpact::default();
        }
        if is_page {
            let collections = settings.collections_archived_by(document.id);
            if !collections.is_empty() {
                return NavigationImpact::both(NavigationReason::ArchivePage { collections });
            }
            if settings.homepage_id == Some(document.id) {
                return NavigationImpact::both(NavigationReason::Homepage);
            }
        }
        if change.status_changed && is_item {
            return NavigationImpact::both(NavigationReason::LatestContent {
                collection: document.collection.clone(),
            });
        }
        NavigationImpact::default()
    }
}

fn only_content_changed(change: &ChangeRecord) -> bool {
    !(change.uri_changed
        || change.slug_changed
        || change.status_changed
        || change.parent_changed
        || change.title_changed)
}
