//! Wiring of the routing engine over one set of repositories.

use std::sync::Arc;

use crate::application::cascade::{CascadeExecutor, CascadeQueue, DEFAULT_MAX_ATTEMPTS};
use crate::application::hooks::{ConflictPolicy, EditorialHooks};
use crate::application::invalidation::InvalidationOrchestrator;
use crate::application::navigation::NavigationImpactAnalyzer;
use crate::application::reindex::Reindexer;
use crate::application::repos::{
    CascadeJobsRepo, DocumentsRepo, RoutingSettingsRepo, UriIndexRepo,
};
use crate::application::resolver::{CachedRead, Resolver};
use crate::application::routing::generator::DEFAULT_MAX_PARENT_DEPTH;
use crate::application::routing::{UriGenerator, UriIndexService};
use crate::cache::{CacheConfig, CacheLayer};
use crate::domain::collections::FrontendCollections;

/// Construction-time settings of the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Frontend collections in conflict-priority order.
    pub collections: FrontendCollections,
    pub max_parent_depth: usize,
    pub cascade_max_attempts: i32,
    pub conflict_policy: ConflictPolicy,
    pub cache: CacheConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            collections: FrontendCollections::default(),
            max_parent_depth: DEFAULT_MAX_PARENT_DEPTH,
            cascade_max_attempts: DEFAULT_MAX_ATTEMPTS,
            conflict_policy: ConflictPolicy::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Every service of the engine, sharing one cache and one set of repositories.
#[derive(Clone)]
pub struct RoutingEngine {
    pub hooks: Arc<EditorialHooks>,
    pub resolver: Arc<Resolver>,
    pub reindexer: Arc<Reindexer>,
    pub cascades: Arc<CascadeExecutor>,
    pub invalidation: Arc<InvalidationOrchestrator>,
    pub index: Arc<UriIndexService>,
    pub generator: Arc<UriGenerator>,
    pub cache: Arc<CacheLayer<CachedRead>>,
}

impl RoutingEngine {
    pub fn new<R>(repos: Arc<R>, settings: EngineSettings) -> Self
    where
        R: DocumentsRepo + RoutingSettingsRepo + UriIndexRepo + CascadeJobsRepo + 'static,
    {
        let documents: Arc<dyn DocumentsRepo> = repos.clone();
        let routing: Arc<dyn RoutingSettingsRepo> = repos.clone();
        let entries: Arc<dyn UriIndexRepo> = repos.clone();
        let jobs: Arc<dyn CascadeJobsRepo> = repos;

        let cache = Arc::new(CacheLayer::new(settings.cache));
        let index = Arc::new(UriIndexService::new(
            entries.clone(),
            settings.collections.clone(),
        ));
        let generator = Arc::new(UriGenerator::new(
            documents.clone(),
            index.clone(),
            settings.max_parent_depth,
        ));
        let invalidation = Arc::new(InvalidationOrchestrator::new(
            cache.clone(),
            NavigationImpactAnalyzer::new(settings.collections),
        ));
        let cascades = Arc::new(CascadeExecutor::new(
            documents.clone(),
            routing.clone(),
            generator.clone(),
            index.clone(),
            invalidation.clone(),
            CascadeQueue::new(jobs, settings.cascade_max_attempts),
            settings.max_parent_depth,
        ));
        let hooks = Arc::new(EditorialHooks::new(
            documents.clone(),
            routing.clone(),
            generator.clone(),
            index.clone(),
            invalidation.clone(),
            cascades.clone(),
            settings.conflict_policy,
        ));
        let resolver = Arc::new(Resolver::new(documents.clone(), index.clone(), cache.clone()));
        let reindexer = Arc::new(Reindexer::new(
            documents,
            routing,
            entries,
            index.clone(),
            generator.clone(),
            invalidation.clone(),
        ));

        Self {
            hooks,
            resolver,
            reindexer,
            cascades,
            invalidation,
            index,
            generator,
            cache,
        }
    }
}
