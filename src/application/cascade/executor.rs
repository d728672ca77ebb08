use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::dependencies::DependencyAnalyzer;
use crate::application::error::AppError;
use crate::application::invalidation::{
    DocumentChange, InvalidationOrchestrator, InvalidationSummary,
};
use crate::application::repos::{DocumentsRepo, RoutingSettingsRepo};
use crate::application::routing::{UriGenerator, UriIndexService, refresh};
use crate::domain::entities::{CascadeJobRecord, DocumentRecord, RoutingSettingsRecord};
use crate::domain::types::{CascadeOperation, JobState, PAGES_COLLECTION};

use super::queue::CascadeQueue;
use super::{CascadePayload, METRIC_CASCADE_FAILURES, METRIC_CASCADE_MS};

/// One dependent whose URI was regenerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegeneratedUri {
    pub collection: String,
    pub document_id: Uuid,
    pub old_uri: Option<String>,
    pub new_uri: String,
}

/// A dependent that could not be regenerated. `document_id` is `None` when
/// the dependents could not be enumerated at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeFailure {
    pub document_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CascadeReport {
    pub job_id: Uuid,
    pub operation: CascadeOperation,
    pub state: JobState,
    pub attempts: i32,
    pub regenerated: Vec<RegeneratedUri>,
    /// Dependents finished by an earlier run of the same job.
    pub skipped: usize,
    /// Failures of the last attempt.
    pub errors: Vec<CascadeFailure>,
    pub invalidation: InvalidationSummary,
}

impl CascadeReport {
    fn for_job(job: &CascadeJobRecord) -> Self {
        Self {
            job_id: job.id,
            operation: job.operation,
            state: job.state,
            attempts: job.attempts,
            regenerated: Vec::new(),
            skipped: job.processed_ids.len(),
            errors: Vec::new(),
            invalidation: InvalidationSummary::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == JobState::Done
    }
}

pub struct CascadeExecutor {
    documents: Arc<dyn DocumentsRepo>,
    settings: Arc<dyn RoutingSettingsRepo>,
    generator: Arc<UriGenerator>,
    index: Arc<UriIndexService>,
    dependencies: DependencyAnalyzer,
    invalidation: Arc<InvalidationOrchestrator>,
    queue: CascadeQueue,
}

impl CascadeExecutor {
    pub fn new(
        documents: Arc<dyn DocumentsRepo>,
        settings: Arc<dyn RoutingSettingsRepo>,
        generator: Arc<UriGenerator>,
        index: Arc<UriIndexService>,
        invalidation: Arc<InvalidationOrchestrator>,
        queue: CascadeQueue,
        max_parent_depth: usize,
    ) -> Self {
        Self {
            dependencies: DependencyAnalyzer::new(documents.clone(), max_parent_depth),
            documents,
            settings,
            generator,
            index,
            invalidation,
            queue,
        }
    }

    pub fn queue(&self) -> &CascadeQueue {
        &self.queue
    }

    /// Queue `payload` and run it right away.
    ///
    /// A job with the same idempotency key that already finished is not run
    /// again; its report comes back empty.
    pub async fn submit(&self, payload: &CascadePayload) -> Result<CascadeReport, AppError> {
        let job = self.queue.enqueue(payload).await?;
        if job.state == JobState::Done {
            return Ok(CascadeReport::for_job(&job));
        }
        self.run(job).await
    }

    /// Run every job left pending or running by an earlier process.
    pub async fn resume_pending(&self) -> Result<Vec<CascadeReport>, AppError> {
        let jobs = self.queue.resumable().await?;
        let mut reports = Vec::with_capacity(jobs.len());
        for job in jobs {
            let job_id = job.id;
            match self.run(job).await {
                Ok(report) => reports.push(report),
                Err(err) => error!(%job_id, error = %err, "failed to resume cascade job"),
            }
        }
        Ok(reports)
    }

    /// Run attempts until the job succeeds or runs out of attempts, then
    /// invalidate everything that changed in one batch.
    ///
    /// Dependent failures are collected in the report. Only bookkeeping
    /// failures of the job row itself are returned as errors.
    pub async fn run(&self, mut job: CascadeJobRecord) -> Result<CascadeReport, AppError> {
        let started = Instant::now();
        let payload: CascadePayload = serde_json::from_value(job.payload.clone())
            .map_err(|err| AppError::unexpected(format!("invalid cascade payload: {err}")))?;
        let settings = self.settings.load_routing_settings().await?;
        let mut report = CascadeReport::for_job(&job);
        let mut changes = Vec::new();

        loop {
            self.queue.begin_attempt(&mut job).await?;
            let errors = self
                .attempt(&payload, &settings, &mut job, &mut report, &mut changes)
                .await;
            if errors.is_empty() {
                self.queue.complete(&mut job).await?;
                report.errors.clear();
                break;
            }

            let message = format!(
                "{} dependent(s) failed: {}",
                errors.len(),
                errors[0].message
            );
            report.errors = errors;
            let retry = self.queue.fail_attempt(&mut job, message).await?;
            if !retry {
                break;
            }
            warn!(
                job_id = %job.id,
                operation = job.operation.as_str(),
                attempt = job.attempts,
                failures = report.errors.len(),
                "cascade attempt failed, retrying"
            );
        }

        if !changes.is_empty() {
            report.invalidation = self.invalidation.invalidate_batch(&changes, &settings);
        }
        report.state = job.state;
        report.attempts = job.attempts;

        let operation = job.operation.as_str();
        histogram!(METRIC_CASCADE_MS, "operation" => operation)
            .record(started.elapsed().as_secs_f64() * 1000.0);
        if !report.errors.is_empty() {
            counter!(METRIC_CASCADE_FAILURES, "operation" => operation)
                .increment(report.errors.len() as u64);
            for failure in &report.errors {
                warn!(
                    job_id = %job.id,
                    operation,
                    document_id = ?failure.document_id,
                    error = %failure.message,
                    "cascade dependent failed"
                );
            }
        }

        info!(
            job_id = %job.id,
            operation,
            state = job.state.as_str(),
            attempts = job.attempts,
            regenerated = report.regenerated.len(),
            skipped = report.skipped,
            failures = report.errors.len(),
            tags = report.invalidation.tags_invalidated.len(),
            paths = report.invalidation.paths_invalidated.len(),
            "cascade job completed"
        );
        Ok(report)
    }

    async fn attempt(
        &self,
        payload: &CascadePayload,
        settings: &RoutingSettingsRecord,
        job: &mut CascadeJobRecord,
        report: &mut CascadeReport,
        changes: &mut Vec<DocumentChange>,
    ) -> Vec<CascadeFailure> {
        let dependents = match self.dependents(payload, settings).await {
            Ok(dependents) => dependents,
            Err(err) => {
                return vec![CascadeFailure {
                    document_id: None,
                    message: err.to_string(),
                }];
            }
        };

        let mut errors = Vec::new();
        for document in dependents {
            if job.processed_ids.contains(&document.id) {
                continue;
            }
            let document_id = document.id;
            match self.regenerate(document, settings).await {
                Ok((regenerated, change)) => {
                    report.regenerated.push(regenerated);
                    changes.push(change);
                    self.queue.record_progress(job, document_id).await;
                }
                Err(err) => errors.push(CascadeFailure {
                    document_id: Some(document_id),
                    message: err.to_string(),
                }),
            }
        }
        errors
    }

    /// The documents a job has to regenerate, in the order they must be
    /// processed: parents always come before their children.
    async fn dependents(
        &self,
        payload: &CascadePayload,
        settings: &RoutingSettingsRecord,
    ) -> Result<Vec<DocumentRecord>, AppError> {
        match payload {
            CascadePayload::ArchivePageUpdate { page_id, .. } => {
                let mut items = Vec::new();
                for collection in self.dependencies.archive_users(settings, *page_id) {
                    items.extend(self.dependencies.published_items(&collection).await?);
                }
                Ok(items)
            }
            CascadePayload::PageHierarchyUpdate { page_id, .. } => {
                self.dependencies.descendants(*page_id).await
            }
            CascadePayload::HomepageChange {
                outgoing, incoming, ..
            } => {
                let mut pages = Vec::new();
                for id in [*outgoing, *incoming].into_iter().flatten() {
                    if let Some(page) = self.documents.find_by_id(PAGES_COLLECTION, id).await? {
                        pages.push(page);
                    }
                }
                let mut seen: HashSet<Uuid> = pages.iter().map(|page| page.id).collect();
                let mut dependents = pages.clone();
                for page in &pages {
                    for descendant in self.dependencies.descendants(page.id).await? {
                        if seen.insert(descendant.id) {
                            dependents.push(descendant);
                        }
                    }
                }
                Ok(dependents)
            }
            CascadePayload::SettingsChange { collections, .. } => {
                let mut items = Vec::new();
                for collection in collections {
                    items.extend(self.dependencies.published_items(collection).await?);
                }
                Ok(items)
            }
        }
    }

    /// Regenerate one dependent, persist its URI and refresh its index entry.
    async fn regenerate(
        &self,
        document: DocumentRecord,
        settings: &RoutingSettingsRecord,
    ) -> Result<(RegeneratedUri, DocumentChange), AppError> {
        let collection = document.collection.clone();
        let document_id = document.id;
        let refreshed = refresh(
            self.documents.as_ref(),
            &self.generator,
            &self.index,
            document,
            settings,
        )
        .await?;

        let regenerated = RegeneratedUri {
            collection,
            document_id,
            old_uri: refreshed.old_uri,
            new_uri: refreshed.generated.uri,
        };
        Ok((regenerated, refreshed.change))
    }
}
