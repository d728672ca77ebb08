use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use folio::application::hooks::DocumentInput;
use folio::application::{EngineSettings, RoutingEngine};
use folio::domain::collections::FrontendCollections;
use folio::domain::entities::RoutingSettingsRecord;
use folio::domain::types::DocumentStatus;
use folio::infra::memory::InMemoryRepositories;
use folio::infra::telemetry;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serial_test::serial;

fn snapshotter() -> &'static Snapshotter {
    static SNAPSHOTTER: OnceLock<Snapshotter> = OnceLock::new();
    SNAPSHOTTER.get_or_init(|| {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder
            .install()
            .expect("debug metrics recorder should install in this test process");
        telemetry::describe_metrics();
        snapshotter
    })
}

type Snapshot = Vec<(String, DebugValue)>;

fn snapshot() -> Snapshot {
    snapshotter()
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(key, _, _, value)| (key.key().name().to_string(), value))
        .collect()
}

fn counter(snapshot: &Snapshot, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _)| key == name)
        .map(|(_, value)| match value {
            DebugValue::Counter(count) => *count,
            _ => 0,
        })
        .sum()
}

fn histogram(snapshot: &Snapshot, name: &str) -> Vec<f64> {
    snapshot
        .iter()
        .filter(|(key, _)| key == name)
        .flat_map(|(_, value)| match value {
            DebugValue::Histogram(samples) => samples.iter().map(|sample| sample.0).collect(),
            _ => Vec::new(),
        })
        .collect()
}

fn engine() -> RoutingEngine {
    let settings = EngineSettings {
        collections: FrontendCollections::new(["posts"]).expect("valid collections"),
        ..Default::default()
    };
    RoutingEngine::new(Arc::new(InMemoryRepositories::new()), settings)
}

fn published(title: &str, parent_id: Option<uuid::Uuid>) -> DocumentInput {
    DocumentInput {
        slug: None,
        title: title.to_string(),
        status: DocumentStatus::Published,
        parent_id,
        in_navigation: false,
        content: serde_json::json!({}),
    }
}

#[tokio::test]
#[serial]
async fn resolve_counts_cache_misses_then_hits() {
    let engine = engine();
    engine
        .hooks
        .create_document("pages", published("Contact", None))
        .await
        .unwrap();

    let before = snapshot();
    engine.resolver.resolve("/contact", false).await.unwrap();
    engine.resolver.resolve("/contact", false).await.unwrap();
    let after = snapshot();

    let delta = |name: &str| counter(&after, name) - counter(&before, name);
    assert_eq!(delta("folio_cache_miss_total"), 1);
    assert_eq!(delta("folio_cache_hit_total"), 1);
}

#[tokio::test]
#[serial]
async fn conflicts_and_cascades_are_recorded() {
    let engine = engine();
    let news = engine
        .hooks
        .create_document("pages", published("News", None))
        .await
        .unwrap()
        .document;
    engine
        .hooks
        .save_routing_settings(RoutingSettingsRecord {
            archive_pages: BTreeMap::from([("posts".to_string(), news.id)]),
            ..Default::default()
        })
        .await
        .unwrap();
    for title in ["First", "Second", "Third"] {
        engine
            .hooks
            .create_document("posts", published(title, None))
            .await
            .unwrap();
    }

    let before = snapshot();
    engine
        .hooks
        .create_document("pages", published("First", Some(news.id)))
        .await
        .unwrap();
    let after = snapshot();
    assert_eq!(
        counter(&after, "folio_uri_conflicts_total")
            - counter(&before, "folio_uri_conflicts_total"),
        1
    );

    let mut rename = published("News", None);
    rename.slug = Some("updates".into());
    engine
        .hooks
        .update_document("pages", news.id, rename)
        .await
        .unwrap();
    let after = snapshot();

    assert!(!histogram(&after, "folio_cascade_ms").is_empty());
    assert!(
        histogram(&after, "folio_invalidation_batch_size").contains(&3.0),
        "archive cascade invalidates its three items in one batch"
    );
}
