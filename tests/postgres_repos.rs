//! Runs against a live Postgres; set `DATABASE_URL` and pass `--ignored`.

use std::collections::HashSet;
use std::sync::Arc;

use folio::application::hooks::DocumentInput;
use folio::application::repos::{NewUriIndexEntry, RepoError, UriIndexRepo};
use folio::application::resolver::Resolution;
use folio::application::{EngineSettings, RoutingEngine};
use folio::domain::collections::FrontendCollections;
use folio::domain::types::DocumentStatus;
use folio::infra::db::PostgresRepositories;
use sqlx::PgPool;
use uuid::Uuid;

fn published(title: &str, slug: &str, parent_id: Option<Uuid>) -> DocumentInput {
    DocumentInput {
        slug: Some(slug.to_string()),
        title: title.to_string(),
        status: DocumentStatus::Published,
        parent_id,
        in_navigation: true,
        content: serde_json::json!({ "blocks": [] }),
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn routing_indexes_exist(pool: PgPool) {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT indexname FROM pg_indexes WHERE schemaname = 'public' AND tablename = 'uri_index'",
    )
    .fetch_all(&pool)
    .await
    .expect("fetch uri_index indexes");

    let indexes: HashSet<String> = rows.into_iter().collect();
    for expected in [
        "uri_index_document_key",
        "uri_index_uri_status_idx",
        "uri_index_previous_uris_idx",
    ] {
        assert!(indexes.contains(expected), "missing {expected}");
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn second_entry_for_a_document_is_a_duplicate(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let document_id = Uuid::new_v4();
    let entry = |uri: &str| NewUriIndexEntry {
        uri: uri.to_string(),
        source_collection: "pages".into(),
        document_id,
        status: DocumentStatus::Published,
        template_id: None,
        previous_uris: Vec::new(),
    };

    repos.insert_entry(entry("/first")).await.expect("first entry");
    let err = repos.insert_entry(entry("/second")).await.unwrap_err();
    assert!(matches!(err, RepoError::Duplicate { .. }), "got {err:?}");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn engine_round_trips_through_postgres(pool: PgPool) {
    let settings = EngineSettings {
        collections: FrontendCollections::new(["posts"]).expect("valid collections"),
        ..Default::default()
    };
    let engine = RoutingEngine::new(Arc::new(PostgresRepositories::new(pool)), settings);

    let about = engine
        .hooks
        .create_document("pages", published("About", "about", None))
        .await
        .expect("create about")
        .document;
    let team = engine
        .hooks
        .create_document("pages", published("Team", "team", Some(about.id)))
        .await
        .expect("create team")
        .document;
    assert_eq!(team.uri.as_deref(), Some("/about/team"));

    let mut rename = published("About", "company", None);
    rename.in_navigation = about.in_navigation;
    let outcome = engine
        .hooks
        .update_document("pages", about.id, rename)
        .await
        .expect("rename about");
    assert_eq!(outcome.after.cascades.len(), 1);
    assert!(outcome.after.cascades[0].is_success());

    match engine.resolver.resolve("/about/team", false).await.unwrap() {
        Resolution::Redirect { location, .. } => assert_eq!(location, "/company/team"),
        other => panic!("expected a redirect, got {other:?}"),
    }
    assert_eq!(
        engine.resolver.list_all_uris(false).await.unwrap(),
        vec!["/company".to_string(), "/company/team".to_string()]
    );
}
