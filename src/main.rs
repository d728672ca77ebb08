use std::{process, sync::Arc};

use folio::{
    application::{RoutingEngine, error::AppError},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        memory::InMemoryRepositories,
        telemetry,
    },
};
use tokio::sync::oneshot;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to load configuration: {err}"
        )))
    })?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(args) => run_serve(settings, args.in_memory).await,
        config::Command::Reindex(_) => run_reindex(settings).await,
        config::Command::Uris(args) => run_uris(settings, args.draft).await,
    }
}

async fn run_serve(settings: config::Settings, in_memory: bool) -> Result<(), AppError> {
    let engine = if in_memory {
        warn!("serving from in-memory repositories; content is lost on exit");
        RoutingEngine::new(
            Arc::new(InMemoryRepositories::new()),
            settings.engine_settings(),
        )
    } else {
        RoutingEngine::new(init_postgres(&settings).await?, settings.engine_settings())
    };

    resume_cascades(&engine).await;
    serve_http(&settings, engine).await
}

async fn run_reindex(settings: config::Settings) -> Result<(), AppError> {
    let engine = RoutingEngine::new(init_postgres(&settings).await?, settings.engine_settings());
    let report = engine.reindexer.rebuild().await?;

    for failure in &report.errors {
        warn!(
            collection = %failure.collection,
            document_id = %failure.document_id,
            error = %failure.message,
            "document could not be reindexed"
        );
    }
    info!(
        documents = report.documents,
        updated = report.updated,
        degraded = report.degraded,
        conflicts = report.conflicts,
        stale_removed = report.stale_removed,
        failed = report.errors.len(),
        tags = report.invalidation.tags_invalidated.len(),
        "reindex completed"
    );
    Ok(())
}

async fn run_uris(settings: config::Settings, draft: bool) -> Result<(), AppError> {
    let engine = RoutingEngine::new(init_postgres(&settings).await?, settings.engine_settings());
    for uri in engine.resolver.list_all_uris(draft).await? {
        println!("{uri}");
    }
    Ok(())
}

async fn init_postgres(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let url = settings.database.url.as_deref().ok_or_else(|| {
        InfraError::configuration("database.url is required unless serving with --in-memory")
    })?;

    let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    let repositories = PostgresRepositories::new(pool);
    repositories
        .health_check()
        .await
        .map_err(InfraError::from)?;
    Ok(Arc::new(repositories))
}

/// Finish cascade jobs interrupted by a previous shutdown or crash.
async fn resume_cascades(engine: &RoutingEngine) {
    match engine.cascades.resume_pending().await {
        Ok(reports) if reports.is_empty() => {}
        Ok(reports) => {
            let failed = reports.iter().filter(|report| !report.is_success()).count();
            info!(resumed = reports.len(), failed, "interrupted cascade jobs resumed");
        }
        Err(err) => warn!(error = %err, "interrupted cascade jobs could not be listed"),
    }
}

async fn serve_http(settings: &config::Settings, engine: RoutingEngine) -> Result<(), AppError> {
    let router = http::build_router(HttpState::new(engine));
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "http listener bound");

    let (stopping_tx, stopping_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = stopping_tx.send(());
            })
            .await
    });

    tokio::select! {
        result = &mut server => return server_result(result),
        _ = stopping_rx => {}
    }

    let grace = settings.server.graceful_shutdown;
    info!(grace_secs = grace.as_secs(), "shutdown requested; draining connections");
    match tokio::time::timeout(grace, server).await {
        Ok(result) => server_result(result),
        Err(_) => {
            warn!(
                grace_secs = grace.as_secs(),
                "graceful shutdown deadline elapsed; dropping open connections"
            );
            Ok(())
        }
    }
}

fn server_result(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    result
        .map_err(|err| AppError::unexpected(format!("server task failed: {err}")))?
        .map_err(|err| AppError::from(InfraError::from(err)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
