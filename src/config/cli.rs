use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Folio binary.
#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Folio content routing engine")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the routing HTTP service.
    Serve(Box<ServeArgs>),
    /// Regenerate URIs and rebuild the URI index for every frontend collection.
    Reindex(ReindexArgs),
    /// Print every indexed URI.
    Uris(UrisArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,

    /// Keep documents, index and jobs in process memory instead of Postgres.
    #[arg(long = "in-memory", action = clap::ArgAction::SetTrue)]
    pub in_memory: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override how long in-flight requests may take to finish on shutdown.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the log level filter (e.g. info, debug).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Force JSON log output.
    #[arg(long = "log-json", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub log_json: Option<bool>,

    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the Postgres pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Enable or disable the read cache.
    #[arg(long = "cache-enabled", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub cache_enabled: Option<bool>,

    /// Override the maximum number of cached entries.
    #[arg(long = "cache-entry-limit", value_name = "COUNT")]
    pub cache_entry_limit: Option<usize>,

    /// Override the cache entry lifetime; zero keeps entries until invalidated.
    #[arg(long = "cache-default-ttl-seconds", value_name = "SECONDS")]
    pub cache_default_ttl_seconds: Option<u64>,

    /// Override the frontend collections, highest priority first.
    #[arg(long = "routing-collections", value_name = "NAMES", value_delimiter = ',')]
    pub routing_collections: Option<Vec<String>>,

    /// Override the parent-chain depth limit.
    #[arg(long = "routing-max-parent-depth", value_name = "DEPTH")]
    pub routing_max_parent_depth: Option<usize>,

    /// Override the URI conflict policy (`warn` or `reject`).
    #[arg(long = "routing-conflict-policy", value_name = "POLICY")]
    pub routing_conflict_policy: Option<String>,

    /// Override how many attempts a cascade job gets.
    #[arg(long = "cascade-max-attempts", value_name = "COUNT")]
    pub cascade_max_attempts: Option<u32>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ReindexArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct UrisArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// List the draft view of the site instead of the published one.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub draft: bool,
}
