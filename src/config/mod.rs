//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{
    CliArgs, Command, DatabaseOverride, ReindexArgs, ServeArgs, ServeOverrides, UrisArgs,
};

use std::{net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::EngineSettings;
use crate::application::cascade::DEFAULT_MAX_ATTEMPTS;
use crate::application::hooks::ConflictPolicy;
use crate::application::routing::generator::DEFAULT_MAX_PARENT_DEPTH;
use crate::cache::CacheConfig;
use crate::domain::collections::FrontendCollections;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folio";
const ENV_PREFIX: &str = "FOLIO";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_ENTRY_LIMIT: usize = 1_000;
const DEFAULT_CACHE_TTL_SECS: u64 = 3_600;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub routing: RoutingSettings,
    pub cascade: CascadeSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub entry_limit: usize,
    pub default_ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RoutingSettings {
    /// Frontend collections, `pages` first.
    pub frontend_collections: FrontendCollections,
    pub max_parent_depth: usize,
    pub conflict_policy: ConflictPolicy,
}

#[derive(Debug, Clone)]
pub struct CascadeSettings {
    pub max_attempts: i32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("routing.frontend_collections")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Reindex(args)) => raw.apply_database_override(&args.database),
        Some(Command::Uris(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            routing,
            cascade,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache),
            routing: build_routing_settings(routing)?,
            cascade: build_cascade_settings(cascade)?,
        })
    }

    /// Construction settings for the routing engine.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            collections: self.routing.frontend_collections.clone(),
            max_parent_depth: self.routing.max_parent_depth,
            cascade_max_attempts: self.cascade.max_attempts,
            conflict_policy: self.routing.conflict_policy,
            cache: CacheConfig::from(&self.cache),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    routing: RawRoutingSettings,
    cascade: RawCascadeSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(limit) = overrides.cache_entry_limit {
            self.cache.entry_limit = Some(limit);
        }
        if let Some(ttl) = overrides.cache_default_ttl_seconds {
            self.cache.default_ttl_secs = Some(ttl);
        }
        if let Some(collections) = overrides.routing_collections.as_ref() {
            self.routing.frontend_collections = Some(collections.clone());
        }
        if let Some(depth) = overrides.routing_max_parent_depth {
            self.routing.max_parent_depth = Some(depth);
        }
        if let Some(policy) = overrides.routing_conflict_policy.as_ref() {
            self.routing.conflict_policy = Some(policy.clone());
        }
        if let Some(attempts) = overrides.cascade_max_attempts {
            self.cascade.max_attempts = Some(attempts);
        }

        self.apply_database_override(&overrides.database);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max).ok_or_else(|| {
        LoadError::invalid("database.max_connections", "must be greater than zero")
    })?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> CacheSettings {
    CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        entry_limit: cache.entry_limit.unwrap_or(DEFAULT_CACHE_ENTRY_LIMIT),
        default_ttl_secs: cache.default_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS),
    }
}

fn build_routing_settings(routing: RawRoutingSettings) -> Result<RoutingSettings, LoadError> {
    let frontend_collections =
        FrontendCollections::new(routing.frontend_collections.unwrap_or_default())
            .map_err(|err| LoadError::invalid("routing.frontend_collections", err.to_string()))?;

    let max_parent_depth = routing.max_parent_depth.unwrap_or(DEFAULT_MAX_PARENT_DEPTH);
    if max_parent_depth == 0 {
        return Err(LoadError::invalid(
            "routing.max_parent_depth",
            "must be greater than zero",
        ));
    }

    let conflict_policy = match routing.conflict_policy.as_deref().map(str::trim) {
        None | Some("") => ConflictPolicy::default(),
        Some(value) if value.eq_ignore_ascii_case("warn") => ConflictPolicy::Warn,
        Some(value) if value.eq_ignore_ascii_case("reject") => ConflictPolicy::Reject,
        Some(value) => {
            return Err(LoadError::invalid(
                "routing.conflict_policy",
                format!("expected `warn` or `reject`, got `{value}`"),
            ));
        }
    };

    Ok(RoutingSettings {
        frontend_collections,
        max_parent_depth,
        conflict_policy,
    })
}

fn build_cascade_settings(cascade: RawCascadeSettings) -> Result<CascadeSettings, LoadError> {
    let attempts = match cascade.max_attempts {
        Some(0) => {
            return Err(LoadError::invalid(
                "cascade.max_attempts",
                "must be greater than zero",
            ));
        }
        Some(value) => i32::try_from(value).map_err(|_| {
            LoadError::invalid("cascade.max_attempts", "value exceeds supported range")
        })?,
        None => DEFAULT_MAX_ATTEMPTS,
    };

    Ok(CascadeSettings {
        max_attempts: attempts,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    entry_limit: Option<usize>,
    default_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRoutingSettings {
    frontend_collections: Option<Vec<String>>,
    max_parent_depth: Option<usize>,
    conflict_policy: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCascadeSettings {
    max_attempts: Option<u32>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}
