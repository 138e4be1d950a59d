use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKSHELF_ENV";
const CONFIG_DIR_ENV: &str = "BOOKSHELF_CONFIG_DIR";

/// Plain variables understood by earlier deployments, mapped onto settings keys.
const LEGACY_OVERRIDES: &[(&str, &str)] = &[
    ("MONGO_URI", "database.uri"),
    ("AUTH_TOKEN", "auth.token"),
    ("PORT", "server.port"),
    ("GRAPHQL_PATH", "server.graphql_path"),
];

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw {
            "local" => Ok(Self::Local),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// `BOOKSHELF_*` variables and finally the legacy plain variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();
        Self::from_vars(std::env::vars().collect())
    }

    /// Same as [`Settings::load`], reading variables from `vars` instead of the
    /// process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> anyhow::Result<Self> {
        let environment = vars
            .get(ENV_VAR_NAME)
            .cloned()
            .unwrap_or_else(|| DEFAULT_ENV.to_string());
        let config_dir = match vars.get(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()
                .map(|cwd| cwd.join("config"))
                .context("unable to resolve current directory")?,
        };

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let mut builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix("BOOKSHELF")
                    .prefix_separator("_")
                    .separator("__")
                    .source(Some(vars.clone())),
            );

        for (var, key) in LEGACY_OVERRIDES {
            builder = builder
                .set_override_option(*key, vars.get(*var).cloned())
                .with_context(|| format!("failed to apply {} override", var))?;
        }

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = Environment::parse(&environment)?;
        settings.server.graphql_path = normalize_path(&settings.server.graphql_path);
        settings.check_timeouts()?;

        Ok(settings)
    }

    /// A request must outlive the driver's own timeouts, otherwise a hung
    /// database surfaces as a bare HTTP timeout instead of a storage error.
    pub fn check_timeouts(&self) -> anyhow::Result<()> {
        if self.database.backend != StorageBackend::Mongodb {
            return Ok(());
        }
        let driver_ms =
            self.database.server_selection_timeout_ms + self.database.connect_timeout_ms;
        if self.server.request_timeout_ms <= driver_ms {
            return Err(anyhow!(
                "server.request_timeout_ms ({}) must exceed database server selection plus connect timeout ({})",
                self.server.request_timeout_ms,
                driver_ms
            ));
        }
        Ok(())
    }

    /// Whether GraphiQL and schema introspection should be served.
    pub fn introspection_enabled(&self) -> bool {
        self.environment != Environment::Production
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return ServerSettings::default_graphql_path();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "ServerSettings::default_graphql_path")]
    pub graphql_path: String,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        5000
    }

    fn default_request_timeout_ms() -> u64 {
        45000
    }

    fn default_graphql_path() -> String {
        "/graphql".to_string()
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            graphql_path: Self::default_graphql_path(),
        }
    }
}

/// Which storage implementation backs the record store.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Mongodb,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "DatabaseSettings::default_uri")]
    pub uri: String,
    #[serde(default = "DatabaseSettings::default_name")]
    pub name: String,
    #[serde(default = "DatabaseSettings::default_min_pool_size")]
    pub min_pool_size: u32,
    #[serde(default = "DatabaseSettings::default_max_pool_size")]
    pub max_pool_size: u32,
    #[serde(default = "DatabaseSettings::default_server_selection_timeout_ms")]
    pub server_selection_timeout_ms: u64,
    #[serde(default = "DatabaseSettings::default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "DatabaseSettings::default_retry_writes")]
    pub retry_writes: bool,
}

impl DatabaseSettings {
    fn default_uri() -> String {
        "mongodb://127.0.0.1:27017".to_string()
    }

    fn default_name() -> String {
        "bookshelf".to_string()
    }

    fn default_min_pool_size() -> u32 {
        5
    }

    fn default_max_pool_size() -> u32 {
        10
    }

    fn default_server_selection_timeout_ms() -> u64 {
        30000
    }

    fn default_connect_timeout_ms() -> u64 {
        10000
    }

    fn default_retry_writes() -> bool {
        true
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            uri: Self::default_uri(),
            name: Self::default_name(),
            min_pool_size: Self::default_min_pool_size(),
            max_pool_size: Self::default_max_pool_size(),
            server_selection_timeout_ms: Self::default_server_selection_timeout_ms(),
            connect_timeout_ms: Self::default_connect_timeout_ms(),
            retry_writes: Self::default_retry_writes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info,tower_http=debug".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Shared-secret authorization for the GraphQL operations.
#[derive(Clone, Deserialize)]
pub struct AuthSettings {
    /// Pre-shared bearer token. Authorization is disabled when unset.
    #[serde(default)]
    pub token: Option<String>,
    /// GraphQL field names that require the bearer token.
    #[serde(default = "AuthSettings::default_protected_operations")]
    pub protected_operations: Vec<String>,
}

impl AuthSettings {
    fn default_protected_operations() -> Vec<String> {
        vec!["bookCreate".to_string()]
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token: None,
            protected_operations: Self::default_protected_operations(),
        }
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("protected_operations", &self.protected_operations)
            .finish()
    }
}
