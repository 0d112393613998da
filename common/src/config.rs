//! Service configuration.
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file in the working directory.

use std::fmt;
use std::path::PathBuf;

use crate::errors::{AppError, AppResult};

/// Default bind port.
pub const DEFAULT_PORT: u16 = 8000;
/// Connections older than this are recreated (59 minutes).
pub const DEFAULT_CONNECTION_TTL_SECS: u64 = 3540;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LAKEBASE_DB_NAME: &str = "databricks_postgres";

/// Top level configuration of the spatial service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    /// Directory holding `index.html`, `map.html` and the static assets.
    pub frontend_dir: PathBuf,
    pub database: DatabaseSource,
    pub connection_ttl_secs: u64,
    pub connect_timeout_secs: u64,
    pub query_timeout_secs: u64,
    /// Schema scanned by table discovery.
    pub spatial_schema: String,
    /// Resolve identifiers against table discovery before building SQL.
    pub strict_identifiers: bool,
}

/// Where database connections come from.
#[derive(Clone)]
pub enum DatabaseSource {
    /// A plain PostgreSQL URL.
    Url(String),
    /// A managed instance with short-lived credentials.
    Lakebase(LakebaseSettings),
}

/// Managed database instance settings.
#[derive(Clone)]
pub struct LakebaseSettings {
    /// Workspace base URL, e.g. `https://adb-123.azuredatabricks.net`.
    pub workspace_host: String,
    pub workspace_token: String,
    pub instance_name: String,
    pub db_name: String,
    pub user: String,
}

impl fmt::Debug for DatabaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseSource::Url(_) => f.write_str("Url(<redacted>)"),
            DatabaseSource::Lakebase(settings) => f.debug_tuple("Lakebase").field(settings).finish(),
        }
    }
}

impl fmt::Debug for LakebaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LakebaseSettings")
            .field("workspace_host", &self.workspace_host)
            .field("workspace_token", &"<redacted>")
            .field("instance_name", &self.instance_name)
            .field("db_name", &self.db_name)
            .field("user", &self.user)
            .finish()
    }
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn load_with_service(service_name: &str) -> AppResult<Self> {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database = match get("DATABASE_URL") {
            Some(url) => DatabaseSource::Url(url),
            None => {
                let required = |key: &str| {
                    get(key).ok_or_else(|| {
                        AppError::Config(format!("{key} must be set when DATABASE_URL is not"))
                    })
                };
                DatabaseSource::Lakebase(LakebaseSettings {
                    workspace_host: required("LAKEBASE_WORKSPACE_HOST")?
                        .trim_end_matches('/')
                        .to_string(),
                    workspace_token: required("LAKEBASE_WORKSPACE_TOKEN")?,
                    instance_name: required("LAKEBASE_INSTANCE_NAME")?,
                    db_name: get("LAKEBASE_DB_NAME")
                        .unwrap_or_else(|| DEFAULT_LAKEBASE_DB_NAME.to_string()),
                    user: required("LAKEBASE_USER")?,
                })
            }
        };

        Ok(Self {
            service_name: service_name.to_string(),
            host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("SERVER_PORT", get("SERVER_PORT"), DEFAULT_PORT)?,
            frontend_dir: PathBuf::from(get("FRONTEND_DIR").unwrap_or_else(|| "frontend".to_string())),
            database,
            connection_ttl_secs: parse_or(
                "CONNECTION_TTL_SECS",
                get("CONNECTION_TTL_SECS"),
                DEFAULT_CONNECTION_TTL_SECS,
            )?,
            connect_timeout_secs: parse_or(
                "CONNECT_TIMEOUT_SECS",
                get("CONNECT_TIMEOUT_SECS"),
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
            query_timeout_secs: parse_or(
                "QUERY_TIMEOUT_SECS",
                get("QUERY_TIMEOUT_SECS"),
                DEFAULT_QUERY_TIMEOUT_SECS,
            )?,
            spatial_schema: get("SPATIAL_SCHEMA").unwrap_or_else(|| "public".to_string()),
            strict_identifiers: parse_or("STRICT_IDENTIFIERS", get("STRICT_IDENTIFIERS"), false)?,
        })
    }

    /// Socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> AppResult<T> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has invalid value '{raw}'"))),
        None => Ok(default),
    }
}

/// Loads a `.env` file from the working directory, if present.
///
/// Variables already set in the environment win.
pub fn load_dotenv() {
    let Ok(content) = std::fs::read_to_string(".env") else {
        return;
    };
    for (key, value) in parse_dotenv(&content) {
        if std::env::var(key).is_err() {
            std::env::set_var(key, value);
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim().trim_matches('"')))
        .collect()
}
