use std::{fmt::Display, net::SocketAddr, str::FromStr, sync::Arc};

use harvest_store::{DataStore, InMemoryDataStore, RestDataStore, SqliteDataStore, StoreError};
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_SQLITE_PATH: &str = "harvest.db";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Which persistence backend to open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendConfig {
    Memory,
    Sqlite { path: String },
    Rest { url: String, key: String },
}

impl BackendConfig {
    pub fn name(&self) -> &'static str {
        match self {
            BackendConfig::Memory => "memory",
            BackendConfig::Sqlite { .. } => "sqlite",
            BackendConfig::Rest { .. } => "rest",
        }
    }

    pub fn open(&self) -> Result<Arc<dyn DataStore>, StoreError> {
        Ok(match self {
            BackendConfig::Memory => Arc::new(InMemoryDataStore::new()),
            BackendConfig::Sqlite { path } => Arc::new(SqliteDataStore::open(path)?),
            BackendConfig::Rest { url, key } => Arc::new(RestDataStore::new(url, key)),
        })
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub backend: BackendConfig,
    /// Accepted for compatibility; no session logic uses it.
    pub secret_key: Option<String>,
    pub production: bool,
    /// Insert demo rows into empty tables.
    pub auto_seed: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let production = ["VERCEL_ENV", "HARVEST_ENV"]
            .iter()
            .any(|k| var(k).is_some_and(|v| v.eq_ignore_ascii_case("production")));

        let addr = try_load(&var, "HARVEST_ADDR", DEFAULT_ADDR)?;

        let default_backend = if production { "rest" } else { "sqlite" };
        let backend = match var("HARVEST_BACKEND")
            .unwrap_or_else(|| default_backend.to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => BackendConfig::Memory,
            "sqlite" => {
                let path = var("DATABASE_URL").unwrap_or_else(|| {
                    info!("DATABASE_URL not set, using default: {DEFAULT_SQLITE_PATH}");
                    DEFAULT_SQLITE_PATH.to_string()
                });
                BackendConfig::Sqlite {
                    path: sqlite_path(&path).to_string(),
                }
            }
            "rest" | "supabase" => BackendConfig::Rest {
                url: var("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?,
                key: var("SUPABASE_KEY").ok_or(ConfigError::Missing("SUPABASE_KEY"))?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "HARVEST_BACKEND",
                    reason: format!("unknown backend {other:?}"),
                })
            }
        };

        let auto_seed = match var("HARVEST_SEED") {
            Some(v) => parse_flag("HARVEST_SEED", &v)?,
            None => !production,
        };

        let secret_key = var("SECRET_KEY");
        if secret_key.is_none() {
            warn!("SECRET_KEY not set");
        }

        Ok(Self {
            addr,
            backend,
            secret_key,
            production,
            auto_seed,
        })
    }
}

fn try_load<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

fn sqlite_path(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}
