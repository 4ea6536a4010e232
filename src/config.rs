// src/config.rs
use crate::columns::TableRegistry;
use crate::error::ConfigError;
use crate::store::{MessageStore, PgMessageStore, PostgrestStore};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq)]
pub enum BackendConfig {
    Postgres { database_url: String },
    Postgrest { base_url: String, api_key: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub tables_config: Option<PathBuf>,
    pub bind_addr: String,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match (get("DATABASE_URL"), get("SUPABASE_URL"), get("SUPABASE_ANON_KEY")) {
            (Some(database_url), _, _) => BackendConfig::Postgres { database_url },
            (None, Some(base_url), Some(api_key)) => BackendConfig::Postgrest { base_url, api_key },
            _ => return Err(ConfigError::MissingBackend),
        };

        Ok(Self {
            backend,
            tables_config: get("TABLES_CONFIG").map(PathBuf::from),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }

    pub fn load_tables(&self) -> Result<TableRegistry, ConfigError> {
        match &self.tables_config {
            Some(path) => {
                tracing::info!("Loading table registry from {}", path.display());
                TableRegistry::load(path)
            }
            None => {
                tracing::info!("TABLES_CONFIG not set. Using the built-in chat_messages table.");
                Ok(TableRegistry::builtin())
            }
        }
    }

    /// Open the long-lived backend handle shared by all requests.
    pub async fn connect_store(&self) -> Result<Arc<dyn MessageStore>, ConfigError> {
        match &self.backend {
            BackendConfig::Postgres { database_url } => {
                tracing::info!("Connecting to Postgres backend...");
                let pool = crate::db::create_pool(database_url).await?;
                Ok(Arc::new(PgMessageStore::new(pool)))
            }
            BackendConfig::Postgrest { base_url, api_key } => {
                tracing::info!("Using PostgREST backend at {}", base_url);
                Ok(Arc::new(PostgrestStore::new(base_url.clone(), api_key.clone())?))
            }
        }
    }
}
