//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

use crate::store::WriteMode;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub blog: BlogConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Key-value backend selector
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Key-value store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Path to the SQLite file (sqlite backend only)
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// How composite writes reach the store
    #[serde(default)]
    pub write_mode: WriteMode,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/kvblog.db")
}

/// Blog behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct BlogConfig {
    /// Posts per feed page (default: 10)
    pub posts_per_page: u64,
    /// Users per follower/following page (default: 50)
    pub followers_per_page: u64,
    /// Registrations with this email get the admin role
    pub admin_email: Option<String>,
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Author name cache TTL in seconds (default: 300)
    pub author_ttl: u64,
    /// Maximum cached author names (default: 10000)
    pub author_max_items: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    const LEVELS: [&'static str; 5] = ["trace", "debug", "info", "warn", "error"];

    /// Default `EnvFilter` directive for the configured level
    pub fn filter_directive(&self) -> String {
        format!("kvblog={},tower_http=debug", self.level.to_ascii_lowercase())
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if !Self::LEVELS.contains(&self.level.to_ascii_lowercase().as_str()) {
            return Err(crate::error::AppError::Config(format!(
                "logging.level must be one of {}, got {:?}",
                Self::LEVELS.join(", "),
                self.level
            )));
        }

        if !self.is_json() && !self.format.eq_ignore_ascii_case("pretty") {
            return Err(crate::error::AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.format
            )));
        }

        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (KVBLOG__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("store.backend", "memory")?
            .set_default("store.path", "data/kvblog.db")?
            .set_default("store.write_mode", "sequential")?
            .set_default("blog.posts_per_page", 10)?
            .set_default("blog.followers_per_page", 50)?
            .set_default("cache.author_ttl", 300)?
            .set_default("cache.author_max_items", 10_000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("KVBLOG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.blog.posts_per_page == 0 {
            return Err(crate::error::AppError::Config(
                "blog.posts_per_page must be greater than 0".to_string(),
            ));
        }

        if self.blog.followers_per_page == 0 {
            return Err(crate::error::AppError::Config(
                "blog.followers_per_page must be greater than 0".to_string(),
            ));
        }

        if self.store.backend == StoreBackend::Sqlite && self.store.path.as_os_str().is_empty() {
            return Err(crate::error::AppError::Config(
                "store.path is required when store.backend=sqlite".to_string(),
            ));
        }

        self.logging.validate()
    }

    /// Configuration for tests and embedded use: memory store, default page sizes.
    pub fn in_memory() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                path: default_store_path(),
                write_mode: WriteMode::Sequential,
            },
            blog: BlogConfig {
                posts_per_page: 10,
                followers_per_page: 50,
                admin_email: None,
            },
            cache: CacheConfig {
                author_ttl: 300,
                author_max_items: 10_000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
