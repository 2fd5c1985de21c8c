//! Configuration module for Meloman.
//!
//! Loads configuration from `config.toml` with environment variable overrides.

use config::{Config as ConfigLoader, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::error::AppError;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Server configuration
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Secret used to sign session cookies
    pub session_secret: Option<String>,
    /// Mark session cookies `Secure` (serve over HTTPS only)
    #[serde(default)]
    pub secure_cookies: bool,
}

// Custom Debug implementation to avoid exposing session_secret
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "session_secret",
                &self.session_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_secret: None,
            secure_cookies: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/meloman.db")
}

/// Uploaded playlist covers
#[derive(Debug, Clone, Deserialize)]
pub struct UploadsConfig {
    #[serde(default = "default_uploads_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_max_cover_bytes")]
    pub max_cover_bytes: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_uploads_dir(),
            max_cover_bytes: default_max_cover_bytes(),
        }
    }
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("./data/uploads")
}

fn default_max_cover_bytes() -> usize {
    5 * 1024 * 1024
}

/// Catalog import defaults for the `meloman-catalog` tool
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
    #[serde(default)]
    pub lyrics_dir: Option<PathBuf>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            lyrics_dir: None,
        }
    }
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("data/catalog.csv")
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. `config.toml` in current directory (optional)
    /// 3. Environment variables with `MELOMAN_` prefix
    ///
    /// Environment variables use double underscore for nesting:
    /// - `MELOMAN_SERVER__PORT=9000` sets `server.port`
    /// - `MELOMAN_DATABASE__PATH=/data/db.sqlite` sets `database.path`
    pub fn load() -> Result<Self, AppError> {
        Self::load_from("config.toml")
    }

    /// Load configuration from a specific file path.
    pub fn load_from(config_path: &str) -> Result<Self, AppError> {
        let config = ConfigLoader::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("server.secure_cookies", false)?
            .set_default("database.path", "./data/meloman.db")?
            .set_default("uploads.dir", "./data/uploads")?
            .set_default("uploads.max_cover_bytes", 5 * 1024 * 1024)?
            .set_default("catalog.csv_path", "data/catalog.csv")?
            .add_source(File::with_name(config_path).required(false))
            // MELOMAN_SERVER__PORT=9000 -> server.port = 9000
            .add_source(
                Environment::with_prefix("MELOMAN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.server.session_secret.is_none() {
            tracing::warn!("Session secret not configured - sessions will not survive a restart");
        }

        if self.uploads.max_cover_bytes == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "uploads.max_cover_bytes must be greater than zero".to_string(),
            )));
        }

        Ok(())
    }

    /// Get the server socket address
    pub fn server_addr(&self) -> std::net::SocketAddr {
        use std::net::{IpAddr, Ipv4Addr, SocketAddr};
        let ip: IpAddr = self.server.host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid host '{}', using 0.0.0.0", self.server.host);
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        });
        SocketAddr::new(ip, self.server.port)
    }
}
