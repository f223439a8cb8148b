//! Configuration management for tastemark.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "tastemark";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "tastemark.db";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "TASTEMARK_";

/// Shortest accepted token signing secret, in bytes.
const MIN_SECRET_LEN: usize = 16;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables prefixed with `TASTEMARK_`, sections split on `__`
///    (e.g. `TASTEMARK_AUTH__TOKEN_SECRET`)
/// 2. The bare `PORT` environment variable, mapped to `server.port`
/// 3. TOML config file at `~/.config/tastemark/config.toml`
/// 4. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Authentication configuration.
    pub auth: AuthConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory of pre-built client assets served for non-API paths.
    pub static_dir: Option<PathBuf>,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/tastemark/tastemark.db`
    pub database_path: Option<PathBuf>,
}

/// Authentication configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Secret used to sign bearer tokens. Required to serve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,
    /// Lifetime of issued tokens in hours.
    pub token_ttl_hours: u32,
    /// User allowed to modify any venue.
    pub admin_username: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            static_dir: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_hours: 24,
            admin_username: "Admin".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::ConfigValidation {
                message: "server.port must be greater than 0".to_string(),
            });
        }

        if self.auth.token_ttl_hours == 0 {
            return Err(Error::ConfigValidation {
                message: "auth.token_ttl_hours must be greater than 0".to_string(),
            });
        }

        if let Some(secret) = &self.auth.token_secret {
            if secret.len() < MIN_SECRET_LEN {
                return Err(Error::ConfigValidation {
                    message: format!(
                        "auth.token_secret must be at least {MIN_SECRET_LEN} bytes"
                    ),
                });
            }
        }

        if self.auth.admin_username.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "auth.admin_username cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the socket address the server binds to.
    ///
    /// # Errors
    ///
    /// Returns an error if `server.host` is not a valid IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| Error::ConfigValidation {
                message: format!("invalid server.host: {}", self.server.host),
            })
    }

    /// Get the token signing secret.
    ///
    /// # Errors
    ///
    /// Returns an error if no secret is configured.
    pub fn token_secret(&self) -> Result<&str> {
        self.auth
            .token_secret
            .as_deref()
            .ok_or_else(|| Error::ConfigValidation {
                message: format!(
                    "auth.token_secret must be set (e.g. {ENV_PREFIX}AUTH__TOKEN_SECRET)"
                ),
            })
    }

    /// Get the token lifetime as a Duration.
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.auth.token_ttl_hours) * 60 * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert!(config.server.static_dir.is_none());
        assert!(config.storage.database_path.is_none());
        assert!(config.auth.token_secret.is_none());
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.auth.admin_username, "Admin");
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("server.port"));
    }

    #[test]
    fn test_validate_zero_ttl() {
        let mut config = Config::default();
        config.auth.token_ttl_hours = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("token_ttl_hours"));
    }

    #[test]
    fn test_validate_short_secret() {
        let mut config = Config::default();
        config.auth.token_secret = Some("short".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("token_secret"));
    }

    #[test]
    fn test_validate_blank_admin() {
        let mut config = Config::default();
        config.auth.admin_username = "  ".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_secret_required() {
        let mut config = Config::default();
        assert!(config.token_secret().is_err());

        config.auth.token_secret = Some("a-long-enough-secret".to_string());
        assert_eq!(config.token_secret().unwrap(), "a-long-enough-secret");
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        let path = config.database_path();

        assert!(path.to_string_lossy().contains("tastemark.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_bind_addr() {
        let mut config = Config::default();
        config.server.host = "0.0.0.0".to_string();
        config.server.port = 8080;

        assert_eq!(config.bind_addr().unwrap().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_bind_addr_invalid_host() {
        let mut config = Config::default();
        config.server.host = "not a host".to_string();

        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_token_ttl() {
        let config = Config::default();
        assert_eq!(config.token_ttl(), Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("tastemark"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")))
                .expect("defaults should load");
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_toml_and_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "config.toml",
                r#"
                [server]
                port = 4000

                [auth]
                admin_username = "root"
                "#,
            )?;
            jail.set_env("TASTEMARK_AUTH__TOKEN_SECRET", "0123456789abcdef");

            let config = Config::load_from(Some(jail.directory().join("config.toml")))
                .expect("config should load");
            assert_eq!(config.server.port, 4000);
            assert_eq!(config.auth.admin_username, "root");
            assert_eq!(
                config.auth.token_secret.as_deref(),
                Some("0123456789abcdef")
            );
            Ok(())
        });
    }

    #[test]
    fn test_load_toml_sections_without_env() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "config.toml",
                r#"
                [server]
                host = "0.0.0.0"
                static_dir = "client/build"

                [storage]
                database_path = "/srv/tastemark/reviews.db"

                [auth]
                token_ttl_hours = 2
                "#,
            )?;

            let config = Config::load_from(Some(jail.directory().join("config.toml")))
                .expect("config should load");
            assert_eq!(config.server.host, "0.0.0.0");
            assert_eq!(config.server.port, 3000);
            assert_eq!(
                config.server.static_dir,
                Some(PathBuf::from("client/build"))
            );
            assert_eq!(
                config.database_path(),
                PathBuf::from("/srv/tastemark/reviews.db")
            );
            assert_eq!(config.token_ttl(), Duration::from_secs(2 * 60 * 60));
            Ok(())
        });
    }

    #[test]
    fn test_bare_port_env_maps_to_server_port() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("PORT", "5050");

            let config = Config::load_from(Some(jail.directory().join("missing.toml")))
                .expect("config should load");
            assert_eq!(config.server.port, 5050);
            Ok(())
        });
    }

    #[test]
    fn test_config_serialize_omits_missing_secret() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("admin_username"));
        assert!(!json.contains("token_secret"));
    }
}
