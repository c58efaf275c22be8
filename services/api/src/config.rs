//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which `Lexicon` strategy serves word lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupStrategy {
    Dataset,
    Generative,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// When absent, articles and words live in memory for the life of the process.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub openai_api_url: String,
    pub lookup_model: String,
    pub rewrite_model: String,
    pub lookup_strategy: LookupStrategy,
    pub dictionary_path: PathBuf,
    pub request_timeout: Duration,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let or_default =
            |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        // --- Server and Database Settings ---
        let bind_address_str = or_default("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = var("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Generative Backend (the key is optional) ---
        let openai_api_key = var("OPENAI_API_KEY").filter(|key| !key.trim().is_empty());
        let openai_api_url = or_default("OPENAI_API_URL", DEFAULT_API_URL);
        let lookup_model = or_default("LOOKUP_MODEL", DEFAULT_MODEL);
        let rewrite_model = or_default("REWRITE_MODEL", DEFAULT_MODEL);

        let timeout_str = or_default("REQUEST_TIMEOUT_SECS", "60");
        let request_timeout = timeout_str
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "REQUEST_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                )
            })?;

        // --- Lexicon Settings ---
        let strategy_str = or_default("LOOKUP_STRATEGY", "dataset");
        let lookup_strategy = match strategy_str.to_lowercase().as_str() {
            "dataset" => LookupStrategy::Dataset,
            "generative" => LookupStrategy::Generative,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LOOKUP_STRATEGY".to_string(),
                    format!("'{}' is neither 'dataset' nor 'generative'", other),
                ))
            }
        };
        let dictionary_path = PathBuf::from(or_default("DICTIONARY_PATH", "./ecdict.csv"));

        let cors_origin = or_default("CORS_ORIGIN", "http://localhost:5173");

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            openai_api_url,
            lookup_model,
            rewrite_model,
            lookup_strategy,
            dictionary_path,
            request_timeout,
            cors_origin,
        })
    }
}
