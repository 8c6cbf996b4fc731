use playtalk_core::{SessionConfig, SetupOptions, config::DEFAULT_BASE_URL};
use secrecy::{ExposeSecret, SecretString};
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub agent_id: String,
    pub api_key: SecretString,
    pub base_url: String,
    pub setup: SetupOptions,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let agent_id = required_var("PLAY_AI_AGENT_ID")?;
        let api_key = SecretString::from(required_var("PLAY_AI_API_KEY")?);

        let base_url =
            std::env::var("PLAY_AI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let setup = SetupOptions {
            output_format: std::env::var("PLAY_AI_OUTPUT_FORMAT").ok(),
            output_sample_rate: optional_rate("PLAY_AI_OUTPUT_SAMPLE_RATE")?,
            input_encoding: std::env::var("PLAY_AI_INPUT_ENCODING").ok(),
            input_sample_rate: optional_rate("PLAY_AI_INPUT_SAMPLE_RATE")?,
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            agent_id,
            api_key,
            base_url,
            setup,
            log_level,
        })
    }

    /// The controller's view of this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.agent_id.clone(), self.api_key.expose_secret())
            .with_base_url(self.base_url.clone())
            .with_setup(self.setup.clone())
    }
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}

fn optional_rate(name: &str) -> Result<Option<u32>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(None),
    }
}
