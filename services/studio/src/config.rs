use gemini_live::{
    Credentials, ReconnectPolicy, SessionConfig, config::DEFAULT_RESUME_PROMPT,
    model::DEFAULT_LIVE_MODEL,
};
use secrecy::SecretString;
use std::{str::FromStr, time::Duration};
use studio_core::Mode;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct StudioConfig {
    pub gemini_api_key: Option<SecretString>,
    pub ephemeral_token: Option<SecretString>,
    pub model: String,
    pub voice: String,
    pub mode: Mode,
    pub log_level: Level,
    pub keep_alive_interval: Duration,
    pub reconnect: ReconnectPolicy,
    pub resume_prompt: String,
}

impl StudioConfig {
    /// Loads configuration from environment variables.
    ///
    /// Missing credentials are not an error here; the session reports them when it
    /// tries to connect.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let gemini_api_key = secret_var("GEMINI_API_KEY");
        let ephemeral_token = secret_var("GEMINI_EPHEMERAL_TOKEN");

        let model =
            std::env::var("GEMINI_LIVE_MODEL").unwrap_or_else(|_| DEFAULT_LIVE_MODEL.to_string());
        let voice = std::env::var("GEMINI_VOICE").unwrap_or_else(|_| "Puck".to_string());

        let mode = match std::env::var("STUDIO_MODE") {
            Ok(raw) => Mode::from_str(&raw)
                .map_err(|e| ConfigError::InvalidValue("STUDIO_MODE".to_string(), e.to_string()))?,
            Err(_) => Mode::default(),
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let defaults = SessionConfig::default();
        let keep_alive_interval = parse_var("KEEP_ALIVE_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.keep_alive_interval);

        let mut reconnect = ReconnectPolicy::default();
        if let Some(max_attempts) = parse_var("RECONNECT_MAX_ATTEMPTS")? {
            reconnect.max_attempts = max_attempts;
        }
        if let Some(ms) = parse_var("RECONNECT_INITIAL_DELAY_MS")? {
            reconnect.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var("RECONNECT_MAX_DELAY_MS")? {
            reconnect.max_delay = Duration::from_millis(ms);
        }
        if reconnect.max_delay < reconnect.initial_delay {
            return Err(ConfigError::InvalidValue(
                "RECONNECT_MAX_DELAY_MS".to_string(),
                "must not be shorter than RECONNECT_INITIAL_DELAY_MS".to_string(),
            ));
        }

        let resume_prompt =
            std::env::var("RESUME_PROMPT").unwrap_or_else(|_| DEFAULT_RESUME_PROMPT.to_string());

        Ok(Self {
            gemini_api_key,
            ephemeral_token,
            model,
            voice,
            mode,
            log_level,
            keep_alive_interval,
            reconnect,
            resume_prompt,
        })
    }

    /// The credential handed to the session. An ephemeral token wins over an API key.
    pub fn credentials(&self) -> Option<Credentials> {
        self.ephemeral_token
            .clone()
            .map(Credentials::EphemeralToken)
            .or_else(|| self.gemini_api_key.clone().map(Credentials::ApiKey))
    }

    /// Session settings for the configured mode.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            model: self.model.clone(),
            voice: self.voice.clone(),
            system_instruction: self.mode.system_instruction().to_string(),
            tools: self.mode.tools(),
            resume_prompt: self.resume_prompt.clone(),
            keep_alive_interval: self.keep_alive_interval,
            reconnect: self.reconnect.clone(),
            input_transcription: true,
            ..SessionConfig::default()
        }
    }
}

fn secret_var(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

fn parse_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(None),
    }
}
