//! Session configuration and credentials.

use crate::{model::DEFAULT_LIVE_MODEL, reconnect::ReconnectPolicy};
use gemini_live_types::{
    Content, GenerationConfig, ResponseModality, Setup, SpeechConfig, Tool, TranscriptionConfig,
};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws";
const API_KEY_PATH: &str =
    "google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
const EPHEMERAL_TOKEN_PATH: &str =
    "google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContentConstrained";

pub const DEFAULT_RESUME_PROMPT: &str = "The connection to the server was briefly interrupted. Please resume what you were doing exactly where you left off.";

/// How outbound microphone audio is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioUplink {
    /// Base64 inside a `realtimeInput.media` envelope.
    #[default]
    Inline,
    /// Raw little-endian PCM16 binary frames.
    Binary,
}

/// A credential for opening the transport. Never printed by `Debug`.
#[derive(Debug, Clone)]
pub enum Credentials {
    ApiKey(SecretString),
    /// A short-lived token minted server-side for the constrained endpoint.
    EphemeralToken(SecretString),
}

/// The authorization context consulted on every `connect`.
pub trait AuthProvider: Send + Sync {
    fn credentials(&self) -> Option<Credentials>;
}

/// An auth context fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth(pub Option<Credentials>);

impl AuthProvider for StaticAuth {
    fn credentials(&self) -> Option<Credentials> {
        self.0.clone()
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint: String,
    pub model: String,
    pub voice: String,
    pub system_instruction: String,
    pub tools: Vec<Tool>,
    /// Text injected after a successful reconnect so the model picks up where it left off.
    pub resume_prompt: String,
    pub resume_delay: Duration,
    pub keep_alive_interval: Duration,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout: Duration,
    pub output_sample_rate: u32,
    pub input_sample_rate: u32,
    pub audio_uplink: AudioUplink,
    /// Fade applied to playing audio on `disconnect`. Zero stops immediately.
    pub disconnect_fade_out: Duration,
    pub input_transcription: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_LIVE_MODEL.to_string(),
            voice: "Puck".to_string(),
            system_instruction: String::new(),
            tools: Vec::new(),
            resume_prompt: DEFAULT_RESUME_PROMPT.to_string(),
            resume_delay: Duration::from_millis(500),
            keep_alive_interval: Duration::from_secs(25),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            output_sample_rate: 24_000,
            input_sample_rate: 16_000,
            audio_uplink: AudioUplink::default(),
            disconnect_fade_out: Duration::ZERO,
            input_transcription: false,
        }
    }
}

impl SessionConfig {
    /// Builds the transport URL. The credential travels as a query parameter.
    pub fn url(&self, credentials: &Credentials) -> String {
        let base = self.endpoint.trim_end_matches('/');
        match credentials {
            Credentials::ApiKey(key) => {
                format!("{}/{}?key={}", base, API_KEY_PATH, key.expose_secret())
            }
            Credentials::EphemeralToken(token) => format!(
                "{}/{}?access_token={}",
                base,
                EPHEMERAL_TOKEN_PATH,
                token.expose_secret()
            ),
        }
    }

    /// The URL with its credential masked, for logs.
    pub fn redacted_url(&self, credentials: &Credentials) -> String {
        let url = self.url(credentials);
        match url.split_once('?') {
            Some((path, query)) => {
                let param = query.split('=').next().unwrap_or("key");
                format!("{}?{}=HIDDEN", path, param)
            }
            None => url,
        }
    }

    pub fn input_mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.input_sample_rate)
    }

    pub fn setup(&self) -> Setup {
        let model = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };
        Setup {
            model,
            generation_config: GenerationConfig {
                response_modalities: vec![ResponseModality::Audio],
                speech_config: Some(SpeechConfig::prebuilt(&self.voice)),
            },
            system_instruction: (!self.system_instruction.is_empty())
                .then(|| Content::text(&self.system_instruction)),
            tools: self.tools.clone(),
            output_audio_transcription: Some(TranscriptionConfig::default()),
            input_audio_transcription: self
                .input_transcription
                .then(TranscriptionConfig::default),
        }
    }
}
