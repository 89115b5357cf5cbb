//! Known live models, display names, and an availability probe.

use crate::error::ModelErrorKind;
use tracing::{info, warn};

pub const DEFAULT_LIVE_MODEL: &str = "models/gemini-2.5-flash-native-audio-latest";

const MODELS_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// (model id, display name)
const KNOWN_MODELS: &[(&str, &str)] = &[
    (
        "gemini-2.5-flash-native-audio-latest",
        "Gemini 2.5 Flash Native Audio",
    ),
    (
        "gemini-2.5-flash-native-audio-preview-12-2025",
        "Gemini 2.5 Flash Native Audio",
    ),
    ("gemini-2.0-flash-live-001", "Gemini 2.0 Flash Live"),
    ("gemini-2.5-flash", "Gemini 2.5 Flash"),
    ("gemini-2.5-flash-lite", "Gemini 2.5 Flash Lite"),
];

/// Resolves a human-readable name, falling back to the raw id.
pub fn display_name(model_id: &str) -> String {
    let stripped = model_id.strip_prefix("models/").unwrap_or(model_id);
    KNOWN_MODELS
        .iter()
        .find(|(id, _)| *id == stripped)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| model_id.to_string())
}

/// Pulls a model id out of a raw service error message, if one is present.
pub fn extract_model_id(message: &str) -> Option<String> {
    if let Some(start) = message.find("models/") {
        let id: String = message[start + "models/".len()..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
            .collect();
        if !id.is_empty() {
            return Some(id);
        }
    }
    KNOWN_MODELS
        .iter()
        .find(|(id, _)| message.contains(id))
        .map(|(id, _)| (*id).to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable(ModelErrorKind),
}

/// Probes the model resource before a session is opened.
///
/// A rate-limited response still means the model exists, so 429 counts as
/// available. Network failures are treated optimistically so that a flaky
/// probe never blocks a connection attempt.
pub async fn check_model_availability(
    client: &reqwest::Client,
    model: &str,
    api_key: &str,
) -> Availability {
    if !api_key.starts_with("AIza") {
        warn!("API key is missing or malformed; model reported unavailable");
        return Availability::Unavailable(ModelErrorKind::Billing);
    }
    let model_path = if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    };
    let url = format!("{}/{}", MODELS_BASE_URL, model_path);

    match client.get(&url).query(&[("key", api_key)]).send().await {
        Ok(response) => {
            let status = response.status();
            let availability = if status.is_success() || status.as_u16() == 429 {
                Availability::Available
            } else if status.as_u16() == 403 {
                Availability::Unavailable(ModelErrorKind::Billing)
            } else {
                let body = response.text().await.unwrap_or_default();
                Availability::Unavailable(ModelErrorKind::classify(&format!(
                    "{} {}",
                    status.as_u16(),
                    body
                )))
            };
            info!(model = %model_path, status = status.as_u16(), ?availability, "Model availability probed");
            availability
        }
        Err(e) => {
            warn!(error = %e, "Model availability probe failed; assuming available");
            Availability::Available
        }
    }
}
