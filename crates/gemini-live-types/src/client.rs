//! Messages sent from the client to the Gemini Live service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single outbound envelope. Serializes externally tagged, e.g. `{"setup": {...}}`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    /// Sent once, immediately after the transport opens.
    Setup(Setup),
    RealtimeInput(RealtimeInput),
    ClientContent(ClientContent),
    ToolResponse(ToolResponse),
}

impl ClientMessage {
    /// A single text turn. Used for the heartbeat and the post-reconnect resume prompt.
    pub fn text_turn(role: &str, text: impl Into<String>, turn_complete: bool) -> Self {
        Self::ClientContent(ClientContent {
            turns: vec![Content {
                role: Some(role.to_string()),
                parts: vec![Part { text: text.into() }],
            }],
            turn_complete,
        })
    }

    /// A base64 media blob (video frame or inline PCM audio).
    pub fn media(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self::RealtimeInput(RealtimeInput {
            media: Blob {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<TranscriptionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<TranscriptionConfig>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<ResponseModality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Text,
    Audio,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

impl SpeechConfig {
    pub fn prebuilt(voice_name: impl Into<String>) -> Self {
        Self {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: voice_name.into(),
                },
            },
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

/// Empty marker object; its presence enables transcription.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct TranscriptionConfig {}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Part {
    pub text: String,
}

/// A group of function declarations advertised in the setup message.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters_json_schema: Option<Value>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RealtimeInput {
    pub media: Blob,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: Value,
}

/// Inline base64 payload with its MIME type. Shared by both directions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setup_serializes_camel_case_envelope() {
        let msg = ClientMessage::Setup(Setup {
            model: "models/gemini-live".to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec![ResponseModality::Audio],
                speech_config: Some(SpeechConfig::prebuilt("Puck")),
            },
            system_instruction: Some(Content::text("be brief")),
            tools: vec![],
            output_audio_transcription: Some(TranscriptionConfig::default()),
            input_audio_transcription: None,
        });

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "setup": {
                    "model": "models/gemini-live",
                    "generationConfig": {
                        "responseModalities": ["AUDIO"],
                        "speechConfig": {
                            "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": "Puck" } }
                        }
                    },
                    "systemInstruction": { "parts": [ { "text": "be brief" } ] },
                    "outputAudioTranscription": {}
                }
            })
        );
    }

    #[test]
    fn test_media_and_text_turn_shapes() {
        let media = serde_json::to_value(ClientMessage::media("image/jpeg", "AAAA")).unwrap();
        assert_eq!(
            media,
            json!({ "realtimeInput": { "media": { "mimeType": "image/jpeg", "data": "AAAA" } } })
        );

        let turn = serde_json::to_value(ClientMessage::text_turn("user", " ", false)).unwrap();
        assert_eq!(
            turn,
            json!({
                "clientContent": {
                    "turns": [ { "role": "user", "parts": [ { "text": " " } ] } ],
                    "turnComplete": false
                }
            })
        );
    }

    #[test]
    fn test_tool_response_shape() {
        let msg = ClientMessage::ToolResponse(ToolResponse {
            function_responses: vec![FunctionResponse {
                id: "call-1".to_string(),
                name: "segment_story".to_string(),
                response: json!({ "output": { "status": "updated" } }),
            }],
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["toolResponse"]["functionResponses"][0]["id"], "call-1");
        assert_eq!(
            value["toolResponse"]["functionResponses"][0]["response"]["output"]["status"],
            "updated"
        );
    }
}
