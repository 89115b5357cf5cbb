//! Encoding of outbound envelopes and classification of inbound frames.

use crate::{client::ClientMessage, server::ServerMessage};
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
}

/// What an inbound frame turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Message(Box<ServerMessage>),
    /// Little-endian PCM16 at the session's output sample rate.
    RawAudio(Bytes),
}

pub fn encode(msg: &ClientMessage) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(CodecError::Encode)
}

pub fn decode_text(text: &str) -> Result<ServerMessage, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Decode)
}

/// The service delivers JSON envelopes inside binary frames as well as over text
/// frames. Anything that is not a JSON object is treated as raw audio.
pub fn decode_binary(payload: Bytes) -> Inbound {
    let looks_like_json = payload
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{');
    if looks_like_json {
        if let Ok(msg) = serde_json::from_slice::<ServerMessage>(&payload) {
            return Inbound::Message(Box::new(msg));
        }
    }
    Inbound::RawAudio(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_json_is_decoded_as_message() {
        let payload = Bytes::from_static(br#"  {"setupComplete": {}}"#);
        match decode_binary(payload) {
            Inbound::Message(msg) => assert!(msg.setup_complete.is_some()),
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn test_binary_pcm_is_raw_audio() {
        let payload = Bytes::from_static(&[0x00, 0x40, 0xff, 0x7f]);
        assert_eq!(decode_binary(payload.clone()), Inbound::RawAudio(payload));
    }

    #[test]
    fn test_decode_text_rejects_garbage() {
        assert!(matches!(decode_text("not json"), Err(CodecError::Decode(_))));
    }
}
