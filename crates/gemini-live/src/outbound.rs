//! The send side of a session, shared by the media pacer and tool handlers.
//!
//! Frames go through a bounded channel to the session task, which owns the sink and
//! writes one frame at a time. Every send is dropped unless the session is `Open`.
//! Media is also dropped when the queue is full; tool responses wait for room.

use crate::{audio::AudioChunk, config::AudioUplink, event::SessionState};
use bytes::Bytes;
use gemini_live_types::{ClientMessage, FunctionResponse, ToolResponse};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

pub(crate) const OUTBOUND_CAPACITY: usize = 64;

#[derive(Debug)]
pub(crate) enum Outbound {
    Message(ClientMessage),
    Audio(Bytes),
}

#[derive(Clone)]
pub struct OutboundHandle {
    state: watch::Receiver<SessionState>,
    tx: mpsc::Sender<Outbound>,
    uplink: AudioUplink,
    input_mime_type: String,
}

impl OutboundHandle {
    pub(crate) fn new(
        state: watch::Receiver<SessionState>,
        tx: mpsc::Sender<Outbound>,
        uplink: AudioUplink,
        input_mime_type: String,
    ) -> Self {
        Self {
            state,
            tx,
            uplink,
            input_mime_type,
        }
    }

    pub fn is_open(&self) -> bool {
        *self.state.borrow() == SessionState::Open
    }

    /// Forwards one captured audio chunk. Returns whether it was handed to the transport.
    pub fn send_audio_chunk(&self, chunk: &AudioChunk) -> bool {
        let frame = match self.uplink {
            AudioUplink::Inline => Outbound::Message(ClientMessage::media(
                self.input_mime_type.clone(),
                chunk.to_base64(),
            )),
            AudioUplink::Binary => Outbound::Audio(Bytes::from(chunk.to_le_bytes())),
        };
        self.push(frame, "audio")
    }

    /// Forwards one base64-encoded video frame.
    pub fn send_video_frame(&self, data: String, mime_type: &str) -> bool {
        self.push(
            Outbound::Message(ClientMessage::media(mime_type, data)),
            "video",
        )
    }

    /// Sends any client message as-is, subject to the same open-session check.
    pub fn send_outbound(&self, message: ClientMessage) -> bool {
        self.push(Outbound::Message(message), "message")
    }

    /// Queues a tool response. Unlike media, a response waits for room in the queue
    /// rather than being dropped while the session is open.
    pub async fn send_tool_response(&self, response: FunctionResponse) -> bool {
        if !self.is_open() {
            trace!(kind = "tool_response", "Session not open, dropping outbound frame");
            return false;
        }
        let frame = Outbound::Message(ClientMessage::ToolResponse(ToolResponse {
            function_responses: vec![response],
        }));
        match self.tx.send(frame).await {
            Ok(()) => true,
            Err(_) => {
                debug!("Session task gone, tool response not sent");
                false
            }
        }
    }

    fn push(&self, frame: Outbound, kind: &'static str) -> bool {
        if !self.is_open() {
            trace!(kind, "Session not open, dropping outbound frame");
            return false;
        }
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(e) => {
                debug!(kind, error = %e, "Outbound frame dropped");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(
        state: SessionState,
        uplink: AudioUplink,
    ) -> (
        OutboundHandle,
        watch::Sender<SessionState>,
        mpsc::Receiver<Outbound>,
    ) {
        let (state_tx, state_rx) = watch::channel(state);
        let (tx, rx) = mpsc::channel(4);
        let handle = OutboundHandle::new(state_rx, tx, uplink, "audio/pcm;rate=16000".into());
        (handle, state_tx, rx)
    }

    #[test]
    fn test_sends_are_dropped_unless_open() {
        let (handle, state_tx, mut rx) = handle(SessionState::Connecting, AudioUplink::Inline);
        let chunk = AudioChunk::new(vec![1i16, 2], 16_000);
        assert!(!handle.send_audio_chunk(&chunk));
        assert!(!handle.send_video_frame("abc".into(), "image/jpeg"));
        assert!(rx.try_recv().is_err());

        state_tx.send(SessionState::Open).unwrap();
        assert!(handle.send_video_frame("abc".into(), "image/jpeg"));
        assert!(matches!(
            rx.try_recv().unwrap(),
            Outbound::Message(ClientMessage::RealtimeInput(_))
        ));
    }

    #[test]
    fn test_audio_uplink_framing() {
        let chunk = AudioChunk::new(vec![256i16], 16_000);

        let (inline, _state, mut rx) = handle(SessionState::Open, AudioUplink::Inline);
        assert!(inline.send_audio_chunk(&chunk));
        match rx.try_recv().unwrap() {
            Outbound::Message(ClientMessage::RealtimeInput(input)) => {
                assert_eq!(input.media.mime_type, "audio/pcm;rate=16000");
                assert_eq!(input.media.data, chunk.to_base64());
            }
            other => panic!("unexpected {:?}", other),
        }

        let (binary, _state, mut rx) = handle(SessionState::Open, AudioUplink::Binary);
        assert!(binary.send_audio_chunk(&chunk));
        match rx.try_recv().unwrap() {
            Outbound::Audio(bytes) => assert_eq!(&bytes[..], &[0x00, 0x01]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tool_response_waits_for_a_full_queue() {
        let (handle, _state, mut rx) = handle(SessionState::Open, AudioUplink::Inline);
        for _ in 0..4 {
            assert!(handle.send_video_frame("f".into(), "image/jpeg"));
        }

        let responder = handle.clone();
        let pending = tokio::spawn(async move {
            responder
                .send_tool_response(FunctionResponse {
                    id: "call-1".into(),
                    name: "add_node".into(),
                    response: serde_json::json!({ "ok": true }),
                })
                .await
        });

        for _ in 0..4 {
            assert!(matches!(
                rx.recv().await.unwrap(),
                Outbound::Message(ClientMessage::RealtimeInput(_))
            ));
        }
        assert!(pending.await.unwrap());
        match rx.recv().await.unwrap() {
            Outbound::Message(ClientMessage::ToolResponse(response)) => {
                assert_eq!(response.function_responses[0].id, "call-1");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tool_response_dropped_when_closed() {
        let (handle, _state, mut rx) = handle(SessionState::Closed, AudioUplink::Inline);
        let sent = handle
            .send_tool_response(FunctionResponse {
                id: "call-1".into(),
                name: "add_node".into(),
                response: serde_json::json!({}),
            })
            .await;
        assert!(!sent);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_channel_drops_instead_of_blocking() {
        let (handle, _state, _rx) = handle(SessionState::Open, AudioUplink::Inline);
        for _ in 0..4 {
            assert!(handle.send_video_frame("f".into(), "image/jpeg"));
        }
        assert!(!handle.send_video_frame("f".into(), "image/jpeg"));
    }
}
