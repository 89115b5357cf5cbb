//! What a session reports to its host.

use crate::{audio::AudioChunk, error::ErrorKind, router::ToolCall};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Whose speech a transcript belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    /// The user, as heard by the model.
    Input,
    /// The model's spoken reply.
    Output,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    AudioReady(AudioChunk),
    ToolInvoked(ToolCall),
    TranscriptDelta {
        source: TranscriptSource,
        text: String,
        finalized: bool,
    },
    Interrupted,
    StateChanged(SessionState),
    Error {
        kind: ErrorKind,
        message: String,
    },
}
