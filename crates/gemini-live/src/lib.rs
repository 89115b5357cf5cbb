//! A client for the Gemini Live bidirectional streaming API.
//!
//! A [`LiveSession`] keeps one WebSocket open to the service, schedules the audio it
//! streams back for gapless playback, routes tool calls to registered handlers and
//! recovers from dropped connections with bounded backoff. Everything the host needs
//! to react to arrives on a single [`LiveEvent`] stream.

pub mod audio;
pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod outbound;
pub mod pacer;
pub mod reconnect;
pub mod router;
pub mod session;
pub mod transcript;
pub mod transport;

pub use audio::{AudioChunk, AudioOutput, PlaybackScheduler, PlaybackUnit};
pub use config::{AudioUplink, AuthProvider, Credentials, SessionConfig, StaticAuth};
pub use error::{ErrorKind, LiveError, ModelErrorKind};
pub use event::{LiveEvent, SessionState, TranscriptSource};
pub use outbound::OutboundHandle;
pub use pacer::{CaptureSource, ChannelCapture, MediaPacer, VideoCadence, VideoFrame};
pub use reconnect::ReconnectPolicy;
pub use router::{Reply, ToolCall, ToolError, ToolHandler, ToolRouter, filter_valid};
pub use session::{LiveSession, SessionBuilder};
pub use transport::{Connector, Transport, TransportError, WebSocketConnector};

pub use gemini_live_types as types;
