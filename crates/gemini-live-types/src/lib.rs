//! Wire types for the Gemini Live bidirectional streaming protocol.
//!
//! - `client`: messages the client sends (setup, realtime input, client content, tool responses).
//! - `server`: messages the service sends back (content, interruptions, tool calls, transcripts).
//! - `codec`: JSON text encoding plus classification of inbound binary frames.

pub mod client;
pub mod codec;
pub mod server;

pub use client::*;
pub use codec::{CodecError, Inbound, decode_binary, decode_text, encode};
pub use server::*;
