//! Audio chunks, PCM conversions, the output abstraction, and the playback scheduler.

mod chunk;
mod output;
pub mod pcm;
mod scheduler;

pub use chunk::AudioChunk;
pub use output::{AudioOutput, MonotonicClock, NullOutput, PlaybackError};
pub use scheduler::{PlaybackScheduler, PlaybackUnit, UnitId};
