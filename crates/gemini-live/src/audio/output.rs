use super::scheduler::{PlaybackUnit, UnitId};
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("Audio output is not open")]
    NotOpen,
    #[error("Failed to open audio output: {0}")]
    Open(String),
    #[error("Failed to start playback unit {id}: {reason}")]
    Start { id: UnitId, reason: String },
    #[error("Invalid audio chunk: {0}")]
    InvalidChunk(String),
}

/// The sink that actually renders scheduled audio.
///
/// Implementations own the output clock. `start` is called once per unit with an
/// absolute start time on that clock and must not block; rendering happens on the
/// device's own schedule.
pub trait AudioOutput: Send {
    /// Initializes the device. Called once, on the first `connect`.
    fn open(&mut self) -> Result<(), PlaybackError> {
        Ok(())
    }

    /// Current position of the output clock, in seconds.
    fn current_time(&self) -> f64;

    fn start(&mut self, unit: &PlaybackUnit) -> Result<(), PlaybackError>;

    /// Stops a unit. With a non-zero `fade_out` the gain ramps to zero over that many
    /// seconds before the cut.
    fn stop(&mut self, id: UnitId, fade_out: f64);

    /// Releases the device. Called after any disconnect fade-out has finished.
    fn close(&mut self) {}
}

/// A clock that only counts wall time since construction. Useful for sinks without a
/// device clock of their own.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Discards audio while keeping time. For hosts that render from `AudioReady` events.
#[derive(Debug, Default)]
pub struct NullOutput {
    clock: MonotonicClock,
}

impl AudioOutput for NullOutput {
    fn current_time(&self) -> f64 {
        self.clock.now()
    }

    fn start(&mut self, _unit: &PlaybackUnit) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn stop(&mut self, _id: UnitId, _fade_out: f64) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_clock_follows_tokio_time() {
        let clock = MonotonicClock::new();
        assert_abs_diff_eq!(clock.now(), 0.0, epsilon = 1e-6);
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_abs_diff_eq!(clock.now(), 1.5, epsilon = 1e-6);
    }
}
