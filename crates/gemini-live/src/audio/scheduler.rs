//! Gapless playback scheduling against the output clock.
//!
//! Every chunk is placed at `max(next_start_time, now)` so consecutive units never
//! overlap and a burst of chunks queues up back to back. Interruption stops everything
//! immediately and rewinds `next_start_time`, so the next chunk plays at "now".

use super::{AudioChunk, AudioOutput, PlaybackError};
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, trace};

pub type UnitId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackUnit {
    pub id: UnitId,
    pub chunk: AudioChunk,
    /// Absolute start on the output clock, in seconds.
    pub scheduled_start: f64,
    pub duration: f64,
}

impl PlaybackUnit {
    pub fn end(&self) -> f64 {
        self.scheduled_start + self.duration
    }
}

pub struct PlaybackScheduler {
    output: Box<dyn AudioOutput>,
    next_start_time: f64,
    active: VecDeque<PlaybackUnit>,
    next_id: UnitId,
    opened: bool,
}

impl PlaybackScheduler {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self {
            output,
            next_start_time: 0.0,
            active: VecDeque::new(),
            next_id: 0,
            opened: false,
        }
    }

    /// Opens the output device the first time it is called.
    pub fn ensure_open(&mut self) -> Result<(), PlaybackError> {
        if !self.opened {
            self.output.open()?;
            self.opened = true;
            debug!("Audio output opened.");
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    pub fn now(&self) -> f64 {
        self.output.current_time()
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    /// Schedules a chunk right after the previously scheduled one, or at "now" if
    /// the queue has drained. A failed start leaves the schedule untouched.
    pub fn enqueue(&mut self, chunk: AudioChunk) -> Result<PlaybackUnit, PlaybackError> {
        if !self.opened {
            return Err(PlaybackError::NotOpen);
        }
        if chunk.is_empty() || chunk.sample_rate() == 0 {
            return Err(PlaybackError::InvalidChunk(format!(
                "{} samples at {} Hz",
                chunk.samples().len(),
                chunk.sample_rate()
            )));
        }
        self.reap();

        let now = self.output.current_time();
        let start = self.next_start_time.max(now);
        let unit = PlaybackUnit {
            id: self.next_id,
            duration: chunk.duration(),
            chunk,
            scheduled_start: start,
        };
        self.output.start(&unit)?;

        self.next_id += 1;
        self.next_start_time = unit.end();
        trace!(id = unit.id, start, duration = unit.duration, "Scheduled playback unit");
        self.active.push_back(unit.clone());
        Ok(unit)
    }

    /// Barge-in: cut everything now, no fade.
    pub fn interrupt(&mut self) {
        self.stop_all(0.0);
    }

    /// Stops all active units. With `fade_out > 0` the units already sounding ramp
    /// down and stay in the active set until the fade ends. Units that have not
    /// started yet are always dropped.
    pub fn stop_all(&mut self, fade_out: f64) {
        let now = self.output.current_time();
        let fade_out = fade_out.max(0.0);
        let count = self.active.len();

        let mut fading = VecDeque::new();
        for mut unit in self.active.drain(..) {
            let sounding = unit.scheduled_start <= now && unit.end() > now;
            if fade_out > 0.0 && sounding {
                self.output.stop(unit.id, fade_out);
                unit.duration = unit.duration.min(now + fade_out - unit.scheduled_start);
                fading.push_back(unit);
            } else {
                self.output.stop(unit.id, 0.0);
            }
        }
        self.active = fading;
        self.next_start_time = 0.0;
        debug!(stopped = count, fade_out, "Stopped playback");
    }

    /// Drops units that have finished playing. Returns how many were removed.
    pub fn reap(&mut self) -> usize {
        let now = self.output.current_time();
        let before = self.active.len();
        self.active.retain(|unit| unit.end() > now);
        before - self.active.len()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn active_units(&self) -> impl Iterator<Item = &PlaybackUnit> {
        self.active.iter()
    }

    /// Flushes playback and releases the device. A later `ensure_open` reopens it.
    /// With `fade_out > 0` the device stays open until the last ramp has finished.
    pub async fn close(&mut self, fade_out: f64) {
        self.stop_all(fade_out);
        let now = self.output.current_time();
        let fade_end = self.active.iter().map(PlaybackUnit::end).fold(now, f64::max);
        if fade_end > now {
            trace!(remaining = fade_end - now, "Waiting for fade-out before closing");
            tokio::time::sleep(Duration::from_secs_f64(fade_end - now)).await;
        }
        self.active.clear();
        if self.opened {
            self.output.close();
            self.opened = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Shared {
        now: f64,
        started: Vec<UnitId>,
        stopped: Vec<(UnitId, f64)>,
        fail_next_start: bool,
        closed_at: Option<tokio::time::Instant>,
    }

    #[derive(Clone, Default)]
    struct ManualOutput(Arc<Mutex<Shared>>);

    impl ManualOutput {
        fn set_now(&self, now: f64) {
            self.0.lock().unwrap().now = now;
        }
    }

    impl AudioOutput for ManualOutput {
        fn current_time(&self) -> f64 {
            self.0.lock().unwrap().now
        }

        fn start(&mut self, unit: &PlaybackUnit) -> Result<(), PlaybackError> {
            let mut shared = self.0.lock().unwrap();
            if std::mem::take(&mut shared.fail_next_start) {
                return Err(PlaybackError::Start {
                    id: unit.id,
                    reason: "device busy".into(),
                });
            }
            shared.started.push(unit.id);
            Ok(())
        }

        fn stop(&mut self, id: UnitId, fade_out: f64) {
            self.0.lock().unwrap().stopped.push((id, fade_out));
        }

        fn close(&mut self) {
            self.0.lock().unwrap().closed_at = Some(tokio::time::Instant::now());
        }
    }

    fn half_second() -> AudioChunk {
        AudioChunk::new(vec![0i16; 12_000], 24_000)
    }

    fn scheduler() -> (PlaybackScheduler, ManualOutput) {
        let output = ManualOutput::default();
        let mut scheduler = PlaybackScheduler::new(Box::new(output.clone()));
        scheduler.ensure_open().unwrap();
        (scheduler, output)
    }

    #[test]
    fn test_back_to_back_scheduling() {
        let (mut scheduler, output) = scheduler();

        let first = scheduler.enqueue(half_second()).unwrap();
        assert_abs_diff_eq!(first.scheduled_start, 0.0);
        assert_abs_diff_eq!(scheduler.next_start_time(), 0.5);

        output.set_now(0.1);
        let second = scheduler.enqueue(half_second()).unwrap();
        assert_abs_diff_eq!(second.scheduled_start, 0.5);
        assert_abs_diff_eq!(scheduler.next_start_time(), 1.0);
    }

    #[test]
    fn test_never_schedules_in_the_past() {
        let (mut scheduler, output) = scheduler();
        scheduler.enqueue(half_second()).unwrap();

        output.set_now(2.0);
        let late = scheduler.enqueue(half_second()).unwrap();
        assert_abs_diff_eq!(late.scheduled_start, 2.0);
    }

    #[test]
    fn test_units_never_overlap_under_bursts() {
        let (mut scheduler, output) = scheduler();
        let mut units = Vec::new();
        for (i, samples) in [2400usize, 4800, 240, 12_000, 960].iter().enumerate() {
            output.set_now(i as f64 * 0.05);
            units.push(
                scheduler
                    .enqueue(AudioChunk::new(vec![1i16; *samples], 24_000))
                    .unwrap(),
            );
        }
        for pair in units.windows(2) {
            assert!(pair[1].scheduled_start >= pair[0].end() - 1e-12);
        }
    }

    #[test]
    fn test_interrupt_empties_active_set_and_rewinds() {
        let (mut scheduler, output) = scheduler();
        scheduler.enqueue(half_second()).unwrap();
        scheduler.enqueue(half_second()).unwrap();
        assert_eq!(scheduler.active_len(), 2);

        output.set_now(0.2);
        scheduler.interrupt();
        assert_eq!(scheduler.active_len(), 0);
        assert_abs_diff_eq!(scheduler.next_start_time(), 0.0);
        assert_eq!(output.0.lock().unwrap().stopped, vec![(0, 0.0), (1, 0.0)]);

        output.set_now(0.3);
        let next = scheduler.enqueue(half_second()).unwrap();
        assert_abs_diff_eq!(next.scheduled_start, 0.3);
    }

    #[test]
    fn test_fade_keeps_sounding_unit_until_fade_ends() {
        let (mut scheduler, output) = scheduler();
        scheduler.enqueue(half_second()).unwrap();
        scheduler.enqueue(half_second()).unwrap();

        output.set_now(0.2);
        scheduler.stop_all(0.1);
        assert_eq!(scheduler.active_len(), 1);
        let fading = scheduler.active_units().next().unwrap();
        assert_abs_diff_eq!(fading.end(), 0.3, epsilon = 1e-9);
        assert_eq!(output.0.lock().unwrap().stopped, vec![(0, 0.1), (1, 0.0)]);

        output.set_now(0.31);
        assert_eq!(scheduler.reap(), 1);
        assert_eq!(scheduler.active_len(), 0);
    }

    #[test]
    fn test_finished_units_are_reaped() {
        let (mut scheduler, output) = scheduler();
        scheduler.enqueue(half_second()).unwrap();
        scheduler.enqueue(half_second()).unwrap();

        output.set_now(0.6);
        assert_eq!(scheduler.reap(), 1);
        output.set_now(1.0);
        assert_eq!(scheduler.reap(), 1);
        assert_eq!(scheduler.active_len(), 0);
    }

    #[test]
    fn test_failed_start_drops_chunk_only() {
        let (mut scheduler, output) = scheduler();
        output.0.lock().unwrap().fail_next_start = true;
        assert!(scheduler.enqueue(half_second()).is_err());
        assert_eq!(scheduler.active_len(), 0);
        assert_abs_diff_eq!(scheduler.next_start_time(), 0.0);

        let unit = scheduler.enqueue(half_second()).unwrap();
        assert_abs_diff_eq!(unit.scheduled_start, 0.0);
    }

    #[test]
    fn test_rejects_empty_and_unopened() {
        let mut unopened = PlaybackScheduler::new(Box::new(ManualOutput::default()));
        assert!(matches!(
            unopened.enqueue(half_second()),
            Err(PlaybackError::NotOpen)
        ));

        let (mut scheduler, _) = scheduler();
        assert!(matches!(
            scheduler.enqueue(AudioChunk::new(Vec::<i16>::new(), 24_000)),
            Err(PlaybackError::InvalidChunk(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_waits_for_fade_to_finish() {
        let (mut scheduler, output) = scheduler();
        scheduler.enqueue(half_second()).unwrap();
        output.set_now(0.1);

        let begun = tokio::time::Instant::now();
        scheduler.close(0.2).await;

        let closed_at = output.0.lock().unwrap().closed_at.unwrap();
        assert!(closed_at - begun >= Duration::from_millis(199));
        assert_eq!(scheduler.active_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_without_fade_is_immediate() {
        let (mut scheduler, output) = scheduler();
        scheduler.enqueue(half_second()).unwrap();
        output.set_now(0.1);

        let begun = tokio::time::Instant::now();
        scheduler.close(0.0).await;

        let closed_at = output.0.lock().unwrap().closed_at.unwrap();
        assert_eq!(closed_at, begun);
        assert_eq!(scheduler.active_len(), 0);
    }
}
