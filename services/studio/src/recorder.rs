//! An audio output that renders the scheduled timeline into a WAV file instead of a
//! sound card. Start times, gaps, interruption cut-offs and fades all end up in the file
//! exactly where a speaker would have played them.

use gemini_live::{
    AudioOutput, PlaybackUnit,
    audio::{MonotonicClock, PlaybackError, UnitId},
};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, error, info};

struct Placed {
    start: u64,
    samples: Arc<[i16]>,
    /// Sample index where the unit is cut, and the fade length leading up to silence.
    cut: Option<(u64, u64)>,
}

impl Placed {
    fn gain_at(&self, position: u64) -> f32 {
        match self.cut {
            None => 1.0,
            Some((cut_at, _)) if position < cut_at => 1.0,
            Some((_, 0)) => 0.0,
            Some((cut_at, fade)) => {
                let into_fade = position - cut_at;
                if into_fade >= fade {
                    0.0
                } else {
                    1.0 - into_fade as f32 / fade as f32
                }
            }
        }
    }
}

pub struct WavRecorder {
    path: PathBuf,
    sample_rate: u32,
    clock: MonotonicClock,
    units: BTreeMap<UnitId, Placed>,
    opened: bool,
}

impl WavRecorder {
    pub fn new(path: impl AsRef<Path>, sample_rate: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            sample_rate,
            clock: MonotonicClock::new(),
            units: BTreeMap::new(),
            opened: false,
        }
    }

    fn to_samples(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate as f64).round() as u64
    }

    /// Mixes every unit into one mono timeline starting at clock zero.
    pub fn render(&self) -> Vec<i16> {
        let len = self
            .units
            .values()
            .map(|u| u.start + u.samples.len() as u64)
            .max()
            .unwrap_or(0);
        let mut mix = vec![0_i32; len as usize];
        for unit in self.units.values() {
            for (offset, &sample) in unit.samples.iter().enumerate() {
                let position = unit.start + offset as u64;
                let gain = unit.gain_at(position);
                if gain == 0.0 {
                    if unit.cut.is_some_and(|(cut_at, _)| position >= cut_at) {
                        break;
                    }
                    continue;
                }
                mix[position as usize] += (sample as f32 * gain).round() as i32;
            }
        }
        mix.into_iter()
            .map(|s| s.clamp(i16::MIN as i32, i16::MAX as i32) as i16)
            .collect()
    }

    /// Writes the rendered timeline to disk.
    pub fn flush(&self) -> Result<usize, hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let samples = self.render();
        let mut writer = hound::WavWriter::create(&self.path, spec)?;
        for &sample in &samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(samples.len())
    }
}

impl AudioOutput for WavRecorder {
    fn open(&mut self) -> Result<(), PlaybackError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(PlaybackError::Open(format!(
                    "directory {} does not exist",
                    parent.display()
                )));
            }
        }
        self.opened = true;
        info!(path = %self.path.display(), rate = self.sample_rate, "Recording playback");
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.clock.now()
    }

    fn start(&mut self, unit: &PlaybackUnit) -> Result<(), PlaybackError> {
        if unit.chunk.sample_rate() != self.sample_rate {
            return Err(PlaybackError::Start {
                id: unit.id,
                reason: format!(
                    "chunk rate {} does not match recorder rate {}",
                    unit.chunk.sample_rate(),
                    self.sample_rate
                ),
            });
        }
        let start = self.to_samples(unit.scheduled_start);
        debug!(id = unit.id, start, "Placing unit");
        self.units.insert(
            unit.id,
            Placed {
                start,
                samples: Arc::from(unit.chunk.samples()),
                cut: None,
            },
        );
        Ok(())
    }

    fn stop(&mut self, id: UnitId, fade_out: f64) {
        let cut_at = self.to_samples(self.clock.now());
        let fade = self.to_samples(fade_out);
        if let Some(unit) = self.units.get_mut(&id) {
            if cut_at <= unit.start && fade == 0 {
                self.units.remove(&id);
                return;
            }
            unit.cut = Some((cut_at, fade));
        }
    }

    fn close(&mut self) {
        if !self.opened {
            return;
        }
        self.opened = false;
        match self.flush() {
            Ok(samples) => info!(path = %self.path.display(), samples, "Recording written"),
            Err(e) => error!(path = %self.path.display(), error = %e, "Failed to write recording"),
        }
    }
}
