//! A capture source that replays a WAV file as if it were a live microphone, with
//! camera frames taken from a directory of JPEG stills.

use async_trait::async_trait;
use gemini_live::{AudioChunk, CaptureSource, VideoFrame, audio::pcm};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::{
    fs,
    io::{BufReader, Read},
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Rate the live endpoint expects for microphone audio.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;
/// Samples per uploaded chunk, 64 ms at 16 kHz.
pub const CHUNK_SAMPLES: usize = 1024;
const RESAMPLER_CHUNK: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to read WAV input: {0}")]
    Wav(#[from] hound::Error),
    #[error("Failed to resample input: {0}")]
    Resample(String),
    #[error("Failed to read frames: {0}")]
    Io(#[from] std::io::Error),
    #[error("No JPEG frames found in {0}")]
    NoFrames(PathBuf),
}

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> Result<FastFixedIn<f32>, CaptureError> {
    FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )
    .map_err(|e| CaptureError::Resample(e.to_string()))
}

/// Resamples mono f32 audio in fixed-size blocks, flushing the tail as a partial block.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, CaptureError> {
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }
    let mut resampler = create_resampler(from_rate as f64, to_rate as f64, RESAMPLER_CHUNK)?;
    let mut out = Vec::with_capacity(samples.len() * to_rate as usize / from_rate as usize + 1);
    let mut blocks = samples.chunks_exact(RESAMPLER_CHUNK);
    for block in &mut blocks {
        let processed = resampler
            .process(&[block][..], None)
            .map_err(|e| CaptureError::Resample(e.to_string()))?;
        out.extend_from_slice(&processed[0]);
    }
    let tail = blocks.remainder();
    if !tail.is_empty() {
        let tail_in: [&[f32]; 1] = [tail];
        let processed = resampler
            .process_partial(Some(&tail_in[..]), None)
            .map_err(|e| CaptureError::Resample(e.to_string()))?;
        out.extend_from_slice(&processed[0]);
    }
    Ok(out)
}

pub struct WavCapture {
    samples: Vec<i16>,
    position: usize,
    pace: Option<Interval>,
    frames: Vec<PathBuf>,
    next_frame: usize,
}

impl WavCapture {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let file = fs::File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Decodes any WAV stream to 16 kHz mono.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CaptureError> {
        let mut wav = hound::WavReader::new(reader)?;
        let spec = wav.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => wav.samples::<f32>().collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                wav.samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
        };

        let channels = usize::from(spec.channels.max(1));
        let mono: Vec<f32> = interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        let resampled = resample(&mono, spec.sample_rate, CAPTURE_SAMPLE_RATE)?;
        info!(
            source_rate = spec.sample_rate,
            channels = spec.channels,
            samples = resampled.len(),
            "Loaded WAV capture"
        );

        Ok(Self {
            samples: pcm::convert_f32_to_i16(&resampled),
            position: 0,
            pace: None,
            frames: Vec::new(),
            next_frame: 0,
        })
    }

    /// Releases chunks no faster than real time.
    pub fn paced(mut self) -> Self {
        let period =
            Duration::from_micros(CHUNK_SAMPLES as u64 * 1_000_000 / CAPTURE_SAMPLE_RATE as u64);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.pace = Some(interval);
        self
    }

    /// Cycles through the JPEG stills in `dir`, in file name order.
    pub fn with_frames(mut self, dir: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let dir = dir.as_ref();
        let mut frames: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
            })
            .collect();
        if frames.is_empty() {
            return Err(CaptureError::NoFrames(dir.to_path_buf()));
        }
        frames.sort();
        info!(count = frames.len(), "Loaded video frames");
        self.frames = frames;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / CAPTURE_SAMPLE_RATE as f64)
    }
}

#[async_trait]
impl CaptureSource for WavCapture {
    async fn next_audio(&mut self) -> Option<AudioChunk> {
        if self.position >= self.samples.len() {
            return None;
        }
        if let Some(pace) = self.pace.as_mut() {
            pace.tick().await;
        }
        let end = (self.position + CHUNK_SAMPLES).min(self.samples.len());
        let chunk = AudioChunk::new(&self.samples[self.position..end], CAPTURE_SAMPLE_RATE);
        self.position = end;
        Some(chunk)
    }

    fn capture_frame(&mut self) -> Option<VideoFrame> {
        if self.frames.is_empty() {
            return None;
        }
        let path = &self.frames[self.next_frame % self.frames.len()];
        self.next_frame = self.next_frame.wrapping_add(1);
        match fs::read(path) {
            Ok(bytes) => {
                debug!(frame = %path.display(), "Captured frame");
                Some(VideoFrame::jpeg(bytes))
            }
            Err(e) => {
                warn!(frame = %path.display(), error = %e, "Failed to read frame");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::time::Instant;

    fn wav_bytes(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                let value = ((i as f32 * 0.05).sin() * 8000.0) as i16;
                for _ in 0..channels {
                    writer.write_sample(value).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[tokio::test]
    async fn test_native_rate_passes_through_in_chunks() {
        let mut capture =
            WavCapture::from_reader(Cursor::new(wav_bytes(16_000, 1, 2500))).unwrap();
        assert_eq!(capture.len(), 2500);

        let mut sizes = Vec::new();
        while let Some(chunk) = capture.next_audio().await {
            assert_eq!(chunk.sample_rate(), CAPTURE_SAMPLE_RATE);
            sizes.push(chunk.samples().len());
        }
        assert_eq!(sizes, vec![1024, 1024, 452]);
    }

    #[test]
    fn test_stereo_48k_is_downmixed_and_resampled() {
        let capture = WavCapture::from_reader(Cursor::new(wav_bytes(48_000, 2, 48_000))).unwrap();
        let expected = 16_000.0;
        let ratio = capture.len() as f64 / expected;
        assert!((0.95..=1.05).contains(&ratio), "got {} samples", capture.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_capture_runs_in_real_time() {
        let mut capture = WavCapture::from_reader(Cursor::new(wav_bytes(16_000, 1, 4096)))
            .unwrap()
            .paced();
        let start = Instant::now();
        let mut count = 0;
        while capture.next_audio().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 4);
        assert_eq!(start.elapsed(), Duration::from_millis(192));
    }

    #[test]
    fn test_frames_cycle_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.jpg"), b"second").unwrap();
        fs::write(dir.path().join("a.jpeg"), b"first").unwrap();
        fs::write(dir.path().join("notes.txt"), b"skip").unwrap();

        let mut capture = WavCapture::from_reader(Cursor::new(wav_bytes(16_000, 1, 10)))
            .unwrap()
            .with_frames(dir.path())
            .unwrap();
        let frames: Vec<_> = (0..3)
            .filter_map(|_| capture.capture_frame())
            .map(|f| f.bytes.to_vec())
            .collect();
        assert_eq!(
            frames,
            vec![b"first".to_vec(), b"second".to_vec(), b"first".to_vec()]
        );
        assert_eq!(capture.capture_frame().unwrap().mime_type, "image/jpeg");
    }

    #[test]
    fn test_empty_frame_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = WavCapture::from_reader(Cursor::new(wav_bytes(16_000, 1, 10)))
            .unwrap()
            .with_frames(dir.path())
            .err()
            .unwrap();
        assert!(matches!(err, CaptureError::NoFrames(_)));
    }
}
