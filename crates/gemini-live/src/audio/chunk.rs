use super::pcm;
use crate::error::LiveError;
use std::sync::Arc;

/// An immutable block of PCM16 audio. Cloning shares the sample buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    samples: Arc<[i16]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioChunk {
    pub fn new(samples: impl Into<Arc<[i16]>>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels: 1,
        }
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels.max(1);
        self
    }

    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32) -> Self {
        Self::new(pcm::le_bytes_to_i16(bytes), sample_rate)
    }

    /// Decodes an inline `audio/pcm` blob. The rate comes from the MIME type when present.
    pub fn from_base64(data: &str, mime_type: &str, default_rate: u32) -> Result<Self, LiveError> {
        let samples = pcm::decode_i16(data)
            .map_err(|e| LiveError::AudioPlayback(format!("invalid base64 audio: {}", e)))?;
        let rate = pcm::parse_sample_rate(mime_type).unwrap_or(default_rate);
        if rate == 0 {
            return Err(LiveError::AudioPlayback(format!(
                "invalid sample rate in '{}'",
                mime_type
            )));
        }
        Ok(Self::new(samples, rate))
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        let frames = self.samples.len() / self.channels as usize;
        frames as f64 / self.sample_rate as f64
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        pcm::i16_to_le_bytes(&self.samples)
    }

    pub fn to_base64(&self) -> String {
        pcm::encode_i16(&self.samples)
    }
}
