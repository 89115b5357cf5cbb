//! PCM16 sample conversions and base64 framing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Converts a slice of f32 samples to i16, clamping out-of-range values.
pub fn convert_f32_to_i16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

pub fn i16_to_le_bytes(pcm16: &[i16]) -> Vec<u8> {
    pcm16.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Interprets little-endian byte pairs as i16 samples. A trailing odd byte is ignored.
pub fn le_bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

pub fn encode_i16(pcm16: &[i16]) -> String {
    STANDARD.encode(i16_to_le_bytes(pcm16))
}

pub fn decode_i16(base64_fragment: &str) -> Result<Vec<i16>, base64::DecodeError> {
    STANDARD
        .decode(base64_fragment)
        .map(|bytes| le_bytes_to_i16(&bytes))
}

/// Reads the `rate=` parameter of a MIME type such as `audio/pcm;rate=24000`.
pub fn parse_sample_rate(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("rate"))
        .and_then(|(_, value)| value.trim().parse().ok())
}
