//! PCM conversions for the live audio wire format
//!
//! Both directions use 16-bit signed little-endian mono PCM, base64 encoded.
//! Outbound audio is 16kHz, inbound audio is 24kHz.

use base64::Engine;
use thiserror::Error;

/// Sample rate of audio sent to the model
pub const INPUT_SAMPLE_RATE: u32 = 16000;

/// Sample rate of audio produced by the model
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PcmError {
    #[error("invalid base64 audio payload: {0}")]
    Base64(String),

    #[error("PCM16 payload has odd byte length {0}")]
    OddLength(usize),
}

/// MIME type announced for raw PCM at the given rate
pub fn mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={}", sample_rate)
}

/// Scale floating point samples into the signed 16-bit range
pub fn float_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

pub fn pcm16_to_float(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Encode a captured block as base64 PCM16 LE
pub fn encode_frame(samples: &[f32]) -> String {
    let pcm_bytes: Vec<u8> = float_to_pcm16(samples)
        .iter()
        .flat_map(|s| s.to_le_bytes())
        .collect();

    base64::engine::general_purpose::STANDARD.encode(pcm_bytes)
}

/// Decode a base64 PCM16 LE mono payload into playable samples
pub fn decode_frame(data: &str) -> Result<Vec<f32>, PcmError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| PcmError::Base64(e.to_string()))?;

    if bytes.len() % 2 != 0 {
        return Err(PcmError::OddLength(bytes.len()));
    }

    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Ok(pcm16_to_float(&samples))
}

/// Playback duration in seconds
pub fn duration_secs(sample_count: usize, sample_rate: u32) -> f64 {
    sample_count as f64 / sample_rate as f64
}

/// Average interleaved channels into a single mono channel
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler
///
/// A zero rate on either side yields no samples.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / ratio).floor() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(last)];
            let b = samples[(idx + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}
