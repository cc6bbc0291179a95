//! Raw PCM payloads returned by the speech model

use crate::{Result, TutorError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Sample rate of speech audio returned by the provider
pub const SPEECH_SAMPLE_RATE: u32 = 24000;

/// Divisor mapping signed 16-bit samples onto [-1.0, 1.0]
const PCM16_SCALE: f32 = 32768.0;

/// MIME type the provider declares for raw speech audio
pub const PCM_MIME_TYPE: &str = "audio/L16;codec=pcm;rate=24000";

/// Base64 speech audio exactly as delivered inline by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioPayload {
    /// Base64 of little-endian signed 16-bit mono PCM
    pub data_base64: String,
    pub mime_type: String,
}

impl AudioPayload {
    pub fn new(data_base64: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data_base64: data_base64.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Payload with the default 24 kHz PCM MIME type
    pub fn pcm(data_base64: impl Into<String>) -> Self {
        Self::new(data_base64, PCM_MIME_TYPE)
    }

    /// Encode float samples into a payload
    pub fn from_samples(samples: &[f32]) -> Self {
        Self::pcm(BASE64.encode(encode_pcm16(samples)))
    }

    /// Decode into a normalized waveform
    pub fn decode(&self) -> Result<Vec<f32>> {
        decode_base64_pcm16(&self.data_base64)
    }

    pub fn is_empty(&self) -> bool {
        self.data_base64.is_empty()
    }
}

/// Decode base64 PCM16LE into samples in [-1.0, 1.0]
pub fn decode_base64_pcm16(data: &str) -> Result<Vec<f32>> {
    let bytes = BASE64
        .decode(data.trim())
        .map_err(|e| TutorError::AudioProcessingError(format!("Invalid base64 audio: {}", e)))?;
    Ok(decode_pcm16(&bytes))
}

/// Decode little-endian signed 16-bit samples. A trailing odd byte is ignored.
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM16_SCALE)
        .collect()
}

/// Inverse of the decode scaling: 32768 steps per unit, clamped to the i16 range
pub fn sample_to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * PCM16_SCALE)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Encode samples as little-endian signed 16-bit PCM
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&sample| sample_to_pcm16(sample).to_le_bytes())
        .collect()
}

/// Duration of `samples` mono samples at `sample_rate`
pub fn duration_secs(samples: usize, sample_rate: u32) -> f32 {
    samples as f32 / sample_rate as f32
}
