use crate::audio::pcm::sample_to_pcm16;
use crate::{Result, TutorError};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;
use tracing::info;

/// Write mono samples (range -1.0 to 1.0) as a 16-bit WAV file, scaled like the PCM payloads
pub fn write_wav<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)
        .map_err(|e| TutorError::IOError(format!("Failed to create WAV writer: {}", e)))?;

    for &sample in samples {
        writer
            .write_sample(sample_to_pcm16(sample))
            .map_err(|e| TutorError::IOError(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| TutorError::IOError(format!("Failed to finalize WAV file: {}", e)))?;

    info!("Wrote {} samples to WAV file: {:?}", samples.len(), path.as_ref());
    Ok(())
}
