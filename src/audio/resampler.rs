use crate::{Result, TutorError};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Frames per channel fed to rubato per call
const CHUNK_FRAMES: usize = 1024;

/// Mono resampler used to match speech clips to the output device rate
pub struct MonoResampler {
    resampler: SincFixedIn<f32>,
    input_rate: u32,
    output_rate: u32,
}

impl MonoResampler {
    /// Create a new mono resampler
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(TutorError::ConfigError(
                "Sample rates must be greater than 0".into(),
            ));
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler = SincFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            2.0,
            params,
            CHUNK_FRAMES,
            1,
        )
        .map_err(|e| {
            TutorError::AudioProcessingError(format!("Failed to create resampler: {}", e))
        })?;

        debug!("Created resampler: {} Hz -> {} Hz", input_rate, output_rate);

        Ok(Self {
            resampler,
            input_rate,
            output_rate,
        })
    }

    /// Resample a whole clip
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let ratio = self.output_rate as f64 / self.input_rate as f64;
        let chunk_size = self.resampler.input_frames_max();
        let mut output = Vec::with_capacity((input.len() as f64 * ratio * 1.1) as usize);

        for chunk in input.chunks(chunk_size) {
            // SincFixedIn wants exactly chunk_size frames; the last chunk is zero padded
            let mut planar = vec![vec![0.0f32; chunk_size]];
            planar[0][..chunk.len()].copy_from_slice(chunk);

            let processed = self.resampler.process(&planar, None).map_err(|e| {
                TutorError::AudioProcessingError(format!("Resampling failed: {}", e))
            })?;

            let produced = &processed[0];
            let take = if chunk.len() < chunk_size {
                ((chunk.len() as f64) * ratio).ceil() as usize
            } else {
                produced.len()
            };
            output.extend_from_slice(&produced[..take.min(produced.len())]);
        }

        debug!("Resampled {} frames -> {} frames", input.len(), output.len());
        Ok(output)
    }
}

/// Resample `samples` from `from` Hz to `to` Hz; a no-op when the rates match
pub fn resample_mono(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to {
        return Ok(samples.to_vec());
    }
    MonoResampler::new(from, to)?.process(samples)
}
