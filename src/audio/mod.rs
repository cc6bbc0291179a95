pub mod pcm;
pub mod playback;
#[cfg(feature = "audio-io")]
pub mod output;
pub mod resampler;
pub mod wav;

pub use pcm::{decode_base64_pcm16, encode_pcm16, AudioPayload, SPEECH_SAMPLE_RATE};
pub use playback::{
    disabled_context_factory, ActiveClip, AudioContext, ClipEnd, ContextFactory, ContextState,
    PcmClip, PlaybackEngine, PlaybackHandle, PlaybackOutcome,
};
#[cfg(feature = "audio-io")]
pub use output::CpalContext;
pub use resampler::resample_mono;
pub use wav::write_wav;

use std::sync::Arc;

/// Factory opening the default output device on first playback
#[cfg(feature = "audio-io")]
pub fn default_context_factory() -> ContextFactory {
    Box::new(|| {
        let context: Arc<dyn AudioContext> = Arc::new(CpalContext::open()?);
        Ok(context)
    })
}

/// Factory for builds without the `audio-io` feature
#[cfg(not(feature = "audio-io"))]
pub fn default_context_factory() -> ContextFactory {
    disabled_context_factory()
}

/// Playback engine on the default output device, opened lazily
pub fn default_playback_engine() -> Arc<PlaybackEngine> {
    Arc::new(PlaybackEngine::new(default_context_factory()))
}
