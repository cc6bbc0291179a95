//! Single-flight playback of synthesized speech
//!
//! At most one clip is audible at a time. Starting a clip first stops and
//! releases the previous one while holding the same lock, so two clips can
//! never overlap. Each `play` hands back a [`PlaybackHandle`] that resolves to
//! `Completed` when the clip drains naturally or `Cancelled` when it is stopped
//! or replaced.

use crate::audio::pcm::{duration_secs, AudioPayload, SPEECH_SAMPLE_RATE};
use crate::{Result, TutorError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Power state of an output context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
}

/// Decoded mono clip
#[derive(Debug, Clone, PartialEq)]
pub struct PcmClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PcmClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f32 {
        duration_secs(self.samples.len(), self.sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Completion notifier handed to the output context.
///
/// The context calls [`ClipEnd::finish`] when the clip drains. Once the engine
/// has cancelled the clip, `finish` is a no-op.
#[derive(Debug, Clone)]
pub struct ClipEnd {
    tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl ClipEnd {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Signal natural completion
    pub fn finish(&self) {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(());
        }
    }

    /// Whether neither completion nor cancellation has happened yet
    pub fn is_pending(&self) -> bool {
        self.tx.lock().is_some()
    }

    fn cancel(&self) {
        self.tx.lock().take();
    }
}

/// A clip currently owned by the output context
pub trait ActiveClip: Send {
    /// Stop output. Stopping a clip that already ended may fail; callers ignore it.
    fn stop(&mut self) -> Result<()>;
}

/// Audio output boundary
pub trait AudioContext: Send + Sync {
    fn state(&self) -> ContextState;

    fn resume(&self) -> Result<()>;

    /// Begin playing `clip`, calling `end.finish()` once it has fully played
    fn start(&self, clip: PcmClip, end: ClipEnd) -> Result<Box<dyn ActiveClip>>;
}

/// Creates the shared output context on first use
pub type ContextFactory = Box<dyn Fn() -> Result<Arc<dyn AudioContext>> + Send + Sync>;

/// How a playback ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Cancelled,
}

/// Completion signal for one `play` call
#[derive(Debug)]
pub struct PlaybackHandle {
    id: u64,
    done: oneshot::Receiver<()>,
}

impl PlaybackHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait until the clip finishes or is cancelled
    pub async fn finished(self) -> PlaybackOutcome {
        match self.done.await {
            Ok(()) => PlaybackOutcome::Completed,
            Err(_) => PlaybackOutcome::Cancelled,
        }
    }
}

struct CurrentPlayback {
    id: u64,
    clip: Box<dyn ActiveClip>,
    end: ClipEnd,
}

impl CurrentPlayback {
    fn release(mut self) {
        if let Err(e) = self.clip.stop() {
            debug!("Ignoring stop error for clip {}: {}", self.id, e);
        }
        self.end.cancel();
    }
}

/// Playback engine with one shared, lazily created output context
pub struct PlaybackEngine {
    factory: ContextFactory,
    context: Mutex<Option<Arc<dyn AudioContext>>>,
    current: Mutex<Option<CurrentPlayback>>,
    next_id: AtomicU64,
    sample_rate: u32,
}

impl PlaybackEngine {
    /// Create an engine; the context factory runs on the first `play`
    pub fn new(factory: ContextFactory) -> Self {
        Self::with_sample_rate(factory, SPEECH_SAMPLE_RATE)
    }

    pub fn with_sample_rate(factory: ContextFactory, sample_rate: u32) -> Self {
        Self {
            factory,
            context: Mutex::new(None),
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
            sample_rate,
        }
    }

    /// Create an engine around an existing context
    pub fn with_context(context: Arc<dyn AudioContext>) -> Self {
        Self::new(Box::new(move || Ok(Arc::clone(&context))))
    }

    /// Sample rate assumed for decoded payloads
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Decode and play a speech payload, replacing whatever is playing
    pub fn play(&self, payload: &AudioPayload) -> Result<PlaybackHandle> {
        let samples = payload.decode()?;
        self.play_clip(PcmClip::new(samples, self.sample_rate))
    }

    /// Play an already decoded clip, replacing whatever is playing
    pub fn play_clip(&self, clip: PcmClip) -> Result<PlaybackHandle> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut current = self.current.lock();

        if let Some(previous) = current.take() {
            debug!("Stopping clip {} before clip {}", previous.id, id);
            previous.release();
        }

        let (end, done) = ClipEnd::channel();

        if clip.is_empty() {
            end.finish();
            return Ok(PlaybackHandle { id, done });
        }

        let context = self.context()?;
        if context.state() == ContextState::Suspended {
            debug!("Resuming suspended audio context");
            context.resume()?;
        }

        let duration = clip.duration_secs();
        let active = context.start(clip, end.clone())?;
        info!("Playing clip {} ({:.2}s)", id, duration);

        *current = Some(CurrentPlayback {
            id,
            clip: active,
            end,
        });

        Ok(PlaybackHandle { id, done })
    }

    /// Stop the current clip. Returns whether something was playing.
    pub fn stop(&self) -> bool {
        match self.current.lock().take() {
            Some(previous) => {
                let was_pending = previous.end.is_pending();
                info!("Stopping clip {}", previous.id);
                previous.release();
                was_pending
            }
            None => false,
        }
    }

    /// Whether a clip is still audible
    pub fn is_playing(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|current| current.end.is_pending())
    }

    /// Identifier of the clip started last, if it is still audible
    pub fn current_id(&self) -> Option<u64> {
        self.current
            .lock()
            .as_ref()
            .filter(|current| current.end.is_pending())
            .map(|current| current.id)
    }

    fn context(&self) -> Result<Arc<dyn AudioContext>> {
        let mut context = self.context.lock();
        if let Some(existing) = context.as_ref() {
            return Ok(Arc::clone(existing));
        }

        let created = (self.factory)()?;
        info!("Audio output context created");
        *context = Some(Arc::clone(&created));
        Ok(created)
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Factory for builds without an output device
pub fn disabled_context_factory() -> ContextFactory {
    Box::new(|| {
        Err(TutorError::AudioDeviceError(
            "audio output is not available in this build".into(),
        ))
    })
}
