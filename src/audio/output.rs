//! Output device context backed by cpal
//!
//! A cpal `Stream` cannot leave the thread that built it, so the stream lives
//! on a dedicated thread and is driven through a command channel. Clips are
//! handed over through shared state that the output callback drains. Once the
//! queue runs dry the callback asks the thread to pause the stream, and the
//! context reports `Suspended` until the next clip resumes it.

use crate::audio::playback::{ActiveClip, AudioContext, ClipEnd, ContextState, PcmClip};
use crate::audio::resampler::resample_mono;
use crate::{Result, TutorError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

enum OutputCommand {
    Resume,
    Suspend,
    Shutdown,
}

/// Samples waiting for the device plus the completion notifier of their clip
#[derive(Default)]
struct SharedPlayback {
    queue: VecDeque<f32>,
    clip_id: u64,
    end: Option<ClipEnd>,
}

/// Shared output context on the default output device
pub struct CpalContext {
    command_tx: Sender<OutputCommand>,
    shared: Arc<Mutex<SharedPlayback>>,
    suspended: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
}

impl CpalContext {
    /// Open the default output device and start its stream thread
    pub fn open() -> Result<Self> {
        let (command_tx, command_rx) = bounded(16);
        let (ready_tx, ready_rx) = bounded(1);
        let shared = Arc::new(Mutex::new(SharedPlayback::default()));
        let suspended = Arc::new(AtomicBool::new(false));
        let idle = IdleSignal {
            suspended: Arc::clone(&suspended),
            command_tx: command_tx.clone(),
        };
        let worker_shared = Arc::clone(&shared);

        thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || run_output_thread(worker_shared, idle, command_rx, ready_tx))
            .map_err(|e| {
                TutorError::AudioDeviceError(format!("Failed to spawn output thread: {}", e))
            })?;

        let (sample_rate, channels) = ready_rx.recv().map_err(|_| {
            TutorError::AudioDeviceError("Output thread exited during startup".into())
        })??;

        info!(
            "Audio output ready: {} Hz, {} channel(s)",
            sample_rate, channels
        );

        Ok(Self {
            command_tx,
            shared,
            suspended,
            sample_rate,
            channels,
        })
    }

    /// Get the sample rate of the output device
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of channels
    pub fn channels(&self) -> u16 {
        self.channels
    }

    fn send(&self, command: OutputCommand) -> Result<()> {
        self.command_tx.send(command).map_err(|_| {
            TutorError::AudioDeviceError("Audio output thread is not running".into())
        })
    }
}

impl AudioContext for CpalContext {
    fn state(&self) -> ContextState {
        if self.suspended.load(Ordering::SeqCst) {
            ContextState::Suspended
        } else {
            ContextState::Running
        }
    }

    fn resume(&self) -> Result<()> {
        self.send(OutputCommand::Resume)?;
        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn start(&self, clip: PcmClip, end: ClipEnd) -> Result<Box<dyn ActiveClip>> {
        let samples = resample_mono(&clip.samples, clip.sample_rate, self.sample_rate)?;

        let mut shared = self.shared.lock();
        shared.clip_id += 1;
        shared.queue = samples.into();
        shared.end = Some(end);

        // The callback may have gone idle since `state()` was checked
        if self.suspended.swap(false, Ordering::SeqCst) {
            self.send(OutputCommand::Resume)?;
        }

        Ok(Box::new(CpalClip {
            id: shared.clip_id,
            shared: Arc::clone(&self.shared),
        }))
    }
}

impl Drop for CpalContext {
    fn drop(&mut self) {
        let _ = self.command_tx.send(OutputCommand::Shutdown);
    }
}

struct CpalClip {
    id: u64,
    shared: Arc<Mutex<SharedPlayback>>,
}

impl ActiveClip for CpalClip {
    fn stop(&mut self) -> Result<()> {
        let mut shared = self.shared.lock();
        if shared.clip_id != self.id || shared.end.is_none() {
            return Err(TutorError::AudioDeviceError(format!(
                "Clip {} is no longer playing",
                self.id
            )));
        }

        shared.queue.clear();
        // Dropping the notifier without finishing marks the clip cancelled
        shared.end = None;
        Ok(())
    }
}

/// Lets the output callback pause its own stream once nothing is queued
struct IdleSignal {
    suspended: Arc<AtomicBool>,
    command_tx: Sender<OutputCommand>,
}

impl IdleSignal {
    fn go_idle(&self) {
        if !self.suspended.swap(true, Ordering::SeqCst) {
            let _ = self.command_tx.try_send(OutputCommand::Suspend);
        }
    }
}

/// Fill one device buffer, fanning each mono sample out to every channel
fn fill_output(shared: &mut SharedPlayback, idle: &IdleSignal, data: &mut [f32], channels: usize) {
    for frame in data.chunks_mut(channels) {
        let sample = shared.queue.pop_front().unwrap_or(0.0);
        frame.fill(sample);
    }

    if shared.queue.is_empty() {
        if let Some(end) = shared.end.take() {
            end.finish();
        }
        idle.go_idle();
    }
}

fn run_output_thread(
    shared: Arc<Mutex<SharedPlayback>>,
    idle: IdleSignal,
    command_rx: Receiver<OutputCommand>,
    ready_tx: Sender<Result<(u32, u16)>>,
) {
    let stream = match build_stream(shared, idle) {
        Ok((stream, sample_rate, channels)) => {
            let _ = ready_tx.send(Ok((sample_rate, channels)));
            stream
        }
        Err(e) => {
            error!("Failed to open audio output: {}", e);
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    loop {
        match command_rx.recv() {
            Ok(OutputCommand::Resume) => {
                if let Err(e) = stream.play() {
                    warn!("Failed to resume output stream: {}", e);
                }
            }
            Ok(OutputCommand::Suspend) => {
                if let Err(e) = stream.pause() {
                    warn!("Failed to suspend output stream: {}", e);
                }
            }
            Ok(OutputCommand::Shutdown) | Err(_) => break,
        }
    }

    drop(stream);
    debug!("Audio output thread stopped");
}

fn build_stream(
    shared: Arc<Mutex<SharedPlayback>>,
    idle: IdleSignal,
) -> Result<(cpal::Stream, u32, u16)> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or_else(|| TutorError::AudioDeviceError("No output device available".into()))?;

    info!(
        "Using output device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let config: cpal::StreamConfig = device
        .default_output_config()
        .map_err(|e| TutorError::AudioDeviceError(format!("Failed to get output config: {}", e)))?
        .into();

    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;

    let err_fn = |err| {
        error!("Audio output stream error: {}", err);
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                fill_output(&mut shared.lock(), &idle, data, channels);
            },
            err_fn,
            None,
        )
        .map_err(|e| {
            TutorError::AudioDeviceError(format!("Failed to build output stream: {}", e))
        })?;

    stream
        .play()
        .map_err(|e| TutorError::AudioDeviceError(format!("Failed to start output stream: {}", e)))?;

    Ok((stream, sample_rate, channels as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_creation() {
        // This test might fail in CI environments without audio devices
        if let Ok(context) = CpalContext::open() {
            assert!(context.sample_rate() > 0);
            assert!(context.channels() > 0);
        }
    }

    fn idle_signal() -> (IdleSignal, Receiver<OutputCommand>) {
        let (command_tx, command_rx) = bounded(4);
        let idle = IdleSignal {
            suspended: Arc::new(AtomicBool::new(false)),
            command_tx,
        };
        (idle, command_rx)
    }

    #[test]
    fn test_drained_queue_completes_clip_and_suspends_once() {
        let (idle, command_rx) = idle_signal();
        let (end, mut done) = ClipEnd::channel();
        let mut shared = SharedPlayback {
            queue: vec![0.5, -0.5].into(),
            clip_id: 1,
            end: Some(end),
        };

        let mut data = [1.0f32; 8];
        fill_output(&mut shared, &idle, &mut data, 2);

        assert_eq!(data, [0.5, 0.5, -0.5, -0.5, 0.0, 0.0, 0.0, 0.0]);
        assert!(done.try_recv().is_ok());
        assert!(idle.suspended.load(Ordering::SeqCst));
        assert!(matches!(command_rx.try_recv(), Ok(OutputCommand::Suspend)));

        fill_output(&mut shared, &idle, &mut data, 2);
        assert!(command_rx.try_recv().is_err());
    }

    #[test]
    fn test_pending_samples_keep_stream_running() {
        let (idle, command_rx) = idle_signal();
        let mut shared = SharedPlayback {
            queue: vec![0.25; 16].into(),
            ..Default::default()
        };

        let mut data = [0.0f32; 4];
        fill_output(&mut shared, &idle, &mut data, 1);

        assert_eq!(shared.queue.len(), 12);
        assert!(!idle.suspended.load(Ordering::SeqCst));
        assert!(command_rx.try_recv().is_err());
    }
}
