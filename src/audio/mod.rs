// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio engine for the soundboard.
//!
//! This module provides:
//! - Lazily opened, process-wide output context
//! - Decoding of captured WAV bytes into playable buffers
//! - One-shot playback of a buffer through a per-trigger gain
//! - Best-effort monitoring of live capture audio

pub mod buffer;
pub mod output;
pub mod voice;
pub mod wav;

pub use buffer::{AudioBuffer, SharedBuffer};
pub use output::DeviceContext;
pub use voice::Voice;

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::events::{EventBus, SoundboardEvent, PULSE_DURATION};
use crate::recording::CaptureFormat;

/// An open output device that can start voices
pub trait AudioContext: Send + Sync {
    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Start a voice immediately; must not block
    fn start(&self, voice: Voice) -> Result<(), AudioError>;
}

/// Opens the output context on first use
pub type ContextOpener = dyn Fn() -> Result<Arc<dyn AudioContext>, AudioError> + Send + Sync;

/// Audio engine combining context ownership, decoding, and playback
pub struct AudioEngine {
    opener: Box<ContextOpener>,
    context: Mutex<Option<Arc<dyn AudioContext>>>,
    events: EventBus,
}

impl AudioEngine {
    /// Create an engine that opens contexts with `opener`
    pub fn new<F>(opener: F, events: EventBus) -> Self
    where
        F: Fn() -> Result<Arc<dyn AudioContext>, AudioError> + Send + Sync + 'static,
    {
        Self {
            opener: Box::new(opener),
            context: Mutex::new(None),
            events,
        }
    }

    /// Create an engine backed by the default output device
    pub fn with_default_device(events: EventBus) -> Self {
        Self::new(
            || DeviceContext::open().map(|c| Arc::new(c) as Arc<dyn AudioContext>),
            events,
        )
    }

    /// Get the output context, opening it on first use.
    ///
    /// A failed open is not cached; the next call tries again.
    pub fn ensure_context(&self) -> Result<Arc<dyn AudioContext>, AudioError> {
        let mut slot = self.context.lock();
        if let Some(ctx) = slot.as_ref() {
            return Ok(Arc::clone(ctx));
        }
        let ctx = (self.opener)()?;
        debug!(sample_rate = ctx.sample_rate(), "audio context opened");
        *slot = Some(Arc::clone(&ctx));
        Ok(ctx)
    }

    /// Whether a context has been opened
    pub fn has_context(&self) -> bool {
        self.context.lock().is_some()
    }

    /// Decode WAV bytes into a playable buffer on the blocking pool
    pub async fn decode(&self, bytes: Arc<[u8]>) -> Result<AudioBuffer, DecodeError> {
        tokio::task::spawn_blocking(move || wav::decode(&bytes))
            .await
            .map_err(|_| DecodeError::Interrupted)?
    }

    /// Play `buffer` once at `gain` and pulse `pad` on the display
    pub fn play(&self, pad: usize, buffer: &SharedBuffer, gain: f32) -> Result<(), AudioError> {
        let ctx = self.ensure_context()?;
        ctx.start(Voice::new(Arc::clone(buffer), gain, ctx.sample_rate()))?;
        self.events.emit(SoundboardEvent::PadPlayed {
            pad,
            pulse: PULSE_DURATION,
        });
        Ok(())
    }

    /// Route a live capture chunk to the output. Never fails the caller.
    pub fn monitor(&self, chunk: &[f32], format: CaptureFormat) {
        if chunk.is_empty() {
            return;
        }
        let buffer = Arc::new(AudioBuffer::new(
            format.sample_rate,
            format.channels,
            chunk.to_vec(),
        ));
        let result = self
            .ensure_context()
            .and_then(|ctx| ctx.start(Voice::new(buffer, 1.0, ctx.sample_rate())));
        if let Err(e) = result {
            warn!("monitor routing failed: {}", e);
        }
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("has_context", &self.has_context())
            .finish()
    }
}

/// Audio error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// No audio device available
    #[error("no audio output device available")]
    NoDevice,
    /// Device offers a sample format we cannot drive
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
    /// Failed to build or start the stream
    #[error("audio stream failed: {0}")]
    StreamFailed(String),
    /// The output thread has gone away
    #[error("audio context closed")]
    Closed,
}
