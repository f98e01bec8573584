// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Device doubles for tests and headless runs.
//!
//! `FakeContext` stands in for the output device and records every voice
//! started on it. `FakeMicrophone` plays back scripted chunks and counts how
//! often its device was opened and released.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

use crate::audio::{AudioContext, AudioEngine, AudioError, SharedBuffer, Voice};
use crate::events::EventBus;
use crate::recording::{CaptureChunk, CaptureDevice, CaptureFormat, CaptureStream, RecordError};

/// Sample rate the fake output claims
pub const FAKE_OUTPUT_RATE: u32 = 48000;

/// A voice the fake output was asked to play
#[derive(Debug, Clone)]
pub struct PlayedVoice {
    pub buffer: SharedBuffer,
    pub gain: f32,
    /// Runtime clock at the start call; virtual under paused time
    pub at: Instant,
}

/// Output context that records instead of playing
#[derive(Debug, Clone, Default)]
pub struct FakeContext {
    played: Arc<Mutex<Vec<PlayedVoice>>>,
}

impl FakeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// This context as a trait object sharing the same log
    pub fn into_context(self) -> Arc<dyn AudioContext> {
        Arc::new(self)
    }

    /// An engine whose context is this fake
    pub fn engine(&self, events: EventBus) -> Arc<AudioEngine> {
        let fake = self.clone();
        Arc::new(AudioEngine::new(
            move || Ok(fake.clone().into_context()),
            events,
        ))
    }

    /// Every voice started so far, in order
    pub fn played(&self) -> Vec<PlayedVoice> {
        self.played.lock().clone()
    }
}

impl AudioContext for FakeContext {
    fn sample_rate(&self) -> u32 {
        FAKE_OUTPUT_RATE
    }

    fn start(&self, voice: Voice) -> Result<(), AudioError> {
        self.played.lock().push(PlayedVoice {
            buffer: Arc::clone(voice.buffer()),
            gain: voice.gain(),
            at: Instant::now(),
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MicCounters {
    opens: AtomicUsize,
    releases: AtomicUsize,
}

/// Capture device that delivers a fixed script of chunks
#[derive(Debug, Clone)]
pub struct FakeMicrophone {
    format: CaptureFormat,
    chunks: Vec<CaptureChunk>,
    denied: bool,
    open_delay: Option<Duration>,
    counters: Arc<MicCounters>,
}

impl FakeMicrophone {
    /// A microphone with the given format and no audio
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            format: CaptureFormat {
                sample_rate,
                channels,
            },
            chunks: Vec::new(),
            denied: false,
            open_delay: None,
            counters: Arc::new(MicCounters::default()),
        }
    }

    /// Chunks delivered as soon as the device opens
    pub fn with_chunks(mut self, chunks: Vec<CaptureChunk>) -> Self {
        self.chunks = chunks;
        self
    }

    /// Refuse every open with a permission error
    pub fn deny_permission(mut self) -> Self {
        self.denied = true;
        self
    }

    /// Block each open for `delay`, like a permission prompt
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// This microphone as a shareable device
    pub fn device(&self) -> Arc<dyn CaptureDevice> {
        Arc::new(self.clone())
    }

    /// Successful opens so far
    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    /// Device releases so far
    pub fn releases(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }
}

impl CaptureDevice for FakeMicrophone {
    fn open(
        &self,
        chunks: UnboundedSender<CaptureChunk>,
    ) -> Result<Box<dyn CaptureStream>, RecordError> {
        if let Some(delay) = self.open_delay {
            std::thread::sleep(delay);
        }
        if self.denied {
            return Err(RecordError::Permission("denied by user".to_string()));
        }
        for chunk in &self.chunks {
            let _ = chunks.send(chunk.clone());
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            format: self.format,
            sender: Some(chunks),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct FakeStream {
    format: CaptureFormat,
    sender: Option<UnboundedSender<CaptureChunk>>,
    counters: Arc<MicCounters>,
}

impl CaptureStream for FakeStream {
    fn format(&self) -> CaptureFormat {
        self.format
    }

    fn release(&mut self) {
        if self.sender.take().is_some() {
            self.counters.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}
