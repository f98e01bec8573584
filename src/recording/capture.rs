// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Microphone capture into a pad.
//!
//! A session opens the capture device, pumps chunks into an ordered buffer
//! until `stop`, then encodes the whole take as WAV, decodes it through the
//! audio engine, and commits the result to the target pad. Only one session
//! runs at a time. The device is released exactly once per session, whether
//! the take commits, fails to decode, or the caller goes away mid-finalize.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{CaptureChunk, CaptureFormat, RecordError};
use crate::audio::wav::{self, WAV_MIME};
use crate::audio::AudioEngine;
use crate::error::{DecodeError, IndexError};
use crate::events::{EventBus, SoundboardEvent};
use crate::pads::{key_for_index, SharedPads, NUM_PADS};
use crate::persistence::data_url;

/// A source of microphone audio
pub trait CaptureDevice: Send + Sync {
    /// Open a capture stream delivering chunks to `chunks`.
    ///
    /// May block while the platform asks for permission; the recorder calls
    /// it on the blocking pool. The stream must drop `chunks` when released.
    fn open(
        &self,
        chunks: UnboundedSender<CaptureChunk>,
    ) -> Result<Box<dyn CaptureStream>, RecordError>;
}

/// An open capture stream.
///
/// Streams are not expected to release themselves on drop. The recorder
/// wraps each one in a [`CaptureSession`] as soon as `open` returns, and the
/// session calls `release` exactly once.
pub trait CaptureStream: Send {
    /// Format of delivered chunks
    fn format(&self) -> CaptureFormat;

    /// Stop capturing and give the device back
    fn release(&mut self);
}

/// Scoped ownership of an open stream; releases on drop if not already done
pub struct CaptureSession {
    stream: Option<Box<dyn CaptureStream>>,
    format: CaptureFormat,
}

impl CaptureSession {
    /// Take ownership of an open stream
    pub fn new(stream: Box<dyn CaptureStream>) -> Self {
        let format = stream.format();
        Self {
            stream: Some(stream),
            format,
        }
    }

    /// Format the stream was opened with
    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    /// Whether the device has been given back
    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }

    /// Release the device. Later calls do nothing.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
            debug!("capture device released");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("format", &self.format)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Recorder state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecorderState {
    /// Not recording
    #[default]
    Idle,
    /// Opening the device or receiving audio for `pad`
    Capturing { pad: usize },
    /// Encoding, decoding, and committing the take for `pad`
    Finalizing { pad: usize },
}

/// Per-take options
#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    /// Route live input to the output while capturing
    pub monitor: bool,
    /// Name for the pad; blank means "Sample <KEY>"
    pub name: Option<String>,
}

/// A take that was committed to a pad
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSample {
    /// Pad the take went to
    pub pad: usize,
    /// Name given to the pad
    pub name: String,
    /// Length of the decoded audio
    pub duration: Duration,
}

struct Active {
    pad: usize,
    name: Option<String>,
    session: CaptureSession,
    pump: JoinHandle<Vec<CaptureChunk>>,
}

#[derive(Default)]
struct Inner {
    state: RecorderState,
    active: Option<Active>,
}

/// Single-session microphone recorder
pub struct Recorder {
    device: Arc<dyn CaptureDevice>,
    engine: Arc<AudioEngine>,
    pads: SharedPads,
    events: EventBus,
    max_duration: Option<Duration>,
    inner: Mutex<Inner>,
}

/// Name a take: trimmed explicit name, else "Sample <KEY>"
fn take_name(pad: usize, name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => n.to_string(),
        None => format!("Sample {}", key_for_index(pad).unwrap_or('?')),
    }
}

/// Collect chunks in arrival order until the stream drops its sender
async fn pump(
    mut rx: UnboundedReceiver<CaptureChunk>,
    format: CaptureFormat,
    monitor: Option<Arc<AudioEngine>>,
    limit: Option<usize>,
) -> Vec<CaptureChunk> {
    let mut chunks = Vec::new();
    let mut total = 0usize;
    while let Some(mut chunk) = rx.recv().await {
        if chunk.is_empty() {
            continue;
        }
        if let Some(engine) = &monitor {
            engine.monitor(&chunk, format);
        }
        if let Some(limit) = limit {
            let room = limit.saturating_sub(total);
            if room == 0 {
                continue;
            }
            chunk.truncate(room);
        }
        total += chunk.len();
        chunks.push(chunk);
    }
    debug!(chunks = chunks.len(), samples = total, "capture pump finished");
    chunks
}

/// Drops a start reservation if the open fails or is abandoned
struct Reservation<'a> {
    recorder: &'a Recorder,
    armed: bool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.recorder.inner.lock().state = RecorderState::Idle;
        }
    }
}

/// Returns the recorder to Idle however finalize ends
struct FinalizeGuard<'a> {
    recorder: &'a Recorder,
}

impl Drop for FinalizeGuard<'_> {
    fn drop(&mut self) {
        self.recorder.inner.lock().state = RecorderState::Idle;
        self.recorder
            .events
            .emit(SoundboardEvent::RecorderChanged(RecorderState::Idle));
    }
}

impl Recorder {
    /// Create an idle recorder
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        engine: Arc<AudioEngine>,
        pads: SharedPads,
        events: EventBus,
    ) -> Self {
        Self {
            device,
            engine,
            pads,
            events,
            max_duration: None,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Discard audio past `max` in each take; `None` records until stopped
    pub fn with_max_duration(mut self, max: Option<Duration>) -> Self {
        self.max_duration = max;
        self
    }

    /// Current state
    pub fn state(&self) -> RecorderState {
        self.inner.lock().state
    }

    /// Whether a session is running or being finalized
    pub fn is_busy(&self) -> bool {
        self.state() != RecorderState::Idle
    }

    /// Start capturing into `pad`.
    ///
    /// Fails with `AlreadyRecording` while another session exists, leaving
    /// that session untouched.
    pub async fn start(&self, pad: usize, options: RecordOptions) -> Result<(), RecordError> {
        if pad >= NUM_PADS {
            return Err(IndexError::pad(pad).into());
        }
        {
            let mut inner = self.inner.lock();
            if inner.state != RecorderState::Idle {
                return Err(RecordError::AlreadyRecording);
            }
            inner.state = RecorderState::Capturing { pad };
        }
        let mut reservation = Reservation {
            recorder: self,
            armed: true,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let device = Arc::clone(&self.device);
        // Wrapped on the blocking thread so a cancelled start still releases
        let session =
            tokio::task::spawn_blocking(move || device.open(tx).map(CaptureSession::new))
                .await
                .map_err(|e| {
                    RecordError::Unsupported(format!("capture open task failed: {}", e))
                })??;

        let format = session.format();
        let monitor = options.monitor.then(|| Arc::clone(&self.engine));
        let limit = self.max_duration.map(|d| format.samples_for(d));
        let pump = tokio::spawn(pump(rx, format, monitor, limit));

        self.inner.lock().active = Some(Active {
            pad,
            name: options.name,
            session,
            pump,
        });
        reservation.armed = false;

        info!(
            pad,
            sample_rate = format.sample_rate,
            channels = format.channels,
            monitor = options.monitor,
            "recording started"
        );
        self.events
            .emit(SoundboardEvent::RecorderChanged(RecorderState::Capturing { pad }));
        Ok(())
    }

    /// Finish the running take and commit it.
    ///
    /// Returns `Ok(None)` when nothing is capturing. On decode failure the
    /// target pad keeps its previous content.
    pub async fn stop(&self) -> Result<Option<RecordedSample>, RecordError> {
        let active = {
            let mut inner = self.inner.lock();
            match inner.active.take() {
                Some(active) => {
                    inner.state = RecorderState::Finalizing { pad: active.pad };
                    active
                }
                None => return Ok(None),
            }
        };
        let _idle = FinalizeGuard { recorder: self };

        let Active {
            pad,
            name,
            mut session,
            pump,
        } = active;
        self.events
            .emit(SoundboardEvent::RecorderChanged(RecorderState::Finalizing { pad }));

        let format = session.format();
        session.release();
        let chunks = pump.await.map_err(|_| DecodeError::Interrupted)?;

        let bytes = wav::encode(
            chunks.iter().map(Vec::as_slice),
            format.sample_rate,
            format.channels,
        )
        .map_err(RecordError::Encode)?;
        let bytes: Arc<[u8]> = bytes.into();

        let buffer = match self.engine.decode(Arc::clone(&bytes)).await {
            Ok(buffer) => Arc::new(buffer),
            Err(e) => {
                warn!(pad, "recorded audio did not decode: {}", e);
                return Err(e.into());
            }
        };
        let encoded = data_url::encode(&bytes, WAV_MIME);
        let name = take_name(pad, name.as_deref());
        let duration = buffer.duration();

        self.pads.write().commit(pad, buffer, encoded, &name)?;
        self.events.emit(SoundboardEvent::PadChanged { pad });
        info!(pad, name = %name, ?duration, "recording committed");

        Ok(Some(RecordedSample {
            pad,
            name,
            duration,
        }))
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("state", &self.state())
            .field("max_duration", &self.max_duration)
            .finish()
    }
}
