// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Default input device capture via cpal.
//!
//! Like the output side, the input stream is owned by a dedicated thread.
//! Every sample format is converted to f32 in the callback.

use std::sync::mpsc::{self, SyncSender};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, FromSample, Sample, SizedSample, StreamConfig};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

use super::capture::{CaptureDevice, CaptureStream};
use super::{CaptureChunk, CaptureFormat, RecordError};

/// The system default microphone
#[derive(Debug, Clone, Copy, Default)]
pub struct Microphone;

impl Microphone {
    /// Create a handle to the default input device
    pub fn new() -> Self {
        Self
    }
}

impl CaptureDevice for Microphone {
    fn open(
        &self,
        chunks: UnboundedSender<CaptureChunk>,
    ) -> Result<Box<dyn CaptureStream>, RecordError> {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<CaptureFormat, RecordError>>(1);
        let (shutdown_tx, shutdown_rx) = mpsc::sync_channel::<()>(1);

        let thread = thread::Builder::new()
            .name("soundsprite-capture".to_string())
            .spawn(move || {
                let stream = match build_stream(chunks) {
                    Ok((stream, format)) => {
                        let _ = ready_tx.send(Ok(format));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("input stream closed");
            })
            .map_err(|e| RecordError::Unsupported(format!("failed to spawn capture thread: {}", e)))?;

        let format = ready_rx
            .recv()
            .map_err(|_| RecordError::Unsupported("capture thread exited".to_string()))??;
        info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            "microphone opened"
        );

        Ok(Box::new(MicrophoneStream {
            format,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        }))
    }
}

/// Running input stream; dropping the cpal stream drops the chunk sender
struct MicrophoneStream {
    format: CaptureFormat,
    shutdown: Option<SyncSender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureStream for MicrophoneStream {
    fn format(&self) -> CaptureFormat {
        self.format
    }

    fn release(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for MicrophoneStream {
    fn drop(&mut self) {
        self.release();
    }
}

fn build_stream(
    chunks: UnboundedSender<CaptureChunk>,
) -> Result<(cpal::Stream, CaptureFormat), RecordError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| RecordError::Unsupported("no microphone found".to_string()))?;
    let supported = device
        .default_input_config()
        .map_err(|e| RecordError::Unsupported(format!("failed to get input config: {}", e)))?;

    let config: StreamConfig = supported.config();
    let format = CaptureFormat {
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_typed::<f32>(&device, &config, chunks),
        cpal::SampleFormat::I16 => build_typed::<i16>(&device, &config, chunks),
        cpal::SampleFormat::U16 => build_typed::<u16>(&device, &config, chunks),
        cpal::SampleFormat::I32 => build_typed::<i32>(&device, &config, chunks),
        other => {
            return Err(RecordError::Unsupported(format!(
                "unsupported input sample format: {:?}",
                other
            )))
        }
    }
    .map_err(map_build_error)?;

    stream
        .play()
        .map_err(|e| RecordError::Permission(format!("failed to start capture: {}", e)))?;

    Ok((stream, format))
}

fn build_typed<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    chunks: UnboundedSender<CaptureChunk>,
) -> Result<cpal::Stream, BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let chunk: CaptureChunk = data.iter().map(|&s| f32::from_sample(s)).collect();
            let _ = chunks.send(chunk);
        },
        |err| {
            error!("audio input stream error: {}", err);
        },
        None,
    )
}

fn map_build_error(err: BuildStreamError) -> RecordError {
    match err {
        BuildStreamError::StreamConfigNotSupported | BuildStreamError::InvalidArgument => {
            RecordError::Unsupported(err.to_string())
        }
        other => RecordError::Permission(other.to_string()),
    }
}

/// List available audio input devices
pub fn list_devices() -> Vec<String> {
    let host = cpal::default_host();
    host.input_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default()
}

/// Get default input device name
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_input_device().and_then(|d| d.name().ok())
}
