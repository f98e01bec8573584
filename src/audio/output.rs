// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio output via cpal.
//!
//! The cpal stream lives on its own thread because streams are not `Send`
//! on every host. Voices reach the mixer over a channel.

use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample, StreamConfig};
use tracing::{debug, error, info};

use super::voice::Voice;
use super::{AudioContext, AudioError};

/// Hard cap on simultaneous voices so the callback never grows its pool
const MAX_VOICES: usize = 32;

/// Open output device owned by a dedicated thread
pub struct DeviceContext {
    voices: Sender<Voice>,
    sample_rate: u32,
    channels: u16,
    shutdown: Option<SyncSender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceContext {
    /// Open the default output device and start its stream
    pub fn open() -> Result<Self, AudioError> {
        let (voice_tx, voice_rx) = mpsc::channel::<Voice>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(u32, u16), AudioError>>(1);
        let (shutdown_tx, shutdown_rx) = mpsc::sync_channel::<()>(1);

        let thread = thread::Builder::new()
            .name("soundsprite-output".to_string())
            .spawn(move || {
                let stream = match build_stream(voice_rx) {
                    Ok((stream, rate, channels)) => {
                        let _ = ready_tx.send(Ok((rate, channels)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Park until the context is dropped
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("output stream closed");
            })
            .map_err(|e| AudioError::StreamFailed(format!("failed to spawn output thread: {}", e)))?;

        let (sample_rate, channels) = ready_rx.recv().map_err(|_| AudioError::Closed)??;
        info!(sample_rate, channels, "audio output started");

        Ok(Self {
            voices: voice_tx,
            sample_rate,
            channels,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Number of output channels
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl AudioContext for DeviceContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&self, voice: Voice) -> Result<(), AudioError> {
        self.voices.send(voice).map_err(|_| AudioError::Closed)
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn build_stream(voices: Receiver<Voice>) -> Result<(cpal::Stream, u32, u16), AudioError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::StreamFailed(format!("failed to get default config: {}", e)))?;

    let config: StreamConfig = supported.config();
    let rate = config.sample_rate.0;
    let channels = config.channels;

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_typed::<f32>(&device, &config, voices)?,
        cpal::SampleFormat::I16 => build_typed::<i16>(&device, &config, voices)?,
        cpal::SampleFormat::U16 => build_typed::<u16>(&device, &config, voices)?,
        cpal::SampleFormat::I32 => build_typed::<i32>(&device, &config, voices)?,
        other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    };

    stream
        .play()
        .map_err(|e| AudioError::StreamFailed(format!("failed to start stream: {}", e)))?;

    Ok((stream, rate, channels))
}

fn build_typed<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    voices: Receiver<Voice>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut mixer = Mixer::new(voices);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                mixer.fill(data, channels);
            },
            |err| {
                error!("audio output stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamFailed(format!("failed to build stream: {}", e)))
}

/// Sums active voices into each output block
struct Mixer {
    incoming: Receiver<Voice>,
    active: Vec<Voice>,
    scratch: Vec<f32>,
}

impl Mixer {
    fn new(incoming: Receiver<Voice>) -> Self {
        Self {
            incoming,
            active: Vec::with_capacity(MAX_VOICES),
            scratch: Vec::new(),
        }
    }

    fn fill<T>(&mut self, data: &mut [T], channels: usize)
    where
        T: Sample + FromSample<f32>,
    {
        while let Ok(voice) = self.incoming.try_recv() {
            if self.active.len() < MAX_VOICES {
                self.active.push(voice);
            }
        }

        self.scratch.clear();
        self.scratch.resize(data.len(), 0.0);
        for voice in &mut self.active {
            voice.render_into(&mut self.scratch, channels);
        }
        self.active.retain(Voice::is_active);

        for (out, &mixed) in data.iter_mut().zip(&self.scratch) {
            *out = T::from_sample(mixed.clamp(-1.0, 1.0));
        }
    }
}

/// List available audio output devices
pub fn list_devices() -> Vec<String> {
    let host = cpal::default_host();
    host.output_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default()
}

/// Get default output device name
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}
