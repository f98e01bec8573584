// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Decoded, playable audio.

use std::sync::Arc;
use std::time::Duration;

/// Buffer handle shared between the pad store and playing voices
pub type SharedBuffer = Arc<AudioBuffer>;

/// Interleaved f32 samples at a fixed rate and channel count
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
}

impl AudioBuffer {
    /// Create a buffer from interleaved samples.
    ///
    /// A trailing partial frame is dropped.
    pub fn new(sample_rate: u32, channels: u16, mut samples: Vec<f32>) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);
        Self {
            sample_rate: sample_rate.max(1),
            channels,
            samples,
        }
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Raw interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// True if there is nothing to play
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length at the buffer's own rate
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Sample for `frame` on output channel `channel`.
    ///
    /// Mono buffers feed every output channel; wider buffers wrap.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.channels as usize;
        let source = channel % channels;
        self.samples
            .get(frame * channels + source)
            .copied()
            .unwrap_or(0.0)
    }
}
