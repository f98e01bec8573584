// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! One-shot playback of a buffer at a fixed gain.

use super::buffer::SharedBuffer;

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// A single trigger of a pad sample
#[derive(Debug, Clone)]
pub struct Voice {
    buffer: SharedBuffer,
    gain: f32,
    /// Fractional read position in source frames
    pos: f64,
    /// Source frames advanced per output frame
    step: f64,
    active: bool,
}

impl Voice {
    /// Create a voice for `buffer`, resampled to `output_rate`
    pub fn new(buffer: SharedBuffer, gain: f32, output_rate: u32) -> Self {
        let step = buffer.sample_rate() as f64 / output_rate.max(1) as f64;
        let active = !buffer.is_empty();
        Self {
            buffer,
            gain,
            pos: 0.0,
            step,
            active,
        }
    }

    /// Gain this voice was started with
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// The buffer this voice plays
    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    /// Still has frames left to render
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Mix this voice into an interleaved output block.
    ///
    /// Adds to whatever is already in `out`; the caller zeroes the block.
    pub fn render_into(&mut self, out: &mut [f32], channels: usize) {
        if !self.active || channels == 0 {
            return;
        }
        let frames = self.buffer.frames();

        for frame in out.chunks_exact_mut(channels) {
            if self.pos >= frames as f64 {
                self.active = false;
                break;
            }
            let i = self.pos as usize;
            let frac = (self.pos - i as f64) as f32;
            let next = (i + 1).min(frames - 1);

            for (ch, sample) in frame.iter_mut().enumerate() {
                let s0 = self.buffer.sample(i, ch);
                let s1 = self.buffer.sample(next, ch);
                *sample += lerp(s0, s1, frac) * self.gain;
            }

            self.pos += self.step;
        }

        if self.pos >= frames as f64 {
            self.active = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioBuffer;
    use std::sync::Arc;

    #[test]
    fn test_voice_applies_gain() {
        let buffer = Arc::new(AudioBuffer::new(100, 1, vec![1.0; 4]));
        let mut voice = Voice::new(buffer, 0.5, 100);
        let mut out = vec![0.0f32; 8];

        voice.render_into(&mut out, 2);

        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));
        assert!(!voice.is_active());
    }

    #[test]
    fn test_voices_mix_additively() {
        let buffer = Arc::new(AudioBuffer::new(100, 1, vec![0.25; 16]));
        let mut a = Voice::new(buffer.clone(), 1.0, 100);
        let mut b = Voice::new(buffer, 0.5, 100);
        let mut out = vec![0.0f32; 4];

        a.render_into(&mut out, 1);
        b.render_into(&mut out, 1);

        assert!((out[0] - 0.375).abs() < 1e-6);
        assert!(a.is_active() && b.is_active());
    }

    #[test]
    fn test_voice_resamples_to_output_rate() {
        // 4 source frames at 100 Hz last 8 output frames at 200 Hz
        let buffer = Arc::new(AudioBuffer::new(100, 1, vec![0.0, 1.0, 0.0, 1.0]));
        let mut voice = Voice::new(buffer, 1.0, 200);
        let mut out = vec![0.0f32; 16];

        voice.render_into(&mut out, 1);

        assert!((out[1] - 0.5).abs() < 1e-6);
        assert_eq!(out[2], 1.0);
        assert!(out[8..].iter().all(|&s| s == 0.0));
        assert!(!voice.is_active());
    }

    #[test]
    fn test_empty_buffer_is_inactive() {
        let buffer = Arc::new(AudioBuffer::new(44100, 2, Vec::new()));
        let voice = Voice::new(buffer, 1.0, 44100);
        assert!(!voice.is_active());
    }
}
