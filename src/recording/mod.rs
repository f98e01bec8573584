// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Recording and export system.
//!
//! This module provides:
//! - Microphone capture into a pad (Idle -> Capturing -> Finalizing -> Idle)
//! - The capture device seam and the cpal microphone behind it
//! - WAV export of committed recordings

pub mod capture;
pub mod export;
pub mod microphone;

pub use capture::{
    CaptureDevice, CaptureSession, CaptureStream, RecordOptions, RecordedSample, Recorder,
    RecorderState,
};
pub use export::{export_all, export_pad};
pub use microphone::Microphone;

use std::time::Duration;

use thiserror::Error;

use crate::error::{DecodeError, IndexError};

/// One block of interleaved f32 samples from the capture device
pub type CaptureChunk = Vec<f32>;

/// Shape of the audio a capture stream delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
}

impl CaptureFormat {
    /// Interleaved sample count covering `duration`
    pub fn samples_for(&self, duration: Duration) -> usize {
        let frames = (duration.as_secs_f64() * self.sample_rate as f64).round() as usize;
        frames * self.channels as usize
    }
}

/// Recording failures
#[derive(Debug, Error)]
pub enum RecordError {
    /// Microphone access denied or device unavailable
    #[error("microphone permission denied: {0}")]
    Permission(String),

    /// The platform cannot capture in any usable way
    #[error("audio capture unsupported: {0}")]
    Unsupported(String),

    /// A capture session is already running
    #[error("already recording")]
    AlreadyRecording,

    /// The captured audio did not decode
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The captured samples could not be written as WAV
    #[error("failed to encode capture: {0}")]
    Encode(#[source] hound::Error),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Export failures
#[derive(Debug, Error)]
pub enum ExportError {
    /// The pad has never been recorded to
    #[error("no sample to export for pad {pad}")]
    NoSample {
        /// Pad index
        pad: usize,
    },

    #[error(transparent)]
    Index(#[from] IndexError),

    /// Stored encoding did not decode back to bytes
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_for_duration() {
        let format = CaptureFormat {
            sample_rate: 48000,
            channels: 2,
        };
        assert_eq!(format.samples_for(Duration::from_secs(1)), 96000);
        assert_eq!(format.samples_for(Duration::from_millis(500)), 48000);
        assert_eq!(format.samples_for(Duration::ZERO), 0);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(RecordError::AlreadyRecording.to_string(), "already recording");
        assert_eq!(
            ExportError::NoSample { pad: 4 }.to_string(),
            "no sample to export for pad 4"
        );
        let err: RecordError = IndexError::pad(11).into();
        assert!(matches!(err, RecordError::Index(_)));
    }
}
