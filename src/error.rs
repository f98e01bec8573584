// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error types shared across the soundboard.
//!
//! Component-specific errors live next to their component
//! (`AudioError`, `RecordError`, `StoreError`, `ExportError`); this module
//! holds the ones several components raise, plus the aggregate
//! `SoundboardError` returned by the coordinator.

use thiserror::Error;

use crate::audio::AudioError;
use crate::persistence::StoreError;
use crate::recording::{ExportError, RecordError};

/// What kind of index was out of range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// A pad index (0-8)
    Pad,
    /// A sequencer step index (0-3)
    Step,
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexKind::Pad => write!(f, "pad"),
            IndexKind::Step => write!(f, "step"),
        }
    }
}

/// A pad or step index outside the fixed bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} index {index} out of range (0..{len})")]
pub struct IndexError {
    /// Pad or step
    pub kind: IndexKind,
    /// The offending index
    pub index: usize,
    /// Number of valid slots
    pub len: usize,
}

impl IndexError {
    /// Out-of-range pad index
    pub fn pad(index: usize) -> Self {
        Self {
            kind: IndexKind::Pad,
            index,
            len: crate::pads::NUM_PADS,
        }
    }

    /// Out-of-range step index
    pub fn step(index: usize) -> Self {
        Self {
            kind: IndexKind::Step,
            index,
            len: crate::sequencer::NUM_STEPS,
        }
    }
}

/// Audio bytes that could not be turned into a playable buffer
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not a readable WAV stream
    #[error("invalid audio data: {0}")]
    Wav(#[from] hound::Error),

    /// Container parsed but holds no frames
    #[error("audio data contains no samples")]
    Empty,

    /// Sample format the decoder does not handle
    #[error("unsupported sample format: {bits}-bit {format}")]
    UnsupportedFormat {
        /// Bits per sample
        bits: u16,
        /// "int" or "float"
        format: &'static str,
    },

    /// Textual encoding is not a base64 data URL
    #[error("malformed data URL: {0}")]
    DataUrl(String),

    /// Base64 payload did not decode
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The decode task was cancelled before finishing
    #[error("decode task interrupted")]
    Interrupted,
}

/// Any failure surfaced by a `Soundboard` operation
#[derive(Debug, Error)]
pub enum SoundboardError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
