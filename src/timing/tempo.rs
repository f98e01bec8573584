// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tempo in beats per minute.

use std::time::Duration;

/// Tempo of a fresh session
pub const DEFAULT_BPM: u32 = 100;

/// Slowest accepted tempo
pub const MIN_BPM: u32 = 20;

/// Fastest accepted tempo
pub const MAX_BPM: u32 = 300;

const NANOS_PER_MINUTE: u64 = 60_000_000_000;

/// A clamped tempo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tempo(u32);

impl Tempo {
    /// Create a tempo, clamped to `MIN_BPM..=MAX_BPM`
    pub fn new(bpm: u32) -> Self {
        Self(bpm.clamp(MIN_BPM, MAX_BPM))
    }

    /// Build from a loosely typed stored number.
    ///
    /// Missing, zero, negative, or non-finite values give the default.
    pub fn from_stored(bpm: Option<f64>) -> Self {
        match bpm {
            Some(v) if v.is_finite() && v >= 1.0 => Self::new(v.round().min(u32::MAX as f64) as u32),
            _ => Self::default(),
        }
    }

    /// Beats per minute
    pub fn bpm(&self) -> u32 {
        self.0
    }

    /// Time between sequencer steps: 60000 / bpm milliseconds
    pub fn step_interval(&self) -> Duration {
        Duration::from_nanos(NANOS_PER_MINUTE / self.0 as u64)
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self(DEFAULT_BPM)
    }
}
