// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing module.
//!
//! Tempo handling for the step sequencer: one step per beat, so the step
//! interval is simply the beat length.

pub mod tempo;

pub use tempo::{Tempo, DEFAULT_BPM, MAX_BPM, MIN_BPM};
