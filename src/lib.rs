// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! SoundSprite - a nine-pad sampler with a four-step loop.
//!
//! Record short takes from the microphone onto pads, play them by index or
//! by the `A S D F G H J K L` key row, arrange them on a 9x4 step grid, and
//! keep everything across sessions as one JSON record.
//!
//! [`Soundboard`] is the entry point; the modules below are its parts.

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod pads;
pub mod persistence;
pub mod recording;
pub mod sequencer;
pub mod soundboard;
pub mod testing;
pub mod timing;

pub use config::AppConfig;
pub use error::{DecodeError, IndexError, SoundboardError};
pub use events::{EventBus, SoundboardEvent};
pub use pads::{Pad, PadStore, NUM_PADS, PAD_KEYS};
pub use recording::{RecordOptions, RecorderState};
pub use sequencer::{Grid, NUM_STEPS};
pub use soundboard::Soundboard;
pub use timing::Tempo;
