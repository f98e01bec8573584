// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! The fixed bank of sample pads.
//!
//! Nine slots addressed by index (0-8) or by the home-row key layout
//! `A S D F G H J K L`. The store is the one piece of state the recorder,
//! the sequencer, and manual edits all touch, so it is shared as
//! [`SharedPads`] and every mutation is a single write-lock scope.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::audio::SharedBuffer;
use crate::error::IndexError;

/// Number of pads in the bank
pub const NUM_PADS: usize = 9;

/// Keyboard layout, one key per pad
pub const PAD_KEYS: [char; NUM_PADS] = ['A', 'S', 'D', 'F', 'G', 'H', 'J', 'K', 'L'];

/// Label of a pad with no user-given name
pub const DEFAULT_PAD_NAME: &str = "Empty";

/// Gain of a fresh pad
pub const DEFAULT_VOLUME: f64 = 1.0;

/// Pad store shared between the coordinator, recorder, and sequencer
pub type SharedPads = Arc<RwLock<PadStore>>;

/// Key for a pad index
pub fn key_for_index(index: usize) -> Option<char> {
    PAD_KEYS.get(index).copied()
}

/// Pad index for a key, ignoring case
pub fn index_for_key(key: char) -> Option<usize> {
    let key = key.to_ascii_uppercase();
    PAD_KEYS.iter().position(|&k| k == key)
}

/// Normalize a user-entered name
fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        DEFAULT_PAD_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// One sample slot
#[derive(Debug, Clone, PartialEq)]
pub struct Pad {
    /// Display name
    pub name: String,
    /// Decoded audio, if recorded or restored this session
    pub buffer: Option<SharedBuffer>,
    /// Playback gain, exactly `percent / 100` as entered
    pub volume: f64,
    /// Data URL of the last committed recording
    pub encoded_sample: Option<String>,
}

impl Default for Pad {
    fn default() -> Self {
        Self {
            name: DEFAULT_PAD_NAME.to_string(),
            buffer: None,
            volume: DEFAULT_VOLUME,
            encoded_sample: None,
        }
    }
}

impl Pad {
    /// Has something to play
    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    /// Volume as an integer percent, the way an input slider shows it
    pub fn volume_percent(&self) -> u32 {
        (self.volume * 100.0).round().max(0.0) as u32
    }
}

/// The nine pads
#[derive(Debug, Clone, Default)]
pub struct PadStore {
    pads: [Pad; NUM_PADS],
}

impl PadStore {
    /// Create a bank of empty pads
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty bank ready for sharing
    pub fn shared() -> SharedPads {
        Arc::new(RwLock::new(Self::new()))
    }

    fn slot(&self, index: usize) -> Result<&Pad, IndexError> {
        self.pads.get(index).ok_or(IndexError::pad(index))
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Pad, IndexError> {
        self.pads.get_mut(index).ok_or(IndexError::pad(index))
    }

    /// Snapshot of one pad
    pub fn get(&self, index: usize) -> Result<Pad, IndexError> {
        self.slot(index).cloned()
    }

    /// Iterate over all pads in index order
    pub fn iter(&self) -> impl Iterator<Item = &Pad> {
        self.pads.iter()
    }

    /// Buffer and gain to play, or `None` if the pad is silent
    pub fn playable(&self, index: usize) -> Result<Option<(SharedBuffer, f32)>, IndexError> {
        let pad = self.slot(index)?;
        Ok(pad
            .buffer
            .as_ref()
            .map(|b| (Arc::clone(b), pad.volume as f32)))
    }

    /// Rename a pad; blank names fall back to the default label
    pub fn set_name(&mut self, index: usize, name: &str) -> Result<(), IndexError> {
        self.slot_mut(index)?.name = normalize_name(name);
        Ok(())
    }

    /// Set volume from a percent value (50 -> 0.5)
    pub fn set_volume(&mut self, index: usize, percent: f64) -> Result<(), IndexError> {
        let gain = percent / 100.0;
        self.slot_mut(index)?.volume = if gain.is_finite() {
            gain.max(0.0)
        } else {
            DEFAULT_VOLUME
        };
        Ok(())
    }

    /// Replace a pad's playable content and label in one step
    pub fn commit(
        &mut self,
        index: usize,
        buffer: SharedBuffer,
        encoded_sample: String,
        name: &str,
    ) -> Result<(), IndexError> {
        let pad = self.slot_mut(index)?;
        pad.buffer = Some(buffer);
        pad.encoded_sample = Some(encoded_sample);
        pad.name = normalize_name(name);
        Ok(())
    }

    /// Restore persisted metadata; any old buffer is dropped until decoded again
    pub fn restore(
        &mut self,
        index: usize,
        name: &str,
        volume: f64,
        encoded_sample: Option<String>,
    ) -> Result<(), IndexError> {
        let pad = self.slot_mut(index)?;
        pad.name = normalize_name(name);
        pad.volume = if volume.is_finite() { volume } else { DEFAULT_VOLUME };
        pad.encoded_sample = encoded_sample;
        pad.buffer = None;
        Ok(())
    }

    /// Attach a decoded buffer without touching metadata
    pub fn attach_buffer(&mut self, index: usize, buffer: SharedBuffer) -> Result<(), IndexError> {
        self.slot_mut(index)?.buffer = Some(buffer);
        Ok(())
    }

    /// Reset one pad to the default empty pad
    pub fn clear(&mut self, index: usize) -> Result<(), IndexError> {
        *self.slot_mut(index)? = Pad::default();
        Ok(())
    }

    /// Reset every pad
    pub fn reset_all(&mut self) {
        for pad in &mut self.pads {
            *pad = Pad::default();
        }
    }
}
