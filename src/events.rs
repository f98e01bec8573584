// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Notifications for the presentation layer.
//!
//! Core components never touch the display. They publish events here and
//! whatever renders pads, labels, and the step highlight subscribes.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::recording::RecorderState;

/// How long a pad shows as "playing" after a trigger
pub const PULSE_DURATION: Duration = Duration::from_millis(220);

const EVENT_CAPACITY: usize = 256;

/// Something the display may want to reflect
#[derive(Debug, Clone, PartialEq)]
pub enum SoundboardEvent {
    /// A pad's sample started playing
    PadPlayed { pad: usize, pulse: Duration },
    /// A pad's name, volume, or sample changed
    PadChanged { pad: usize },
    /// Every pad, the grid, and the tempo went back to defaults
    PadsReset,
    /// The sequencer played a step
    StepPlayed { step: usize },
    /// The sequencer started (or restarted after a tempo change)
    SequencerStarted { bpm: u32 },
    /// The sequencer stopped
    SequencerStopped,
    /// The recorder moved to a new state
    RecorderChanged(RecorderState),
}

/// Broadcast bus shared by all components
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SoundboardEvent>,
}

impl EventBus {
    /// Create a new bus
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Publish an event; having no subscribers is fine
    pub fn emit(&self, event: SoundboardEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> broadcast::Receiver<SoundboardEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
