// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Four-step loop sequencer.
//!
//! This module provides:
//! - The 9x4 pad/step grid
//! - A transport that plays step 0 inline on start, then ticks once per beat
//! - Live tempo changes that fully cancel the old timer before re-arming
//!
//! Ticks run as a tokio task. Each armed timer carries a generation number
//! and checks it under the transport lock before playing, so once `stop`
//! returns no further step can sound. The output device is opened before
//! the transport lock is taken.

pub mod grid;

pub use grid::Grid;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::audio::AudioEngine;
use crate::error::IndexError;
use crate::events::{EventBus, SoundboardEvent};
use crate::pads::SharedPads;
use crate::timing::Tempo;

/// Steps per loop
pub const NUM_STEPS: usize = 4;

/// Play position and timer ownership
#[derive(Debug, Default)]
struct Transport {
    tempo: Tempo,
    /// Next step to play
    step: usize,
    playing: bool,
    /// Bumped on every arm and halt; a tick from an older generation is stale
    generation: u64,
    task: Option<JoinHandle<()>>,
    /// Runtime the last timer was spawned on
    runtime: Option<Handle>,
}

impl Transport {
    fn halt(&mut self) {
        self.playing = false;
        self.generation = self.generation.wrapping_add(1);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// State shared with the tick task
#[derive(Debug)]
struct Shared {
    transport: Mutex<Transport>,
    grid: RwLock<Grid>,
    pads: SharedPads,
    engine: Arc<AudioEngine>,
    events: EventBus,
}

impl Shared {
    /// Play every loaded pad switched on at `step`
    fn play_step(&self, step: usize) {
        let on: Vec<usize> = self.grid.read().pads_on_step(step).collect();
        for pad in on {
            let playable = match self.pads.read().playable(pad) {
                Ok(Some(playable)) => playable,
                _ => continue,
            };
            let (buffer, gain) = playable;
            if let Err(e) = self.engine.play(pad, &buffer, gain) {
                warn!(pad, step, "sequencer playback failed: {}", e);
            }
        }
        self.events.emit(SoundboardEvent::StepPlayed { step });
    }

    /// One timer firing. Returns false once this timer is stale.
    fn tick(&self, generation: u64) -> bool {
        let mut transport = self.transport.lock();
        if !transport.playing || transport.generation != generation {
            return false;
        }
        let step = transport.step;
        debug!(step, "sequencer tick");
        self.play_step(step);
        transport.step = (step + 1) % NUM_STEPS;
        true
    }
}

async fn run_timer(shared: Arc<Shared>, generation: u64, period: Duration) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if !shared.tick(generation) {
            break;
        }
    }
}

/// The step sequencer
#[derive(Debug)]
pub struct Sequencer {
    shared: Arc<Shared>,
}

impl Sequencer {
    /// Create a stopped sequencer with an empty grid at the default tempo
    pub fn new(pads: SharedPads, engine: Arc<AudioEngine>, events: EventBus) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport: Mutex::new(Transport::default()),
                grid: RwLock::new(Grid::new()),
                pads,
                engine,
                events,
            }),
        }
    }

    /// Flip one grid cell and return its new value
    pub fn toggle(&self, pad: usize, step: usize) -> Result<bool, IndexError> {
        self.shared.grid.write().toggle(pad, step)
    }

    /// Turn every cell off. Tempo and play state are untouched.
    pub fn clear_grid(&self) {
        self.shared.grid.write().clear();
    }

    /// Copy of the current grid
    pub fn grid(&self) -> Grid {
        *self.shared.grid.read()
    }

    /// Replace the whole grid (rehydration, reset)
    pub fn set_grid(&self, grid: Grid) {
        *self.shared.grid.write() = grid;
    }

    /// Current tempo
    pub fn tempo(&self) -> Tempo {
        self.shared.transport.lock().tempo
    }

    /// Whether the loop is running
    pub fn is_playing(&self) -> bool {
        self.shared.transport.lock().playing
    }

    /// The step the next tick will play
    pub fn current_step(&self) -> usize {
        self.shared.transport.lock().step
    }

    /// Change tempo, clamped to the supported range.
    ///
    /// While playing, the old timer is cancelled and the loop restarts from
    /// step 0 at the new interval.
    pub fn set_tempo(&self, bpm: u32) -> Tempo {
        if self.is_playing() {
            self.shared.warm_output();
        }
        let mut transport = self.shared.transport.lock();
        let tempo = Tempo::new(bpm);
        transport.tempo = tempo;
        if transport.playing {
            transport.halt();
            self.arm(&mut transport);
        }
        tempo
    }

    /// Start the loop. No-op if already playing.
    ///
    /// Step 0 plays before this returns; later steps fire from a timer task.
    /// Outside a tokio runtime the loop stays stopped and a warning is logged.
    pub fn start(&self) {
        if self.is_playing() {
            return;
        }
        self.shared.warm_output();
        let mut transport = self.shared.transport.lock();
        if transport.playing {
            return;
        }
        self.arm(&mut transport);
    }

    /// Stop the loop. Safe to call when already stopped.
    pub fn stop(&self) {
        let mut transport = self.shared.transport.lock();
        if !transport.playing {
            return;
        }
        transport.halt();
        info!("sequencer stopped");
        self.shared.events.emit(SoundboardEvent::SequencerStopped);
    }

    fn arm(&self, transport: &mut Transport) {
        let Some(runtime) = Handle::try_current()
            .ok()
            .or_else(|| transport.runtime.clone())
        else {
            warn!("sequencer needs a tokio runtime for its timer; not starting");
            return;
        };

        transport.playing = true;
        transport.generation = transport.generation.wrapping_add(1);
        let generation = transport.generation;
        let bpm = transport.tempo.bpm();
        let period = transport.tempo.step_interval();

        info!(bpm, "sequencer started");
        self.shared
            .events
            .emit(SoundboardEvent::SequencerStarted { bpm });

        self.shared.play_step(0);
        transport.step = 1 % NUM_STEPS;

        let shared = Arc::clone(&self.shared);
        transport.task = Some(runtime.spawn(run_timer(shared, generation, period)));
        transport.runtime = Some(runtime);
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.shared.transport.lock().halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioBuffer;
    use crate::pads::PadStore;
    use crate::testing::FakeContext;
    use tokio::sync::broadcast;

    fn loaded_pads(indices: &[usize]) -> SharedPads {
        let pads = PadStore::shared();
        {
            let mut store = pads.write();
            for &i in indices {
                let buffer = Arc::new(AudioBuffer::new(8000, 1, vec![0.2; 80]));
                store.commit(i, buffer, format!("pad{}", i), "x").unwrap();
            }
        }
        pads
    }

    fn played_pads(rx: &mut broadcast::Receiver<SoundboardEvent>) -> Vec<usize> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SoundboardEvent::PadPlayed { pad, .. } = event {
                out.push(pad);
            }
        }
        out
    }

    fn steps(rx: &mut broadcast::Receiver<SoundboardEvent>) -> Vec<usize> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SoundboardEvent::StepPlayed { step } = event {
                out.push(step);
            }
        }
        out
    }

    fn sequencer(pads: SharedPads) -> (Sequencer, FakeContext, EventBus) {
        let fake = FakeContext::new();
        let events = EventBus::new();
        let seq = Sequencer::new(pads, fake.engine(events.clone()), events.clone());
        (seq, fake, events)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_plays_step_zero_inline() {
        let (seq, fake, events) = sequencer(loaded_pads(&[0]));
        let mut rx = events.subscribe();
        seq.toggle(0, 0).unwrap();

        seq.start();

        assert!(seq.is_playing());
        assert_eq!(fake.played().len(), 1);
        assert_eq!(played_pads(&mut rx), vec![0]);
        assert_eq!(seq.current_step(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grid_scenario_at_120_bpm() {
        let (seq, fake, events) = sequencer(loaded_pads(&[0, 1]));
        let mut rx = events.subscribe();
        seq.toggle(0, 0).unwrap();
        seq.toggle(1, 2).unwrap();
        seq.set_tempo(120);

        seq.start();
        assert_eq!(played_pads(&mut rx), vec![0]);

        // Step 1 has nothing on
        time::sleep(Duration::from_millis(510)).await;
        assert!(played_pads(&mut rx).is_empty());

        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(played_pads(&mut rx), vec![1]);

        let played = fake.played();
        assert_eq!(played.len(), 2);
        assert_eq!(played[1].at - played[0].at, Duration::from_millis(1000));
        seq.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_steps_cycle_and_interval() {
        let (seq, _fake, events) = sequencer(PadStore::shared());
        let mut rx = events.subscribe();
        seq.set_tempo(60);

        seq.start();
        time::sleep(Duration::from_millis(5_500)).await;
        seq.stop();

        assert_eq!(steps(&mut rx), vec![0, 1, 2, 3, 0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pads_without_buffer_are_skipped() {
        let (seq, fake, _events) = sequencer(loaded_pads(&[2]));
        seq.toggle(1, 0).unwrap();
        seq.toggle(2, 0).unwrap();

        seq.start();

        let played = fake.played();
        assert_eq!(played.len(), 1);
        seq.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_tick_after_stop() {
        let (seq, fake, _events) = sequencer(loaded_pads(&[0]));
        for step in 0..NUM_STEPS {
            seq.toggle(0, step).unwrap();
        }

        seq.start();
        time::sleep(Duration::from_millis(700)).await;
        seq.stop();
        let before = fake.played().len();

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fake.played().len(), before);
        assert!(!seq.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let (seq, _fake, events) = sequencer(PadStore::shared());
        let mut rx = events.subscribe();

        seq.stop();
        assert!(rx.try_recv().is_err());
        assert!(!seq.is_playing());
        assert_eq!(seq.current_step(), 0);

        seq.start();
        seq.stop();
        seq.stop();
        let stops = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| *e == SoundboardEvent::SequencerStopped)
            .count();
        assert_eq!(stops, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_is_noop() {
        let (seq, fake, _events) = sequencer(loaded_pads(&[0]));
        seq.toggle(0, 0).unwrap();

        seq.start();
        seq.start();

        assert_eq!(fake.played().len(), 1);
        seq.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_tempo_change_restarts_single_timer() {
        let (seq, _fake, events) = sequencer(PadStore::shared());
        let mut rx = events.subscribe();
        seq.set_tempo(60);
        seq.start();

        time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(seq.current_step(), 2);

        let tempo = seq.set_tempo(120);
        assert_eq!(tempo.bpm(), 120);
        assert_eq!(seq.current_step(), 1);

        time::sleep(Duration::from_millis(1_100)).await;
        seq.stop();

        // 0,1 at 60 bpm; restart at 0, then two 500 ms ticks
        assert_eq!(steps(&mut rx), vec![0, 1, 0, 1, 2]);
    }

    #[test]
    fn test_set_tempo_while_stopped() {
        let (seq, _fake, _events) = sequencer(PadStore::shared());
        assert_eq!(seq.tempo().bpm(), 100);
        assert_eq!(seq.set_tempo(1000).bpm(), crate::timing::MAX_BPM);
        assert!(!seq.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_grid_while_playing() {
        let (seq, fake, _events) = sequencer(loaded_pads(&[0]));
        for step in 0..NUM_STEPS {
            seq.toggle(0, step).unwrap();
        }
        seq.set_tempo(120);
        seq.start();
        seq.clear_grid();

        time::sleep(Duration::from_millis(1_600)).await;
        assert_eq!(fake.played().len(), 1);
        assert!(seq.is_playing());
        assert_eq!(seq.tempo().bpm(), 120);
        seq.stop();
    }

    #[test]
    fn test_start_without_runtime_stays_stopped() {
        let (seq, fake, events) = sequencer(loaded_pads(&[0]));
        let mut rx = events.subscribe();
        seq.toggle(0, 0).unwrap();

        seq.start();

        assert!(!seq.is_playing());
        assert_eq!(seq.current_step(), 0);
        assert!(fake.played().is_empty());
        assert!(steps(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_opens_output_first() {
        let (seq, _fake, _events) = sequencer(PadStore::shared());
        assert!(!seq.shared.engine.has_context());

        seq.start();
        assert!(seq.shared.engine.has_context());
        seq.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_tempo_change_from_plain_thread() {
        let (seq, _fake, _events) = sequencer(PadStore::shared());
        let seq = Arc::new(seq);
        seq.start();

        let remote = Arc::clone(&seq);
        std::thread::spawn(move || remote.set_tempo(150))
            .join()
            .unwrap();

        assert!(seq.is_playing());
        assert_eq!(seq.tempo().bpm(), 150);
        assert_eq!(seq.current_step(), 1);
        seq.stop();
    }

    #[test]
    fn test_toggle_invalid_index() {
        let (seq, _fake, _events) = sequencer(PadStore::shared());
        assert_eq!(seq.toggle(0, 4).unwrap_err(), IndexError::step(4));
        assert_eq!(seq.toggle(9, 0).unwrap_err(), IndexError::pad(9));
    }
}
