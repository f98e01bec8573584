// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! The application state and the operations the UI drives.
//!
//! `Soundboard` owns the audio engine, pad store, recorder, sequencer, and
//! persistence, and hands each component only the shared pieces it needs.
//! Every mutating operation writes a fresh snapshot afterwards. A failed
//! write is logged and never fails the mutation itself.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::audio::AudioEngine;
use crate::config::AppConfig;
use crate::error::{IndexError, SoundboardError};
use crate::events::{EventBus, SoundboardEvent};
use crate::pads::{index_for_key, Pad, PadStore, SharedPads, NUM_PADS};
use crate::persistence::{
    self, FileStore, KeyValueStore, Persistence, RehydrateReport, Snapshot, StoreError,
};
use crate::recording::{
    self, CaptureDevice, ExportError, Microphone, RecordError, RecordOptions, RecordedSample,
    Recorder, RecorderState,
};
use crate::sequencer::{Grid, Sequencer};
use crate::timing::Tempo;

/// The soundboard
#[derive(Debug)]
pub struct Soundboard {
    pads: SharedPads,
    engine: Arc<AudioEngine>,
    recorder: Recorder,
    sequencer: Sequencer,
    persistence: Persistence,
    events: EventBus,
    selected: AtomicUsize,
}

impl Soundboard {
    /// Assemble a soundboard from its devices and store
    pub fn new(
        engine: Arc<AudioEngine>,
        microphone: Arc<dyn CaptureDevice>,
        store: Arc<dyn KeyValueStore>,
        events: EventBus,
    ) -> Self {
        let pads = PadStore::shared();
        let recorder = Recorder::new(
            microphone,
            Arc::clone(&engine),
            Arc::clone(&pads),
            events.clone(),
        );
        let sequencer = Sequencer::new(Arc::clone(&pads), Arc::clone(&engine), events.clone());
        Self {
            pads,
            engine,
            recorder,
            sequencer,
            persistence: Persistence::new(store),
            events,
            selected: AtomicUsize::new(0),
        }
    }

    /// Soundboard on the default output and input devices, storing to disk
    pub fn from_config(config: &AppConfig) -> Self {
        let events = EventBus::new();
        let engine = Arc::new(AudioEngine::with_default_device(events.clone()));
        let store = Arc::new(FileStore::new(config.storage.dir.clone()));
        Self::new(engine, Arc::new(Microphone::new()), store, events)
            .with_max_record_duration(config.recording.max_duration())
    }

    /// Limit the length of recorded takes
    pub fn with_max_record_duration(mut self, max: Option<Duration>) -> Self {
        self.recorder = self.recorder.with_max_duration(max);
        self
    }

    /// Load the saved snapshot, if any, and rebuild pads, grid, and tempo
    pub async fn restore(&self) -> Option<RehydrateReport> {
        let snapshot = self.persistence.load()?;
        let report = persistence::rehydrate(&snapshot, &self.pads, &self.engine).await;
        self.sequencer.set_grid(snapshot.grid);
        self.sequencer.set_tempo(snapshot.tempo.bpm());
        for pad in 0..NUM_PADS {
            self.events.emit(SoundboardEvent::PadChanged { pad });
        }
        Some(report)
    }

    /// Subscribe to display notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SoundboardEvent> {
        self.events.subscribe()
    }

    /// The audio engine
    pub fn engine(&self) -> &Arc<AudioEngine> {
        &self.engine
    }

    // -- Pads --

    /// Snapshot of one pad
    pub fn pad(&self, index: usize) -> Result<Pad, IndexError> {
        self.pads.read().get(index)
    }

    /// Snapshot of all pads
    pub fn pads(&self) -> Vec<Pad> {
        self.pads.read().iter().cloned().collect()
    }

    /// Pad that name and volume edits from the UI apply to
    pub fn selected(&self) -> usize {
        self.selected.load(Ordering::Relaxed)
    }

    /// Select a pad for editing
    pub fn select(&self, index: usize) -> Result<(), IndexError> {
        if index >= NUM_PADS {
            return Err(IndexError::pad(index));
        }
        self.selected.store(index, Ordering::Relaxed);
        Ok(())
    }

    /// Select and play a pad. Returns false for a pad with nothing recorded.
    pub fn trigger(&self, index: usize) -> Result<bool, SoundboardError> {
        let playable = self.pads.read().playable(index)?;
        self.selected.store(index, Ordering::Relaxed);
        match playable {
            Some((buffer, gain)) => {
                self.engine.play(index, &buffer, gain)?;
                Ok(true)
            }
            None => {
                debug!(pad = index, "pad is empty");
                Ok(false)
            }
        }
    }

    /// Trigger the pad mapped to a keyboard key; unmapped keys are ignored
    pub fn trigger_key(&self, key: char) -> Result<Option<usize>, SoundboardError> {
        match index_for_key(key) {
            Some(index) => {
                self.trigger(index)?;
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }

    /// Rename a pad
    pub fn set_name(&self, index: usize, name: &str) -> Result<(), IndexError> {
        self.pads.write().set_name(index, name)?;
        self.pad_changed(index);
        Ok(())
    }

    /// Set a pad's volume from a percent value
    pub fn set_volume(&self, index: usize, percent: f64) -> Result<(), IndexError> {
        self.pads.write().set_volume(index, percent)?;
        self.pad_changed(index);
        Ok(())
    }

    /// Empty one pad
    pub fn clear_pad(&self, index: usize) -> Result<(), IndexError> {
        self.pads.write().clear(index)?;
        self.pad_changed(index);
        Ok(())
    }

    /// Clear every pad and the grid, reset tempo, and delete the saved record.
    ///
    /// A running loop keeps running, silently, at the default tempo.
    pub fn reset_all(&self) {
        self.pads.write().reset_all();
        self.sequencer.clear_grid();
        self.sequencer.set_tempo(Tempo::default().bpm());
        if let Err(e) = self.persistence.clear() {
            warn!("failed to remove saved snapshot: {}", e);
        }
        info!("soundboard reset");
        self.events.emit(SoundboardEvent::PadsReset);
    }

    fn pad_changed(&self, index: usize) {
        self.events.emit(SoundboardEvent::PadChanged { pad: index });
        self.persist();
    }

    // -- Recording --

    /// Start recording into `pad`
    pub async fn start_recording(
        &self,
        pad: usize,
        options: RecordOptions,
    ) -> Result<(), RecordError> {
        self.recorder.start(pad, options).await
    }

    /// Finish the current take. `Ok(None)` when nothing was recording.
    pub async fn stop_recording(&self) -> Result<Option<RecordedSample>, RecordError> {
        let sample = self.recorder.stop().await?;
        if sample.is_some() {
            self.persist();
        }
        Ok(sample)
    }

    /// Recorder state
    pub fn recorder_state(&self) -> RecorderState {
        self.recorder.state()
    }

    // -- Sequencer --

    /// Flip one grid cell
    pub fn toggle_step(&self, pad: usize, step: usize) -> Result<bool, IndexError> {
        let on = self.sequencer.toggle(pad, step)?;
        self.persist();
        Ok(on)
    }

    /// Turn every grid cell off
    pub fn clear_grid(&self) {
        self.sequencer.clear_grid();
        self.persist();
    }

    /// Change tempo; a running loop restarts at the new interval
    pub fn set_tempo(&self, bpm: u32) -> Tempo {
        let tempo = self.sequencer.set_tempo(bpm);
        self.persist();
        tempo
    }

    /// Start the loop
    pub fn start_sequencer(&self) {
        self.sequencer.start();
    }

    /// Stop the loop
    pub fn stop_sequencer(&self) {
        self.sequencer.stop();
    }

    /// Whether the loop is running
    pub fn is_playing(&self) -> bool {
        self.sequencer.is_playing()
    }

    /// Step the next tick will play
    pub fn current_step(&self) -> usize {
        self.sequencer.current_step()
    }

    /// Copy of the grid
    pub fn grid(&self) -> Grid {
        self.sequencer.grid()
    }

    /// Current tempo
    pub fn tempo(&self) -> Tempo {
        self.sequencer.tempo()
    }

    // -- Persistence and export --

    /// Everything that would be saved right now
    pub fn snapshot(&self) -> Snapshot {
        let grid = self.sequencer.grid();
        let tempo = self.sequencer.tempo();
        Snapshot::capture(&self.pads.read(), grid, tempo)
    }

    /// Save immediately and report the outcome
    pub fn save_now(&self) -> Result<(), StoreError> {
        self.persistence.save(&self.snapshot())
    }

    fn persist(&self) {
        if let Err(e) = self.save_now() {
            warn!("failed to save snapshot: {}", e);
        }
    }

    /// Write one pad's recording to `dir`
    pub fn export_pad(&self, index: usize, dir: &Path) -> Result<PathBuf, ExportError> {
        recording::export_pad(&self.pads.read(), index, dir)
    }

    /// Write every recorded pad to `dir`
    pub fn export_all(&self, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
        recording::export_all(&self.pads.read(), dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::testing::{FakeContext, FakeMicrophone};

    /// Store whose writes always fail
    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "quota exceeded",
            )))
        }

        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn board_with_store(store: Arc<dyn KeyValueStore>) -> (Soundboard, FakeContext) {
        let fake = FakeContext::new();
        let events = EventBus::new();
        let mic = FakeMicrophone::new(8000, 1).with_chunks(vec![vec![0.3; 800]]);
        let board = Soundboard::new(fake.engine(events.clone()), mic.device(), store, events);
        (board, fake)
    }

    fn board() -> (Soundboard, FakeContext, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let (board, fake) = board_with_store(store.clone());
        (board, fake, store)
    }

    #[test]
    fn test_trigger_empty_pad_is_silent() {
        let (board, fake, _store) = board();
        assert!(!board.trigger(4).unwrap());
        assert!(fake.played().is_empty());
        assert_eq!(board.selected(), 4);
        assert!(matches!(
            board.trigger(9),
            Err(SoundboardError::Index(_))
        ));
    }

    #[test]
    fn test_trigger_unknown_key() {
        let (board, _fake, _store) = board();
        assert_eq!(board.trigger_key('q').unwrap(), None);
        assert_eq!(board.trigger_key('j').unwrap(), Some(6));
        assert_eq!(board.selected(), 6);
    }

    #[test]
    fn test_edits_persist() {
        let (board, _fake, store) = board();
        board.set_name(1, "Bass").unwrap();
        board.set_volume(1, 40.0).unwrap();

        let saved = Persistence::new(store).load().unwrap();
        assert_eq!(saved.pads[1].name, "Bass");
        assert_eq!(saved.pads[1].volume, 0.4);
    }

    #[tokio::test]
    async fn test_failed_save_does_not_fail_edits() {
        let (board, fake) = board_with_store(Arc::new(FailingStore));

        board.set_name(2, "Kick").unwrap();
        board.set_volume(2, 30.0).unwrap();
        assert!(board.toggle_step(2, 1).unwrap());
        assert_eq!(board.set_tempo(140).bpm(), 140);
        board.clear_pad(5).unwrap();

        board
            .start_recording(2, RecordOptions::default())
            .await
            .unwrap();
        let sample = board.stop_recording().await.unwrap().unwrap();
        assert_eq!(sample.pad, 2);

        let pad = board.pad(2).unwrap();
        assert_eq!(pad.name, "Sample D");
        assert_eq!(pad.volume, 0.3);
        assert!(pad.is_loaded());
        assert!(board.grid().get(2, 1).unwrap());
        assert_eq!(board.tempo().bpm(), 140);

        assert!(board.trigger(2).unwrap());
        assert_eq!(fake.played().len(), 1);

        assert!(matches!(board.save_now(), Err(StoreError::Io(_))));
    }

    #[test]
    fn test_invalid_edit_changes_nothing() {
        let (board, _fake, store) = board();
        assert!(board.set_name(9, "x").is_err());
        assert!(board.toggle_step(0, 4).is_err());
        assert!(store.get(persistence::STORAGE_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_then_trigger() {
        let (board, fake, store) = board();
        board
            .start_recording(0, RecordOptions::default())
            .await
            .unwrap();
        let sample = board.stop_recording().await.unwrap().unwrap();
        assert_eq!(sample.name, "Sample A");

        assert!(board.trigger(0).unwrap());
        assert_eq!(fake.played().len(), 1);

        let saved = Persistence::new(store).load().unwrap();
        assert!(saved.pads[0].encoded_sample.is_some());
    }

    #[tokio::test]
    async fn test_reset_all() {
        let (board, _fake, store) = board();
        board.start_recording(2, RecordOptions::default()).await.unwrap();
        board.stop_recording().await.unwrap();
        board.toggle_step(2, 1).unwrap();
        board.set_tempo(150);

        board.reset_all();

        assert!(board.pads().iter().all(|p| *p == Pad::default()));
        assert_eq!(board.grid(), Grid::new());
        assert_eq!(board.tempo().bpm(), 100);
        assert!(store.get(persistence::STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let (board, _fake, _store) = board();
        board.toggle_step(3, 2).unwrap();
        board.set_tempo(90);

        let snapshot = board.snapshot();
        assert!(snapshot.grid.get(3, 2).unwrap());
        assert_eq!(snapshot.tempo.bpm(), 90);
        assert_eq!(snapshot.pads.len(), NUM_PADS);
    }
}
