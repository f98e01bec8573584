// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Snapshot persistence.
//!
//! This module provides:
//! - The durable JSON record (`{pads, seq, bpm}`) under one fixed key
//! - Lenient loading: anything missing falls back to defaults, anything
//!   unreadable means "no snapshot"
//! - Rehydration of pad buffers from their stored encodings, isolated per pad
//!
//! Buffers are never stored, only the data URL of the last recording.

pub mod data_url;
pub mod store;

pub use store::{FileStore, KeyValueStore, MemoryStore};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audio::{AudioBuffer, AudioEngine};
use crate::error::DecodeError;
use crate::pads::{PadStore, SharedPads, DEFAULT_PAD_NAME, DEFAULT_VOLUME, NUM_PADS};
use crate::sequencer::Grid;
use crate::timing::Tempo;

/// Key the record is stored under
pub const STORAGE_KEY: &str = "soundsprite_v1";

/// Storage failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistable projection of one pad
#[derive(Debug, Clone, PartialEq)]
pub struct PadRecord {
    pub name: String,
    pub volume: f64,
    /// Data URL of the last recording
    pub encoded_sample: Option<String>,
}

impl Default for PadRecord {
    fn default() -> Self {
        Self {
            name: DEFAULT_PAD_NAME.to_string(),
            volume: DEFAULT_VOLUME,
            encoded_sample: None,
        }
    }
}

/// Everything that survives a restart
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Exactly `NUM_PADS` entries
    pub pads: Vec<PadRecord>,
    pub grid: Grid,
    pub tempo: Tempo,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            pads: vec![PadRecord::default(); NUM_PADS],
            grid: Grid::new(),
            tempo: Tempo::default(),
        }
    }
}

impl Snapshot {
    /// Project live state into a snapshot
    pub fn capture(pads: &PadStore, grid: Grid, tempo: Tempo) -> Self {
        Self {
            pads: pads
                .iter()
                .map(|p| PadRecord {
                    name: p.name.clone(),
                    volume: p.volume,
                    encoded_sample: p.encoded_sample.clone(),
                })
                .collect(),
            grid,
            tempo,
        }
    }

    /// Serialize to the durable JSON record
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let record = SavedRecord {
            pads: self
                .pads
                .iter()
                .map(|p| SavedPad {
                    name: &p.name,
                    volume: p.volume,
                    data_url: p.encoded_sample.as_deref(),
                })
                .collect(),
            seq: &self.grid,
            bpm: self.tempo.bpm(),
        };
        serde_json::to_string(&record)
    }

    /// Parse a durable record, filling in whatever it leaves out
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let record: StoredRecord = serde_json::from_str(json)?;
        Ok(record.into())
    }
}

/// Wire shape of one pad as written
#[derive(Debug, Serialize)]
struct SavedPad<'a> {
    name: &'a str,
    volume: f64,
    #[serde(rename = "dataURL")]
    data_url: Option<&'a str>,
}

/// Wire shape of the whole record as written; `bpm` is always an integer
#[derive(Debug, Serialize)]
struct SavedRecord<'a> {
    pads: Vec<SavedPad<'a>>,
    seq: &'a Grid,
    bpm: u32,
}

/// Wire shape of one pad as read; every field may be missing in older records
#[derive(Debug, Deserialize)]
struct StoredPad {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    volume: Option<f64>,
    #[serde(rename = "dataURL", default)]
    data_url: Option<String>,
}

/// Wire shape of the whole record as read. `bpm` is accepted as any number.
#[derive(Debug, Deserialize)]
struct StoredRecord {
    #[serde(default)]
    pads: Option<Vec<Option<StoredPad>>>,
    #[serde(default)]
    seq: Option<Grid>,
    #[serde(default)]
    bpm: Option<f64>,
}

impl From<StoredPad> for PadRecord {
    fn from(stored: StoredPad) -> Self {
        let name = stored
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_PAD_NAME.to_string());
        let volume = stored
            .volume
            .filter(|v| v.is_finite())
            .map(|v| v.max(0.0))
            .unwrap_or(DEFAULT_VOLUME);
        Self {
            name,
            volume,
            encoded_sample: stored.data_url.filter(|u| !u.is_empty()),
        }
    }
}

impl From<StoredRecord> for Snapshot {
    fn from(record: StoredRecord) -> Self {
        let mut pads: Vec<PadRecord> = record
            .pads
            .unwrap_or_default()
            .into_iter()
            .take(NUM_PADS)
            .map(|p| p.map(PadRecord::from).unwrap_or_default())
            .collect();
        pads.resize(NUM_PADS, PadRecord::default());

        Self {
            pads,
            grid: record.seq.unwrap_or_default(),
            tempo: Tempo::from_stored(record.bpm),
        }
    }
}

/// Reads and writes the snapshot record
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl Persistence {
    /// Persist under the default key
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, STORAGE_KEY)
    }

    /// Persist under a custom key
    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Overwrite the record with `snapshot`
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let json = snapshot.to_json()?;
        self.store.set(&self.key, &json)?;
        debug!(bytes = json.len(), "snapshot saved");
        Ok(())
    }

    /// Read the record. Missing, unreadable, or malformed means `None`.
    pub fn load(&self) -> Option<Snapshot> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("failed to read snapshot: {}", e);
                return None;
            }
        };
        match Snapshot::from_json(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("ignoring malformed snapshot: {}", e);
                None
            }
        }
    }

    /// Delete the record
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(&self.key)
    }
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence").field("key", &self.key).finish()
    }
}

/// Outcome of restoring pad buffers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RehydrateReport {
    /// Pads that got a playable buffer back
    pub restored: Vec<usize>,
    /// Pads whose stored encoding did not decode; they stay silent
    pub failed: Vec<usize>,
}

async fn decode_encoded(engine: &AudioEngine, encoded: &str) -> Result<AudioBuffer, DecodeError> {
    let bytes: Arc<[u8]> = data_url::decode(encoded)?.into();
    engine.decode(bytes).await
}

/// Restore pad metadata and decode every stored sample.
///
/// Names, volumes, and encodings are applied to all pads first. Each
/// encoding is then decoded on its own; a failure leaves only that pad
/// without a buffer. A pad re-recorded while this runs keeps its new take.
pub async fn rehydrate(
    snapshot: &Snapshot,
    pads: &SharedPads,
    engine: &AudioEngine,
) -> RehydrateReport {
    {
        let mut store = pads.write();
        for (index, record) in snapshot.pads.iter().enumerate().take(NUM_PADS) {
            // Index is always in range here
            let _ = store.restore(
                index,
                &record.name,
                record.volume,
                record.encoded_sample.clone(),
            );
        }
    }

    let mut report = RehydrateReport::default();
    for (index, record) in snapshot.pads.iter().enumerate().take(NUM_PADS) {
        let Some(encoded) = record.encoded_sample.as_deref() else {
            continue;
        };
        match decode_encoded(engine, encoded).await {
            Ok(buffer) => {
                let mut store = pads.write();
                let unchanged = store
                    .iter()
                    .nth(index)
                    .is_some_and(|p| p.encoded_sample.as_deref() == Some(encoded));
                if unchanged && store.attach_buffer(index, Arc::new(buffer)).is_ok() {
                    report.restored.push(index);
                }
            }
            Err(e) => {
                warn!(pad = index, "failed to restore saved sample: {}", e);
                report.failed.push(index);
            }
        }
    }

    info!(
        restored = report.restored.len(),
        failed = report.failed.len(),
        "pads rehydrated"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav;
    use crate::events::EventBus;
    use crate::testing::FakeContext;

    fn encoded_tone(frames: usize, channels: u16) -> String {
        let buffer = AudioBuffer::new(8000, channels, vec![0.2; frames * channels as usize]);
        let bytes = wav::encode_buffer(&buffer).unwrap();
        data_url::encode(&bytes, wav::WAV_MIME)
    }

    fn persistence() -> Persistence {
        Persistence::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_wire_field_names() {
        let mut snapshot = Snapshot::default();
        snapshot.pads[0].encoded_sample = Some("data:x;base64,AA==".into());
        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();

        assert_eq!(json["pads"].as_array().unwrap().len(), 9);
        assert_eq!(json["pads"][0]["dataURL"], "data:x;base64,AA==");
        assert_eq!(json["pads"][1]["dataURL"], serde_json::Value::Null);
        assert_eq!(json["pads"][1]["name"], "Empty");
        assert_eq!(json["pads"][1]["volume"], 1.0);
        assert_eq!(json["seq"].as_array().unwrap().len(), 9);
        assert!(json["bpm"].is_u64());
        assert_eq!(json["bpm"].as_u64(), Some(100));
    }

    #[test]
    fn test_wire_numbers_are_exact() {
        let mut store = PadStore::new();
        store.set_volume(0, 30.0).unwrap();
        store.set_volume(1, 75.0).unwrap();
        let snapshot = Snapshot::capture(&store, Grid::new(), Tempo::new(120));
        let raw = snapshot.to_json().unwrap();

        assert!(raw.contains(r#""volume":0.3,"#));
        assert!(raw.contains(r#""bpm":120}"#));

        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["pads"][0]["volume"].as_f64(), Some(0.3));
        assert_eq!(json["pads"][1]["volume"].as_f64(), Some(0.75));
        assert_eq!(serde_json::from_value::<u32>(json["bpm"].clone()).unwrap(), 120);
    }

    #[test]
    fn test_fractional_stored_bpm_still_loads() {
        let snapshot = Snapshot::from_json(r#"{"bpm": 96.6}"#).unwrap();
        assert_eq!(snapshot.tempo.bpm(), 97);
    }

    #[test]
    fn test_save_load_round_trip() {
        let p = persistence();
        let mut snapshot = Snapshot::default();
        snapshot.pads[2].name = "Kick".into();
        snapshot.pads[2].volume = 0.5;
        snapshot.grid.set(2, 1, true).unwrap();
        snapshot.tempo = Tempo::new(132);

        p.save(&snapshot).unwrap();
        assert_eq!(p.load().unwrap(), snapshot);
    }

    #[test]
    fn test_load_absent_or_malformed_is_none() {
        let store = Arc::new(MemoryStore::new());
        let p = Persistence::new(store.clone());
        assert!(p.load().is_none());

        store.set(STORAGE_KEY, "{not json").unwrap();
        assert!(p.load().is_none());

        store.set(STORAGE_KEY, r#"{"seq": [[true]]}"#).unwrap();
        assert!(p.load().is_none());

        store.set(STORAGE_KEY, "42").unwrap();
        assert!(p.load().is_none());
    }

    #[test]
    fn test_short_record_pads_with_defaults() {
        let json = r#"{
            "pads": [
                {"name": "One", "volume": 0.5, "dataURL": null},
                {"name": "", "volume": 0.25},
                {"volume": 0}
            ]
        }"#;
        let snapshot = Snapshot::from_json(json).unwrap();

        assert_eq!(snapshot.pads.len(), NUM_PADS);
        assert_eq!(snapshot.pads[0].name, "One");
        assert_eq!(snapshot.pads[0].volume, 0.5);
        assert_eq!(snapshot.pads[1].name, "Empty");
        assert_eq!(snapshot.pads[2].volume, 0.0);
        for pad in &snapshot.pads[3..] {
            assert_eq!(*pad, PadRecord::default());
        }
        assert_eq!(snapshot.grid, Grid::new());
        assert_eq!(snapshot.tempo.bpm(), 100);
    }

    #[test]
    fn test_extra_pads_and_null_entries() {
        let mut entries = vec![r#"{"name":"x"}"#.to_string(); 12];
        entries[1] = "null".into();
        let json = format!(r#"{{"pads": [{}], "bpm": 0}}"#, entries.join(","));
        let snapshot = Snapshot::from_json(&json).unwrap();

        assert_eq!(snapshot.pads.len(), NUM_PADS);
        assert_eq!(snapshot.pads[1], PadRecord::default());
        assert_eq!(snapshot.pads[8].name, "x");
        assert_eq!(snapshot.tempo.bpm(), 100);
    }

    #[test]
    fn test_clear_removes_record() {
        let p = persistence();
        p.save(&Snapshot::default()).unwrap();
        p.clear().unwrap();
        assert!(p.load().is_none());
    }

    #[tokio::test]
    async fn test_rehydrate_isolates_failures() {
        let engine = FakeContext::new().engine(EventBus::new());
        let pads = PadStore::shared();
        let mut snapshot = Snapshot::default();
        snapshot.pads[0].encoded_sample = Some(encoded_tone(800, 1));
        snapshot.pads[1].encoded_sample = Some("data:audio/wav;base64,AAAA".into());
        snapshot.pads[2].encoded_sample = Some(encoded_tone(400, 2));
        snapshot.pads[2].name = "Stereo".into();
        snapshot.pads[2].volume = 0.4;

        let report = rehydrate(&snapshot, &pads, &engine).await;
        assert_eq!(report.restored, vec![0, 2]);
        assert_eq!(report.failed, vec![1]);

        let store = pads.read();
        let stereo = store.get(2).unwrap();
        assert!(stereo.is_loaded());
        assert_eq!(stereo.buffer.as_ref().unwrap().channels(), 2);
        assert_eq!(stereo.name, "Stereo");
        assert_eq!(stereo.volume, 0.4);

        let broken = store.get(1).unwrap();
        assert!(!broken.is_loaded());
        assert!(broken.encoded_sample.is_some());

        assert!(!store.get(3).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_round_trip_through_encoding() {
        let source = AudioBuffer::new(22050, 2, vec![0.1; 22050]);
        let encoded = data_url::encode(&wav::encode_buffer(&source).unwrap(), wav::WAV_MIME);
        let engine = FakeContext::new().engine(EventBus::new());

        let decoded = decode_encoded(&engine, &encoded).await.unwrap();
        assert_eq!(decoded.duration(), source.duration());
        assert_eq!(decoded.channels(), source.channels());
    }
}
