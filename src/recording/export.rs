// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! WAV export of recorded pads.
//!
//! Files are named from the pad's display name. Characters that are not
//! safe in file names become `_`, and a bulk export that would write the
//! same name twice adds ` (2)`, ` (3)`, ... to the later files.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::ExportError;
use crate::pads::{Pad, PadStore};
use crate::persistence::data_url;

const EXTENSION: &str = "wav";

/// File stem for a pad: its name made filesystem-safe, else `pad<N>`
fn file_stem(index: usize, pad: &Pad) -> String {
    let cleaned: String = pad
        .name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').trim();
    if cleaned.is_empty() {
        format!("pad{}", index)
    } else {
        cleaned.to_string()
    }
}

fn unique_stem(stem: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(stem.to_lowercase()) {
        return stem;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{} ({})", stem, n);
        if taken.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

fn write_pad(dir: &Path, stem: &str, encoded: &str) -> Result<PathBuf, ExportError> {
    let bytes = data_url::decode(encoded)?;
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.{}", stem, EXTENSION));
    fs::write(&path, bytes)?;
    info!(path = %path.display(), "exported sample");
    Ok(path)
}

/// Write one pad's recording to `dir` and return the file path
pub fn export_pad(pads: &PadStore, index: usize, dir: &Path) -> Result<PathBuf, ExportError> {
    let pad = pads.get(index)?;
    let encoded = pad
        .encoded_sample
        .as_deref()
        .ok_or(ExportError::NoSample { pad: index })?;
    write_pad(dir, &file_stem(index, &pad), encoded)
}

/// Write every recorded pad to `dir`; pads without a recording are skipped
pub fn export_all(pads: &PadStore, dir: &Path) -> Result<Vec<PathBuf>, ExportError> {
    let mut taken = HashSet::new();
    let mut written = Vec::new();
    for (index, pad) in pads.iter().enumerate() {
        let Some(encoded) = pad.encoded_sample.as_deref() else {
            continue;
        };
        let stem = unique_stem(file_stem(index, pad), &mut taken);
        written.push(write_pad(dir, &stem, encoded)?);
    }
    Ok(written)
}
