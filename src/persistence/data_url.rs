// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! `data:<mime>;base64,<payload>` text encoding for sample bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::DecodeError;

const MARKER: &str = ";base64,";

/// Encode `bytes` as a base64 data URL
pub fn encode(bytes: &[u8], mime: &str) -> String {
    format!("data:{}{}{}", mime, MARKER, STANDARD.encode(bytes))
}

/// Decode a base64 data URL back into bytes. The MIME type is not checked.
pub fn decode(url: &str) -> Result<Vec<u8>, DecodeError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| DecodeError::DataUrl("missing `data:` prefix".to_string()))?;
    let (_, payload) = rest
        .split_once(MARKER)
        .ok_or_else(|| DecodeError::DataUrl("not base64 encoded".to_string()))?;
    Ok(STANDARD.decode(payload.trim())?)
}
