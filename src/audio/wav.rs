// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! WAV encoding of captured audio and decoding back to buffers.
//!
//! Captures are stored as 16-bit PCM; decoding accepts any integer width
//! hound can read plus 32-bit float.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::buffer::AudioBuffer;
use crate::error::DecodeError;

/// MIME type used in data URLs for encoded samples
pub const WAV_MIME: &str = "audio/wav";

/// Bit depth written for captured audio
const CAPTURE_BITS: u16 = 16;

/// Encode interleaved chunks as one WAV blob
pub fn encode<'a, I>(chunks: I, sample_rate: u32, channels: u16) -> Result<Vec<u8>, hound::Error>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let spec = WavSpec {
        channels: channels.max(1),
        sample_rate: sample_rate.max(1),
        bits_per_sample: CAPTURE_BITS,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for chunk in chunks {
            for &sample in chunk {
                let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                writer.write_sample(scaled)?;
            }
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Encode a whole buffer (used by export and tests)
pub fn encode_buffer(buffer: &AudioBuffer) -> Result<Vec<u8>, hound::Error> {
    encode(
        std::iter::once(buffer.samples()),
        buffer.sample_rate(),
        buffer.channels(),
    )
}

/// Decode WAV bytes into a playable buffer
pub fn decode(bytes: &[u8]) -> Result<AudioBuffer, DecodeError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ 1..=32) => {
            let max = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|x| x as f32 / max))
                .collect::<Result<_, _>>()?
        }
        (SampleFormat::Float, bits) => {
            return Err(DecodeError::UnsupportedFormat { bits, format: "float" })
        }
        (SampleFormat::Int, bits) => {
            return Err(DecodeError::UnsupportedFormat { bits, format: "int" })
        }
    };

    let buffer = AudioBuffer::new(spec.sample_rate, spec.channels, samples);
    if buffer.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frames: usize, channels: u16) -> Vec<f32> {
        (0..frames * channels as usize)
            .map(|i| ((i / channels as usize) as f32 * 0.05).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_encode_decode_preserves_shape() {
        let samples = sine(4410, 2);
        let bytes = encode(std::iter::once(samples.as_slice()), 44100, 2).unwrap();
        let buffer = decode(&bytes).unwrap();

        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.frames(), 4410);
        assert!((buffer.samples()[10] - samples[10]).abs() < 1e-3);
    }

    #[test]
    fn test_chunks_are_concatenated_in_order() {
        let first = vec![0.25f32; 100];
        let second = vec![-0.25f32; 50];
        let bytes = encode([first.as_slice(), second.as_slice()], 8000, 1).unwrap();
        let buffer = decode(&bytes).unwrap();

        assert_eq!(buffer.frames(), 150);
        assert!(buffer.samples()[99] > 0.0);
        assert!(buffer.samples()[100] < 0.0);
    }

    #[test]
    fn test_decode_float_wav() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for s in [0.1f32, 0.2, 0.3] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }

        let buffer = decode(&cursor.into_inner()).unwrap();
        assert_eq!(buffer.samples(), &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = decode(b"definitely not a riff header");
        assert!(matches!(result, Err(DecodeError::Wav(_))));
    }

    #[test]
    fn test_decode_empty_capture_fails() {
        let bytes = encode(std::iter::empty::<&[f32]>(), 44100, 1).unwrap();
        assert!(matches!(decode(&bytes), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_samples_are_clamped() {
        let loud = vec![4.0f32, -4.0];
        let bytes = encode(std::iter::once(loud.as_slice()), 8000, 1).unwrap();
        let buffer = decode(&bytes).unwrap();
        assert!(buffer.samples()[0] <= 1.0);
        assert!(buffer.samples()[1] >= -1.0);
    }
}
