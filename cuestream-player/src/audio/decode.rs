//! Chunk decoder
//!
//! Converts one binary frame from the session (16-bit signed little-endian,
//! interleaved PCM in [`STREAM_FORMAT`]) into a planar f32 [`DecodedBuffer`].
//!
//! Decoding is lenient: a byte length that is not a whole number of frames
//! rounds the frame count up and fills the missing samples with silence
//! instead of rejecting the chunk. The functions here are pure and can be
//! called from any thread.

use cuestream_common::protocol::{PcmFormat, STREAM_FORMAT};
use tracing::debug;

use super::types::DecodedBuffer;

/// Full-scale divisor for 16-bit PCM
const I16_SCALE: f32 = 32768.0;

/// Decode a binary frame in the connection-wide stream format
pub fn decode_chunk(bytes: &[u8]) -> DecodedBuffer {
    decode_pcm_s16le(bytes, STREAM_FORMAT)
}

/// Decode interleaved s16le PCM with an explicit layout
///
/// Channel `c` of frame `i` is read from interleaved sample `i * channels + c`.
pub fn decode_pcm_s16le(bytes: &[u8], format: PcmFormat) -> DecodedBuffer {
    let channels = format.channels.max(1) as usize;
    let frame_bytes = channels * 2;
    let frames = bytes.len().div_ceil(frame_bytes);

    if bytes.len() % frame_bytes != 0 {
        debug!(
            "Chunk of {} bytes is not a whole number of {}-byte frames, padding last frame with silence",
            bytes.len(),
            frame_bytes
        );
    }

    let mut planar = vec![vec![0.0f32; frames]; channels];
    for (index, pair) in bytes.chunks_exact(2).enumerate() {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        planar[index % channels][index / channels] = sample as f32 / I16_SCALE;
    }

    DecodedBuffer::new(planar, format.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_deinterleave_and_normalize() {
        let bytes = encode(&[i16::MIN, 16384, 0, -16384]);
        let buffer = decode_chunk(&bytes);

        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.sample_rate(), 48_000);
        assert_eq!(buffer.channel(0), &[-1.0, 0.0]);
        assert_eq!(buffer.channel(1), &[0.5, -0.5]);
    }

    #[test]
    fn test_full_scale_positive_stays_below_one() {
        let buffer = decode_chunk(&encode(&[i16::MAX, i16::MAX]));
        assert!(buffer.sample(0, 0) < 1.0);
        assert!((buffer.sample(0, 0) - 32767.0 / 32768.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_frame_is_zero_padded() {
        // Three samples: one whole frame plus a lone left sample
        let buffer = decode_chunk(&encode(&[100, 200, 300]));
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.sample(0, 1), 300.0 / 32768.0);
        assert_eq!(buffer.sample(1, 1), 0.0);
    }

    #[test]
    fn test_trailing_odd_byte_is_silence() {
        let mut bytes = encode(&[1000, 2000]);
        bytes.push(0x7f);
        let buffer = decode_chunk(&bytes);
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.sample(0, 1), 0.0);
        assert_eq!(buffer.sample(1, 1), 0.0);
    }

    #[test]
    fn test_empty_input() {
        let buffer = decode_chunk(&[]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.duration(), 0.0);
    }

    #[test]
    fn test_one_second_of_audio() {
        let bytes = vec![0u8; 48_000 * 4];
        let buffer = decode_chunk(&bytes);
        assert!((buffer.duration() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mono_layout() {
        let format = PcmFormat {
            sample_rate: 16_000,
            channels: 1,
            bytes_per_sample: 2,
        };
        let buffer = decode_pcm_s16le(&encode(&[8192, -8192, 0]), format);
        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.channel(0), &[0.25, -0.25, 0.0]);
    }
}
