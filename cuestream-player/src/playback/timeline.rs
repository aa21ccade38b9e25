//! Buffer timeline
//!
//! Append-only ledger of decoded chunks laid end to end on the media
//! timeline. Each chunk starts exactly where the previous one ended, so the
//! sequence is contiguous and sorted by construction.
//!
//! Positions are tracked in frames at the stream rate to avoid drift from
//! summing floating-point durations over long sessions.

use std::sync::Arc;

use crate::audio::types::{frames_to_seconds, seconds_to_frames};
use crate::audio::DecodedBuffer;

/// One decoded unit of audio placed on the media timeline
///
/// Immutable once created. The buffer is shared with any scheduled source.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Decoded samples
    pub buffer: Arc<DecodedBuffer>,
    /// First frame on the media timeline
    pub start_frame: u64,
    /// Length in frames
    pub frames: u64,
    /// Media time of the first sample (seconds)
    pub start_time: f64,
    /// Length (seconds)
    pub duration: f64,
}

impl AudioChunk {
    /// Media time just past the last sample
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Ordered ledger of buffered chunks
#[derive(Debug)]
pub struct BufferTimeline {
    sample_rate: u32,
    chunks: Vec<Arc<AudioChunk>>,
    total_frames: u64,
}

impl BufferTimeline {
    /// Create an empty timeline counting frames at `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            chunks: Vec::new(),
            total_frames: 0,
        }
    }

    /// Place a buffer after everything already buffered
    pub fn append(&mut self, buffer: DecodedBuffer) -> Arc<AudioChunk> {
        let frames = if buffer.sample_rate() == self.sample_rate {
            buffer.frames() as u64
        } else {
            seconds_to_frames(buffer.duration(), self.sample_rate)
        };
        let start_frame = self.total_frames;

        let chunk = Arc::new(AudioChunk {
            buffer: Arc::new(buffer),
            start_frame,
            frames,
            start_time: frames_to_seconds(start_frame, self.sample_rate),
            duration: frames_to_seconds(frames, self.sample_rate),
        });

        self.total_frames += frames;
        self.chunks.push(Arc::clone(&chunk));
        chunk
    }

    /// Drop every chunk and return to zero
    pub fn reset(&mut self) {
        self.chunks.clear();
        self.total_frames = 0;
    }

    /// Total buffered media (seconds)
    pub fn buffered_duration(&self) -> f64 {
        frames_to_seconds(self.total_frames, self.sample_rate)
    }

    /// Total buffered media (frames)
    pub fn buffered_frames(&self) -> u64 {
        self.total_frames
    }

    /// Chunks whose end lies after `media_time`, in order
    pub fn chunks_from(&self, media_time: f64) -> &[Arc<AudioChunk>] {
        let frame = seconds_to_frames(media_time, self.sample_rate);
        let first = self
            .chunks
            .partition_point(|c| c.start_frame + c.frames <= frame);
        &self.chunks[first..]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<AudioChunk>> {
        self.chunks.iter()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seconds(secs: f64) -> DecodedBuffer {
        DecodedBuffer::silence(2, (secs * 48_000.0) as usize, 48_000)
    }

    #[test]
    fn test_chunks_are_contiguous() {
        let mut timeline = BufferTimeline::new(48_000);
        let durations = [0.5, 1.25, 0.1, 2.0];
        for d in durations {
            timeline.append(seconds(d));
        }

        let mut expected_start = 0.0;
        for (chunk, d) in timeline.iter().zip(durations) {
            assert!((chunk.start_time - expected_start).abs() < 1e-9);
            assert!((chunk.duration - d).abs() < 1e-9);
            expected_start += d;
        }
        assert!((timeline.buffered_duration() - 3.85).abs() < 1e-9);
        assert_eq!(timeline.len(), 4);
    }

    #[test]
    fn test_append_returns_placed_chunk() {
        let mut timeline = BufferTimeline::new(48_000);
        timeline.append(seconds(1.0));
        let chunk = timeline.append(seconds(0.5));
        assert_eq!(chunk.start_frame, 48_000);
        assert_eq!(chunk.frames, 24_000);
        assert!((chunk.end_time() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_chunk_adds_nothing() {
        let mut timeline = BufferTimeline::new(48_000);
        timeline.append(seconds(1.0));
        timeline.append(DecodedBuffer::silence(2, 0, 48_000));
        assert_eq!(timeline.buffered_frames(), 48_000);
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn test_chunks_from_skips_finished() {
        let mut timeline = BufferTimeline::new(48_000);
        for _ in 0..4 {
            timeline.append(seconds(1.0));
        }

        assert_eq!(timeline.chunks_from(0.0).len(), 4);
        assert_eq!(timeline.chunks_from(1.0).len(), 3);
        assert_eq!(timeline.chunks_from(1.5).len(), 3);
        assert_eq!(timeline.chunks_from(1.5)[0].start_frame, 48_000);
        assert!(timeline.chunks_from(4.0).is_empty());
    }

    #[test]
    fn test_reset() {
        let mut timeline = BufferTimeline::new(48_000);
        timeline.append(seconds(1.0));
        timeline.reset();
        assert!(timeline.is_empty());
        assert_eq!(timeline.buffered_duration(), 0.0);
        let chunk = timeline.append(seconds(1.0));
        assert_eq!(chunk.start_time, 0.0);
    }
}
