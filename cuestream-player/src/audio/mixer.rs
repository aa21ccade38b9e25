//! Frame-accurate mixing of scheduled sources
//!
//! Holds every source started on an output and sums them into interleaved
//! f32 frames on demand. Positions are kept in output frames so a source
//! lands on the exact frame its clock time maps to.
//!
//! Buffers decoded at a rate other than the output rate are read with
//! nearest-frame lookup.

use std::sync::Arc;

use super::output::{SourceHandle, SourceRequest};
use super::types::{seconds_to_frames, DecodedBuffer};

/// One scheduled source, positioned in output frames
#[derive(Debug, Clone)]
struct MixSource {
    handle: SourceHandle,
    buffer: Arc<DecodedBuffer>,
    /// Output frame the first sample plays on
    start_frame: u64,
    /// Frames to play (output rate)
    frames: u64,
    /// In-point into the buffer (buffer rate)
    offset_frame: u64,
}

impl MixSource {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.frames
    }
}

/// Mixes sources against an output frame clock
#[derive(Debug)]
pub struct SourceMixer {
    sample_rate: u32,
    sources: Vec<MixSource>,
    next_handle: u64,
}

impl SourceMixer {
    /// Create an empty mixer rendering at `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            sources: Vec::new(),
            next_handle: 1,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Add a source and return its handle
    pub fn add(&mut self, request: SourceRequest) -> SourceHandle {
        let handle = SourceHandle(self.next_handle);
        self.next_handle += 1;

        let source = MixSource {
            handle,
            start_frame: seconds_to_frames(request.when, self.sample_rate),
            frames: seconds_to_frames(request.duration, self.sample_rate),
            offset_frame: seconds_to_frames(request.offset, request.buffer.sample_rate()),
            buffer: request.buffer,
        };
        self.sources.push(source);
        handle
    }

    /// Remove a source; unknown handles are ignored
    pub fn remove(&mut self, handle: SourceHandle) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.handle != handle);
        self.sources.len() != before
    }

    /// Drop sources that have finished by `clock_frame`
    pub fn retire_finished(&mut self, clock_frame: u64) {
        self.sources.retain(|s| s.end_frame() > clock_frame);
    }

    /// Number of sources not yet retired
    pub fn active_count(&self) -> usize {
        self.sources.len()
    }

    /// Mix into interleaved `out`, whose first frame is `clock_frame`
    ///
    /// `out` is added to, not overwritten, so callers clear it first.
    pub fn render(&self, clock_frame: u64, out: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let out_frames = (out.len() / channels) as u64;
        let window_end = clock_frame + out_frames;

        for source in &self.sources {
            let begin = source.start_frame.max(clock_frame);
            let end = source.end_frame().min(window_end);
            if begin >= end {
                continue;
            }

            let src_channels = source.buffer.channel_count();
            let ratio = source.buffer.sample_rate() as f64 / self.sample_rate as f64;

            for frame in begin..end {
                let elapsed = frame - source.start_frame;
                let src_frame = source.offset_frame as usize + (elapsed as f64 * ratio) as usize;
                let out_index = (frame - clock_frame) as usize * channels;

                for ch in 0..channels {
                    // Mono sources feed every output channel
                    let src_ch = if src_channels == 1 { 0 } else { ch };
                    if src_ch < src_channels {
                        out[out_index + ch] += source.buffer.sample(src_ch, src_frame);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> Arc<DecodedBuffer> {
        let left: Vec<f32> = (0..frames).map(|i| i as f32 / 100.0).collect();
        let right: Vec<f32> = left.iter().map(|s| -s).collect();
        Arc::new(DecodedBuffer::new(vec![left, right], 100))
    }

    #[test]
    fn test_source_lands_on_scheduled_frame() {
        let mut mixer = SourceMixer::new(100);
        mixer.add(SourceRequest {
            buffer: ramp(10),
            when: 0.05,
            offset: 0.0,
            duration: 0.1,
        });

        let mut out = vec![0.0f32; 20];
        mixer.render(0, &mut out, 2);

        // Frames 0..5 silent, frames 5..10 carry buffer frames 0..5
        assert!(out[..10].iter().all(|s| *s == 0.0));
        assert_eq!(out[12], 0.01);
        assert_eq!(out[13], -0.01);
    }

    #[test]
    fn test_offset_skips_into_buffer() {
        let mut mixer = SourceMixer::new(100);
        mixer.add(SourceRequest {
            buffer: ramp(10),
            when: 0.0,
            offset: 0.04,
            duration: 0.06,
        });

        let mut out = vec![0.0f32; 4];
        mixer.render(0, &mut out, 2);
        assert_eq!(out[0], 0.04);
        assert_eq!(out[2], 0.05);
    }

    #[test]
    fn test_removed_source_is_silent() {
        let mut mixer = SourceMixer::new(100);
        let handle = mixer.add(SourceRequest {
            buffer: ramp(10),
            when: 0.0,
            offset: 0.0,
            duration: 0.1,
        });
        assert!(mixer.remove(handle));
        assert!(!mixer.remove(handle));

        let mut out = vec![0.0f32; 8];
        mixer.render(0, &mut out, 2);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_retire_finished() {
        let mut mixer = SourceMixer::new(100);
        mixer.add(SourceRequest {
            buffer: ramp(10),
            when: 0.0,
            offset: 0.0,
            duration: 0.1,
        });
        mixer.add(SourceRequest {
            buffer: ramp(10),
            when: 0.1,
            offset: 0.0,
            duration: 0.1,
        });

        mixer.retire_finished(10);
        assert_eq!(mixer.active_count(), 1);
        mixer.retire_finished(20);
        assert_eq!(mixer.active_count(), 0);
    }

    #[test]
    fn test_mono_source_feeds_both_channels() {
        let mut mixer = SourceMixer::new(100);
        mixer.add(SourceRequest {
            buffer: Arc::new(DecodedBuffer::new(vec![vec![0.5; 4]], 100)),
            when: 0.0,
            offset: 0.0,
            duration: 0.04,
        });

        let mut out = vec![0.0f32; 4];
        mixer.render(0, &mut out, 2);
        assert_eq!(out, vec![0.5, 0.5, 0.5, 0.5]);
    }
}
