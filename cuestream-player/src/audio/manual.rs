//! Hand-driven audio output
//!
//! The clock moves only when [`ManualOutput::advance`] or
//! [`ManualOutput::render`] is called, which makes scheduling decisions
//! reproducible in tests. Every started and stopped source is recorded.

use super::mixer::SourceMixer;
use super::output::{AudioOutput, SourceHandle, SourceRequest};
use super::types::{frames_to_seconds, seconds_to_frames};

/// Manually clocked output
#[derive(Debug)]
pub struct ManualOutput {
    time: f64,
    suspended: bool,
    mixer: SourceMixer,
    started: Vec<(SourceHandle, SourceRequest)>,
    stopped: Vec<SourceHandle>,
    suspend_calls: usize,
    resume_calls: usize,
}

impl ManualOutput {
    /// Create a running clock at time zero
    pub fn new(sample_rate: u32) -> Self {
        Self {
            time: 0.0,
            suspended: false,
            mixer: SourceMixer::new(sample_rate),
            started: Vec::new(),
            stopped: Vec::new(),
            suspend_calls: 0,
            resume_calls: 0,
        }
    }

    /// Move the clock forward; no effect while suspended
    pub fn advance(&mut self, seconds: f64) {
        if !self.suspended {
            self.time += seconds;
        }
    }

    /// Render `frames` interleaved stereo frames and advance the clock past them
    ///
    /// A suspended clock renders silence and does not move.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * 2];
        if self.suspended {
            return out;
        }
        let rate = self.mixer.sample_rate();
        let clock_frame = seconds_to_frames(self.time, rate);
        self.mixer.render(clock_frame, &mut out, 2);
        self.time = frames_to_seconds(clock_frame + frames as u64, rate);
        out
    }

    /// Every source started so far, in order
    pub fn started(&self) -> &[(SourceHandle, SourceRequest)] {
        &self.started
    }

    /// Every cancellation so far, in order
    pub fn stopped(&self) -> &[SourceHandle] {
        &self.stopped
    }

    /// Sources started and not cancelled
    pub fn live_sources(&self) -> Vec<&SourceRequest> {
        self.started
            .iter()
            .filter(|(handle, _)| !self.stopped.contains(handle))
            .map(|(_, request)| request)
            .collect()
    }

    pub fn suspend_calls(&self) -> usize {
        self.suspend_calls
    }

    pub fn resume_calls(&self) -> usize {
        self.resume_calls
    }

    /// Forget recorded starts and stops (the mixer is untouched)
    pub fn clear_log(&mut self) {
        self.started.clear();
        self.stopped.clear();
    }
}

impl AudioOutput for ManualOutput {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn suspend(&mut self) {
        self.suspend_calls += 1;
        self.suspended = true;
    }

    fn resume(&mut self) {
        self.resume_calls += 1;
        self.suspended = false;
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn start_source(&mut self, request: SourceRequest) -> SourceHandle {
        let handle = self.mixer.add(request.clone());
        self.started.push((handle, request));
        handle
    }

    fn stop_source(&mut self, handle: SourceHandle) {
        self.mixer.remove(handle);
        self.stopped.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::types::DecodedBuffer;
    use std::sync::Arc;

    #[test]
    fn test_suspended_clock_does_not_advance() {
        let mut output = ManualOutput::new(48_000);
        output.advance(0.5);
        output.suspend();
        output.advance(10.0);
        assert_eq!(output.current_time(), 0.5);
        output.resume();
        output.advance(0.25);
        assert_eq!(output.current_time(), 0.75);
    }

    #[test]
    fn test_render_plays_scheduled_source() {
        let mut output = ManualOutput::new(100);
        let buffer = Arc::new(DecodedBuffer::new(vec![vec![0.25; 10], vec![0.5; 10]], 100));
        output.start_source(SourceRequest {
            buffer,
            when: 0.02,
            offset: 0.0,
            duration: 0.1,
        });

        let out = output.render(4);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 0.0, 0.25, 0.5, 0.25, 0.5]);
        assert!((output.current_time() - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_live_sources_excludes_stopped() {
        let mut output = ManualOutput::new(100);
        let buffer = Arc::new(DecodedBuffer::silence(2, 10, 100));
        let first = output.start_source(SourceRequest {
            buffer: buffer.clone(),
            when: 0.0,
            offset: 0.0,
            duration: 0.1,
        });
        output.start_source(SourceRequest {
            buffer,
            when: 0.1,
            offset: 0.0,
            duration: 0.1,
        });
        output.stop_source(first);

        assert_eq!(output.live_sources().len(), 1);
        assert_eq!(output.live_sources()[0].when, 0.1);
    }
}
