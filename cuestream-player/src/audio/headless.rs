//! Headless output
//!
//! Keeps real time with `tokio::time::Instant` and tracks scheduled sources
//! without producing sound. Used when no audio device is wanted, and in
//! runtime tests where tokio's paused clock makes timing deterministic.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::mixer::SourceMixer;
use super::output::{AudioOutput, SourceHandle, SourceRequest};
use super::types::seconds_to_frames;

/// Wall-clock output that renders nothing
#[derive(Debug)]
pub struct HeadlessOutput {
    /// Clock time accumulated before the current run
    elapsed: Duration,
    /// Start of the current run; `None` while suspended
    running_since: Option<Instant>,
    mixer: SourceMixer,
}

impl HeadlessOutput {
    /// Create a running clock at time zero
    pub fn new(sample_rate: u32) -> Self {
        Self {
            elapsed: Duration::ZERO,
            running_since: Some(Instant::now()),
            mixer: SourceMixer::new(sample_rate),
        }
    }

    /// Sources that have not yet finished
    pub fn active_sources(&mut self) -> usize {
        let frame = seconds_to_frames(self.current_time(), self.mixer.sample_rate());
        self.mixer.retire_finished(frame);
        self.mixer.active_count()
    }
}

impl AudioOutput for HeadlessOutput {
    fn current_time(&self) -> f64 {
        let running = self
            .running_since
            .map(|since| since.elapsed())
            .unwrap_or(Duration::ZERO);
        (self.elapsed + running).as_secs_f64()
    }

    fn suspend(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.elapsed += since.elapsed();
            debug!("Headless clock suspended at {:.3}s", self.elapsed.as_secs_f64());
        }
    }

    fn resume(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
            debug!("Headless clock resumed at {:.3}s", self.elapsed.as_secs_f64());
        }
    }

    fn is_suspended(&self) -> bool {
        self.running_since.is_none()
    }

    fn start_source(&mut self, request: SourceRequest) -> SourceHandle {
        let frame = seconds_to_frames(self.current_time(), self.mixer.sample_rate());
        self.mixer.retire_finished(frame);
        self.mixer.add(request)
    }

    fn stop_source(&mut self, handle: SourceHandle) {
        self.mixer.remove(handle);
    }
}
