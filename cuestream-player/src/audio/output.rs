//! Audio output seam
//!
//! The scheduler drives playback through [`AudioOutput`]: a monotonic clock
//! that can be suspended, plus one-shot sources started at absolute clock
//! times. Implementations:
//! - [`ManualOutput`](super::manual::ManualOutput): hand-advanced clock for tests
//! - [`HeadlessOutput`](super::headless::HeadlessOutput): tokio clock, no sound
//! - `DeviceOutput`: cpal device stream (feature `device-output`)

use std::sync::Arc;

use super::types::DecodedBuffer;

/// Identifies a started source so it can be cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceHandle(pub u64);

/// Request to play part of a buffer at an absolute clock time
#[derive(Debug, Clone)]
pub struct SourceRequest {
    /// Shared decoded audio; the timeline keeps the same allocation
    pub buffer: Arc<DecodedBuffer>,
    /// Clock time (seconds) the first rendered sample lands on
    pub when: f64,
    /// In-point into the buffer (seconds)
    pub offset: f64,
    /// Amount of the buffer to play from `offset` (seconds)
    pub duration: f64,
}

impl SourceRequest {
    /// Clock time the source finishes
    pub fn end_time(&self) -> f64 {
        self.when + self.duration
    }
}

/// Audio clock plus source scheduling
///
/// The clock only advances while not suspended. Starting a source never
/// fails: a device that cannot play simply renders nothing.
pub trait AudioOutput {
    /// Current clock time in seconds
    fn current_time(&self) -> f64;

    /// Freeze the clock
    fn suspend(&mut self);

    /// Unfreeze the clock
    fn resume(&mut self);

    fn is_suspended(&self) -> bool;

    /// Schedule a source to play
    fn start_source(&mut self, request: SourceRequest) -> SourceHandle;

    /// Cancel a source, whether pending, playing or already finished
    fn stop_source(&mut self, handle: SourceHandle);
}
