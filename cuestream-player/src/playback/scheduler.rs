//! Playback scheduler
//!
//! Anchors the audio clock to a position on the media timeline and schedules
//! every buffered chunk at the absolute clock time it must sound. Media time
//! is never stored while playing; it is derived from the anchor:
//!
//! ```text
//! media_now   = anchor.media_time + (clock_now - anchor.clock_time)
//! chunk_clock = anchor.clock_time + (chunk.start_time - anchor.media_time)
//! ```
//!
//! A periodic [`tick`](PlaybackScheduler::tick) watches the gap between the
//! play position and the end of buffered audio. When it falls below the
//! underrun threshold the clock is suspended (`Buffering`); playback resumes
//! once the gap exceeds the resume threshold or everything is buffered.
//!
//! Once everything is buffered the stream is complete: new chunks are
//! discarded, but the transport keeps working on what is buffered, so pause,
//! play and seek stay in lock-step with the video until [`stop`](PlaybackScheduler::stop).
//!
//! Every state change goes through [`transition`](PlaybackScheduler::transition),
//! which logs it and publishes [`EngineEvent::StateChanged`].

use std::sync::Arc;

use chrono::Utc;
use cuestream_common::config::PlaybackSettings;
use cuestream_common::{EngineEvent, EngineState, EventBus};
use tracing::{debug, info};

use super::timeline::{AudioChunk, BufferTimeline};
use crate::audio::{AudioOutput, DecodedBuffer, SourceHandle, SourceRequest};

/// Paired clock/media position taken when playback (re)starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackAnchor {
    /// Audio clock time (seconds)
    pub clock_time: f64,
    /// Media time at `clock_time` (seconds)
    pub media_time: f64,
}

/// Result of handing a decoded chunk to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Added to the timeline
    Buffered,
    /// Added, and the timeline now covers the whole media
    Completed,
    /// Dropped: the stream is complete or stopped
    Discarded,
}

/// Source handed to the output, with the clock time it finishes
#[derive(Debug, Clone, Copy)]
struct ScheduledSource {
    handle: SourceHandle,
    end_time: f64,
}

/// Clock-anchored chunk scheduler and engine state machine
pub struct PlaybackScheduler<O: AudioOutput> {
    output: O,
    events: EventBus,
    timeline: BufferTimeline,
    state: EngineState,
    anchor: Option<PlaybackAnchor>,
    /// Media time frozen at pause, seek and stop boundaries
    frozen_media_time: f64,
    /// Authoritative media length; `<= 0` while unknown
    total_media_duration: f64,
    scheduled: Vec<ScheduledSource>,
    stream_complete: bool,
    underrun_threshold: f64,
    resume_threshold: f64,
}

impl<O: AudioOutput> PlaybackScheduler<O> {
    /// Create an idle scheduler over `output`
    pub fn new(
        output: O,
        settings: &PlaybackSettings,
        sample_rate: u32,
        total_media_duration: f64,
        events: EventBus,
    ) -> Self {
        Self {
            output,
            events,
            timeline: BufferTimeline::new(sample_rate),
            state: EngineState::Idle,
            anchor: None,
            frozen_media_time: 0.0,
            total_media_duration,
            scheduled: Vec::new(),
            stream_complete: false,
            underrun_threshold: settings.underrun_threshold_secs,
            resume_threshold: settings.resume_threshold_secs,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn anchor(&self) -> Option<PlaybackAnchor> {
        self.anchor
    }

    pub fn is_buffering(&self) -> bool {
        self.state == EngineState::Buffering
    }

    pub fn stream_complete(&self) -> bool {
        self.stream_complete
    }

    pub fn timeline(&self) -> &BufferTimeline {
        &self.timeline
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn buffered_duration(&self) -> f64 {
        self.timeline.buffered_duration()
    }

    pub fn total_media_duration(&self) -> f64 {
        self.total_media_duration
    }

    /// Sources started and not yet cancelled or pruned
    pub fn scheduled_sources(&self) -> usize {
        self.scheduled.len()
    }

    /// Current media position, never past the buffered end
    pub fn media_time(&self) -> f64 {
        match self.anchor {
            Some(anchor) => {
                let elapsed = self.output.current_time() - anchor.clock_time;
                (anchor.media_time + elapsed).clamp(0.0, self.buffered_duration())
            }
            None => self.frozen_media_time,
        }
    }

    /// Buffered audio ahead of the play position
    pub fn buffered_ahead(&self) -> f64 {
        self.buffered_duration() - self.media_time()
    }

    /// Whole media is buffered; always false while the length is unknown
    pub fn is_fully_buffered(&self) -> bool {
        self.total_media_duration > 0.0 && self.buffered_duration() >= self.total_media_duration
    }

    /// Single entry point for state changes
    pub fn transition(&mut self, new_state: EngineState) {
        let old_state = self.state;
        if old_state == new_state {
            return;
        }
        self.state = new_state;
        info!("Engine state: {} -> {}", old_state, new_state);
        self.events.emit_lossy(EngineEvent::StateChanged {
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }

    /// Waiting for the stream to go live; the clock runs so the first
    /// chunk can be scheduled the moment it arrives
    pub fn begin_connecting(&mut self) {
        if self.output.is_suspended() {
            self.output.resume();
        }
        self.anchor = None;
        self.transition(EngineState::Connecting);
    }

    /// Start (or restart) playback at the frozen media position
    ///
    /// Used for Connecting -> Playing and Paused -> Playing.
    pub fn start_playback(&mut self) {
        if self.output.is_suspended() {
            self.output.resume();
        }
        let media_time = self.frozen_media_time.min(self.buffered_duration());
        self.restart_from(media_time);
        self.transition(EngineState::Playing);
    }

    /// Freeze media time and cancel everything scheduled
    pub fn pause(&mut self) {
        match self.state {
            EngineState::Playing | EngineState::Buffering => {
                self.frozen_media_time = self.media_time();
                self.anchor = None;
                self.output.suspend();
                self.cancel_all();
                self.transition(EngineState::Paused);
            }
            EngineState::Connecting => {
                self.output.suspend();
                self.transition(EngineState::Paused);
            }
            EngineState::Stopped => self.cancel_all(),
            EngineState::Idle | EngineState::Paused => {}
        }
    }

    /// Move the play position; returns the clamped target
    ///
    /// Playing: cancel, re-anchor at the target and reschedule. Buffering:
    /// re-anchor and re-check whether enough is buffered to continue.
    /// Stopped: no effect. Other states only move the frozen position.
    pub fn seek(&mut self, requested: f64) -> f64 {
        if self.state == EngineState::Stopped {
            return self.media_time();
        }
        let buffered = self.buffered_duration();
        let effective = if requested.is_nan() {
            0.0
        } else {
            requested.clamp(0.0, buffered)
        };

        if effective != requested {
            debug!(
                "Seek to {:.3}s clamped to {:.3}s (buffered {:.3}s)",
                requested, effective, buffered
            );
            self.events.emit_lossy(EngineEvent::SeekClamped {
                requested,
                effective,
                timestamp: Utc::now(),
            });
        }

        match self.state {
            EngineState::Playing => self.restart_from(effective),
            EngineState::Buffering => {
                self.anchor = Some(PlaybackAnchor {
                    clock_time: self.output.current_time(),
                    media_time: effective,
                });
                self.try_resume();
            }
            _ => self.frozen_media_time = effective,
        }

        info!("Seek to {:.3}s ({})", effective, self.state);
        effective
    }

    /// Append a decoded chunk and act on it according to the current state
    pub fn push_chunk(&mut self, buffer: DecodedBuffer) -> ChunkOutcome {
        if self.stream_complete || self.state == EngineState::Stopped {
            debug!(
                "Discarding {:.3}s chunk after end of stream",
                buffer.duration()
            );
            return ChunkOutcome::Discarded;
        }

        let chunk = self.timeline.append(buffer);
        debug!(
            "Buffered chunk {:.3}s..{:.3}s (total {:.3}s)",
            chunk.start_time,
            chunk.end_time(),
            self.buffered_duration()
        );

        match self.state {
            EngineState::Playing => self.schedule_chunk(&chunk),
            EngineState::Connecting => self.start_playback(),
            EngineState::Buffering => {
                self.try_resume();
            }
            _ => {}
        }

        if self.complete_if_fully_buffered() {
            ChunkOutcome::Completed
        } else {
            ChunkOutcome::Buffered
        }
    }

    /// Update the media length and re-check for end of stream
    ///
    /// Returns true if this completed the stream. Ignored once complete.
    pub fn set_total_media_duration(&mut self, duration: f64) -> bool {
        if self.stream_complete {
            debug!("Stream already complete, keeping total of {:.3}s", self.total_media_duration);
            return false;
        }
        self.total_media_duration = if duration.is_finite() { duration } else { 0.0 };
        info!("Total media duration set to {:.3}s", self.total_media_duration);
        self.complete_if_fully_buffered()
    }

    /// Periodic poll: prune finished sources and detect underrun
    pub fn tick(&mut self) {
        let now = self.output.current_time();
        self.scheduled.retain(|s| s.end_time > now);

        if self.state == EngineState::Playing
            && !self.stream_complete
            && self.buffered_ahead() < self.underrun_threshold
            && !self.is_fully_buffered()
        {
            self.enter_buffering();
        }
    }

    /// Leave Buffering if enough audio is ahead; returns true if resumed
    pub fn try_resume(&mut self) -> bool {
        if self.state != EngineState::Buffering {
            return false;
        }
        let ahead = self.buffered_ahead();
        if ahead <= self.resume_threshold && !self.is_fully_buffered() {
            return false;
        }

        let media_time = self.media_time();
        self.events.emit_lossy(EngineEvent::BufferingEnded {
            media_time,
            buffered_duration: self.buffered_duration(),
            timestamp: Utc::now(),
        });
        self.output.resume();
        self.restart_from(media_time);
        self.transition(EngineState::Playing);
        true
    }

    /// Treat what is buffered as the whole media
    ///
    /// Used when the connection ends early and the remaining audio should
    /// play out without stalling.
    pub fn truncate_to_buffered(&mut self) -> bool {
        let buffered = self.buffered_duration();
        info!("Treating {:.3}s of buffered audio as the complete stream", buffered);
        self.total_media_duration = buffered;
        if buffered > 0.0 {
            self.try_resume();
        }
        self.complete_if_fully_buffered()
    }

    /// Terminal stop: cancel sources, drop buffered audio, clear the anchor
    pub fn stop(&mut self) {
        self.cancel_all();
        self.timeline.reset();
        self.anchor = None;
        self.frozen_media_time = 0.0;
        if !self.output.is_suspended() {
            self.output.suspend();
        }
        self.transition(EngineState::Stopped);
    }

    fn enter_buffering(&mut self) {
        let media_time = self.media_time();
        info!(
            "Underrun at {:.3}s with {:.3}s buffered",
            media_time,
            self.buffered_duration()
        );
        self.events.emit_lossy(EngineEvent::BufferingStarted {
            media_time,
            buffered_duration: self.buffered_duration(),
            timestamp: Utc::now(),
        });
        // Re-anchor at the stall point so later chunks cannot move it
        self.anchor = Some(PlaybackAnchor {
            clock_time: self.output.current_time(),
            media_time,
        });
        self.output.suspend();
        self.cancel_all();
        self.transition(EngineState::Buffering);
    }

    /// Once everything is buffered: accept no more chunks
    ///
    /// State, anchor and scheduled sources are untouched, so the buffered
    /// audio plays out and stays under transport control.
    fn complete_if_fully_buffered(&mut self) -> bool {
        if self.stream_complete || self.state == EngineState::Stopped || !self.is_fully_buffered() {
            return false;
        }

        // A stall always ends once everything is buffered
        self.try_resume();
        self.stream_complete = true;
        info!(
            "Stream complete: {:.3}s buffered of {:.3}s",
            self.buffered_duration(),
            self.total_media_duration
        );
        self.events.emit_lossy(EngineEvent::StreamCompleted {
            buffered_duration: self.buffered_duration(),
            timestamp: Utc::now(),
        });
        true
    }

    /// Cancel everything, anchor at `media_time` now, schedule what remains
    fn restart_from(&mut self, media_time: f64) {
        self.cancel_all();
        self.anchor = Some(PlaybackAnchor {
            clock_time: self.output.current_time(),
            media_time,
        });
        let chunks: Vec<Arc<AudioChunk>> = self.timeline.chunks_from(media_time).to_vec();
        for chunk in &chunks {
            self.schedule_chunk(chunk);
        }
    }

    fn schedule_chunk(&mut self, chunk: &AudioChunk) {
        let Some(anchor) = self.anchor else {
            return;
        };
        let now = self.output.current_time();
        let start = anchor.clock_time + (chunk.start_time - anchor.media_time);
        let end = start + chunk.duration;

        if end <= now {
            debug!("Skipping past-due chunk at {:.3}s", chunk.start_time);
            return;
        }

        let (when, offset) = if start < now {
            (now, now - start)
        } else {
            (start, 0.0)
        };
        let request = SourceRequest {
            buffer: Arc::clone(&chunk.buffer),
            when,
            offset,
            duration: chunk.duration - offset,
        };
        debug!(
            "Scheduling chunk {:.3}s at clock {:.3}s (offset {:.3}s)",
            chunk.start_time, when, offset
        );
        let handle = self.output.start_source(request);
        self.scheduled.push(ScheduledSource {
            handle,
            end_time: end,
        });
    }

    fn cancel_all(&mut self) {
        if self.scheduled.is_empty() {
            return;
        }
        debug!("Cancelling {} scheduled sources", self.scheduled.len());
        for source in self.scheduled.drain(..) {
            self.output.stop_source(source.handle);
        }
    }
}
