//! Logical timeline ↔ render clock mapping.
//!
//! The player timeline (seconds into the file) is anchored to the source's player
//! time by a single value, `time_at_start`: the logical time that player sample 0
//! corresponds to. Every conversion goes through that anchor, so looped playback can
//! keep accumulating time across chained segments and wrapping is only applied when a
//! caller reads the position.

use crate::source::AudioSource;
use crate::time::AudioTime;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimelineClock {
    time_at_start: f64,
}

impl TimelineClock {
    pub fn new(time_at_start: f64) -> Self {
        Self { time_at_start }
    }

    /// Logical time of the render clock's reference instant.
    pub fn anchor(&self) -> f64 {
        self.time_at_start
    }

    /// Timeline time at render instant `at` (or now).
    ///
    /// Falls back to the anchor when the source cannot map render time to player time,
    /// e.g. before `play` or after `stop`.
    pub fn timeline_time<S: AudioSource + ?Sized>(&self, source: &S, at: Option<AudioTime>) -> f64 {
        let node_time = at.unwrap_or_else(|| source.current_time());
        match source.player_time(node_time) {
            Some(player_time) if player_time.sample_rate > 0.0 => {
                self.time_at_start + player_time.sample_time as f64 / player_time.sample_rate
            }
            _ => self.time_at_start,
        }
    }

    /// Render instant at which timeline time `time` is (or was) heard.
    ///
    /// `None` means the source has no running timeline; callers schedule relative to now.
    pub fn clock_time<S: AudioSource + ?Sized>(&self, source: &S, time: f64) -> Option<AudioTime> {
        let rate = source.output_sample_rate();
        let offset = AudioTime::from_seconds(time - self.time_at_start, rate);
        source.node_time(offset)
    }

    /// Current position, wrapped into `[0, loop_duration)` when a loop length is given.
    pub fn current_time<S: AudioSource + ?Sized>(&self, source: &S, loop_duration: Option<f64>) -> f64 {
        let time = self.timeline_time(source, None);
        match loop_duration {
            Some(duration) => wrap_time(time, duration),
            None => time,
        }
    }

    /// Halt the source and re-anchor the timeline at `time`.
    pub fn set_time<S: AudioSource + ?Sized>(&mut self, source: &S, time: f64) {
        source.stop();
        self.time_at_start = time;
    }

    /// Freeze the timeline at its current position and halt the source.
    pub fn capture_and_stop<S: AudioSource + ?Sized>(&mut self, source: &S) {
        self.time_at_start = self.timeline_time(source, None);
        source.stop();
    }
}

/// Wrap `time` into `[0, duration)`.
///
/// Negative times wrap from the end. A non-positive duration collapses to `0.0`.
pub fn wrap_time(time: f64, duration: f64) -> f64 {
    if !(duration > 0.0) || !time.is_finite() {
        return 0.0;
    }
    let wrapped = time.rem_euclid(duration);
    // rem_euclid can round up to `duration` for tiny negative inputs.
    if wrapped >= duration { 0.0 } else { wrapped }
}
