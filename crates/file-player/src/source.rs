//! The render-engine node abstraction consumed by the player core.
//!
//! An [`AudioSource`] plays scheduled file segments against its own render clock and
//! reports each finished segment through a [`Completion`] handle.

use std::sync::{Arc, Weak};

use crate::file::AudioFile;
use crate::time::AudioTime;

/// A bounded range of file frames to render.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    /// First frame, in the file's own sample rate.
    pub start_frame: u64,
    /// Number of frames, in the file's own sample rate.
    pub frame_count: u64,
    /// Player-relative start instant; `None` queues the segment after the previous one.
    pub at: Option<AudioTime>,
}

/// Receiver of segment-completion events.
pub trait SegmentListener: Send + Sync {
    fn segment_completed(&self, epoch: u64);
}

/// One-shot notification that a scheduled segment finished (or was flushed by `stop`).
///
/// The handle only holds a weak reference to its listener, so a completion that
/// outlives the player is dropped without effect.
pub struct Completion {
    epoch: u64,
    listener: Weak<dyn SegmentListener>,
}

impl Completion {
    pub fn new(epoch: u64, listener: Weak<dyn SegmentListener>) -> Self {
        Self { epoch, listener }
    }

    /// Scheduling generation this completion belongs to.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Deliver the event. Must not be called while holding locks the listener takes.
    pub fn complete(self) {
        if let Some(listener) = self.listener.upgrade() {
            listener.segment_completed(self.epoch);
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

/// Render-engine node playing file segments.
///
/// Implementations must deliver completions asynchronously: never from inside
/// `schedule_segment`, `stop` or any other call made by the player.
pub trait AudioSource: Send + Sync {
    /// Start the player timeline at render instant `at`, or on the next render cycle.
    fn play(&self, at: Option<AudioTime>);

    /// Halt playback and discard every queued segment.
    fn stop(&self);

    /// `true` while started with at least one segment left to render.
    fn is_playing(&self) -> bool;

    fn schedule_segment(&self, file: &AudioFile, segment: Segment, completion: Option<Completion>);

    /// Make at least `frame_count` frames of queued audio ready for rendering.
    fn prepare(&self, frame_count: u32);

    /// The render clock "now".
    fn current_time(&self) -> AudioTime;

    /// Render instant for a player-relative offset; `None` when not started.
    fn node_time(&self, player_time: AudioTime) -> Option<AudioTime>;

    /// Player-relative offset for a render instant; `None` when not started.
    fn player_time(&self, node_time: AudioTime) -> Option<AudioTime>;

    fn output_sample_rate(&self) -> f64;

    fn volume(&self) -> f32;
    fn set_volume(&self, volume: f32);
    fn pan(&self) -> f32;
    fn set_pan(&self, pan: f32);
}

impl<T: AudioSource + ?Sized> AudioSource for Arc<T> {
    fn play(&self, at: Option<AudioTime>) {
        (**self).play(at)
    }

    fn stop(&self) {
        (**self).stop()
    }

    fn is_playing(&self) -> bool {
        (**self).is_playing()
    }

    fn schedule_segment(&self, file: &AudioFile, segment: Segment, completion: Option<Completion>) {
        (**self).schedule_segment(file, segment, completion)
    }

    fn prepare(&self, frame_count: u32) {
        (**self).prepare(frame_count)
    }

    fn current_time(&self) -> AudioTime {
        (**self).current_time()
    }

    fn node_time(&self, player_time: AudioTime) -> Option<AudioTime> {
        (**self).node_time(player_time)
    }

    fn player_time(&self, node_time: AudioTime) -> Option<AudioTime> {
        (**self).player_time(node_time)
    }

    fn output_sample_rate(&self) -> f64 {
        (**self).output_sample_rate()
    }

    fn volume(&self) -> f32 {
        (**self).volume()
    }

    fn set_volume(&self, volume: f32) {
        (**self).set_volume(volume)
    }

    fn pan(&self) -> f32 {
        (**self).pan()
    }

    fn set_pan(&self, pan: f32) {
        (**self).set_pan(pan)
    }
}
