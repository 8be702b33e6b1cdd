//! Player-facing transport.
//!
//! [`FilePlayer`] owns the playback session behind a mutex and composes the timeline
//! clock and the scheduler. Control calls and loop completions (delivered on the
//! source's completion thread) both go through that mutex, so a completion can never
//! observe a half-applied `stop` or seek.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::file::AudioFile;
use crate::scheduler::PlaybackScheduler;
use crate::session::PlaybackSession;
use crate::source::{AudioSource, SegmentListener};
use crate::status::PlayerStatus;
use crate::time::AudioTime;

/// Derived transport state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Stopped,
    /// Segments are queued and waiting for `play`.
    Scheduled,
    Playing,
}

/// Gapless, loop-capable player for a single [`AudioFile`].
pub struct FilePlayer<S: AudioSource + 'static> {
    shared: Arc<Shared<S>>,
}

struct Shared<S: AudioSource + 'static> {
    source: S,
    session: Mutex<PlaybackSession>,
    me: Weak<Shared<S>>,
}

impl<S: AudioSource + 'static> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, PlaybackSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scheduler(&self) -> PlaybackScheduler<'_, S> {
        let listener: Weak<dyn SegmentListener> = self.me.clone();
        PlaybackScheduler::new(&self.source, listener)
    }
}

impl<S: AudioSource + 'static> SegmentListener for Shared<S> {
    fn segment_completed(&self, epoch: u64) {
        let session = self.lock();
        if self.scheduler().continue_loop(&session, epoch) {
            tracing::trace!(epoch, "loop iteration queued");
        }
    }
}

impl<S: AudioSource + 'static> FilePlayer<S> {
    pub fn new(source: S, file: Option<AudioFile>) -> Self {
        let shared = Arc::new_cyclic(|me| Shared {
            source,
            session: Mutex::new(PlaybackSession::new(file)),
            me: me.clone(),
        });
        Self { shared }
    }

    pub fn source(&self) -> &S {
        &self.shared.source
    }

    pub fn audio_file(&self) -> Option<AudioFile> {
        self.shared.lock().file.clone()
    }

    /// Replace the file. Playback stops and the timeline restarts at zero.
    pub fn set_audio_file(&self, file: Option<AudioFile>) {
        let mut session = self.shared.lock();
        session.set_file(&self.shared.source, file);
    }

    /// Start playback on the next render cycle.
    pub fn play(&self) {
        self.play_at(None);
    }

    /// Start playback so the current position is heard at render instant `at`.
    pub fn play_at(&self, at: Option<AudioTime>) {
        let shared = &self.shared;
        let mut session = shared.lock();
        if !session.scheduled {
            let time = session.current_time(&shared.source);
            shared.scheduler().schedule(&mut session, time);
        }
        shared.source.play(at);
        session.scheduled = false;
        tracing::debug!(
            playing = shared.source.is_playing(),
            epoch = session.epoch,
            "play"
        );
    }

    /// Halt playback, keeping the current position.
    pub fn stop(&self) {
        let mut session = self.shared.lock();
        session.stop(&self.shared.source);
        tracing::debug!(time = session.clock.anchor(), "stop");
    }

    /// Halt playback and move the timeline to `time` (seconds, unwrapped).
    pub fn set_time(&self, time: f64) {
        let mut session = self.shared.lock();
        session.set_time(&self.shared.source, time);
    }

    /// Timeline time at render instant `at`, or now.
    pub fn time(&self, at: Option<AudioTime>) -> f64 {
        let session = self.shared.lock();
        session.clock.timeline_time(&self.shared.source, at)
    }

    /// Render instant for timeline `time`; `None` while the source is not running.
    pub fn clock_time(&self, time: f64) -> Option<AudioTime> {
        let session = self.shared.lock();
        session.clock.clock_time(&self.shared.source, time)
    }

    /// Playback position in seconds, within `[0, duration)` while looping.
    pub fn current_time(&self) -> f64 {
        let session = self.shared.lock();
        session.current_time(&self.shared.source)
    }

    /// Seek. Halts playback; wraps into the loop when looping.
    pub fn set_current_time(&self, time: f64) {
        let mut session = self.shared.lock();
        session.set_current_time(&self.shared.source, time);
    }

    pub fn duration(&self) -> f64 {
        self.shared.lock().duration()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.source.is_playing()
    }

    pub fn looping(&self) -> bool {
        self.shared.lock().looping
    }

    /// Toggle looping; the next `prepare`/`play` reschedules under the new policy.
    pub fn set_looping(&self, looping: bool) {
        self.shared.lock().set_looping(looping);
    }

    pub fn volume(&self) -> f32 {
        self.shared.source.volume()
    }

    pub fn set_volume(&self, volume: f32) {
        self.shared.source.set_volume(volume);
    }

    pub fn pan(&self) -> f32 {
        self.shared.source.pan()
    }

    pub fn set_pan(&self, pan: f32) {
        self.shared.source.set_pan(pan);
    }

    /// Schedule (if needed) and pre-buffer `frame_count` frames ahead of `play`.
    pub fn prepare(&self, frame_count: u32) {
        let shared = &self.shared;
        let mut session = shared.lock();
        shared.scheduler().prepare(&mut session, frame_count);
    }

    pub fn state(&self) -> PlayerState {
        let session = self.shared.lock();
        self.state_locked(&session)
    }

    /// Consistent snapshot of position, state and settings.
    pub fn status(&self) -> PlayerStatus {
        let session = self.shared.lock();
        let source = &self.shared.source;
        let file = session.file.as_ref();
        PlayerStatus {
            state: self.state_locked(&session),
            current_time: session.current_time(source),
            duration: session.duration(),
            looping: session.looping,
            volume: source.volume(),
            pan: source.pan(),
            file: file.and_then(|f| f.name().map(str::to_string)),
            codec: file.and_then(|f| f.source_info().codec.clone()),
            file_sample_rate: file.map(AudioFile::sample_rate),
            output_sample_rate: source.output_sample_rate(),
        }
    }

    fn state_locked(&self, session: &PlaybackSession) -> PlayerState {
        if self.shared.source.is_playing() {
            PlayerState::Playing
        } else if session.scheduled {
            PlayerState::Scheduled
        } else {
            PlayerState::Stopped
        }
    }
}

impl<S: AudioSource + 'static> Drop for FilePlayer<S> {
    fn drop(&mut self) {
        self.shared.source.stop();
    }
}
