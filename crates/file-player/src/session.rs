//! Mutable playback state shared between control calls and completion events.

use crate::clock::TimelineClock;
use crate::file::AudioFile;
use crate::source::AudioSource;

/// Everything the controller and the loop continuation both touch.
///
/// Always accessed under the controller's session mutex.
#[derive(Debug, Default)]
pub struct PlaybackSession {
    pub(crate) file: Option<AudioFile>,
    pub(crate) clock: TimelineClock,
    pub(crate) looping: bool,
    pub(crate) scheduled: bool,
    pub(crate) epoch: u64,
}

impl PlaybackSession {
    pub fn new(file: Option<AudioFile>) -> Self {
        Self {
            file,
            ..Self::default()
        }
    }

    pub fn file(&self) -> Option<&AudioFile> {
        self.file.as_ref()
    }

    pub fn clock(&self) -> &TimelineClock {
        &self.clock
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn scheduled(&self) -> bool {
        self.scheduled
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn duration(&self) -> f64 {
        self.file.as_ref().map(AudioFile::duration).unwrap_or(0.0)
    }

    /// Loop length to wrap reads and writes by, if looping with a file loaded.
    fn loop_duration(&self) -> Option<f64> {
        match &self.file {
            Some(file) if self.looping => Some(file.duration()),
            _ => None,
        }
    }

    pub fn current_time<S: AudioSource + ?Sized>(&self, source: &S) -> f64 {
        self.clock.current_time(source, self.loop_duration())
    }

    pub fn set_current_time<S: AudioSource + ?Sized>(&mut self, source: &S, time: f64) {
        let time = match self.loop_duration() {
            Some(duration) => crate::clock::wrap_time(time, duration),
            None => time,
        };
        self.set_time(source, time);
    }

    /// Halt the source and re-anchor; outstanding continuations become stale and the
    /// next `prepare`/`play` schedules afresh.
    pub fn set_time<S: AudioSource + ?Sized>(&mut self, source: &S, time: f64) {
        self.invalidate();
        self.clock.set_time(source, time);
        self.scheduled = false;
    }

    /// Freeze the timeline at the current position and halt the source.
    pub fn stop<S: AudioSource + ?Sized>(&mut self, source: &S) {
        self.invalidate();
        self.clock.capture_and_stop(source);
        self.scheduled = false;
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
        self.scheduled = false;
    }

    /// Swap the file; the timeline restarts at zero and must be rescheduled.
    pub fn set_file<S: AudioSource + ?Sized>(&mut self, source: &S, file: Option<AudioFile>) {
        self.set_time(source, 0.0);
        self.scheduled = false;
        self.file = file;
    }

    /// Start a new scheduling generation.
    fn invalidate(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;

    fn ten_second_file() -> AudioFile {
        AudioFile::from_interleaved(vec![0.0; 100], 1, 10)
    }

    #[test]
    fn duration_is_zero_without_file() {
        assert_eq!(PlaybackSession::default().duration(), 0.0);
        assert_eq!(PlaybackSession::new(Some(ten_second_file())).duration(), 10.0);
    }

    #[test]
    fn stop_and_set_time_bump_epoch() {
        let source = MockSource::new(48_000.0);
        let mut session = PlaybackSession::new(Some(ten_second_file()));
        let start = session.epoch();
        session.stop(&source);
        session.set_time(&source, 1.0);
        assert_eq!(session.epoch(), start + 2);
    }

    #[test]
    fn set_time_clears_scheduled() {
        let source = MockSource::new(48_000.0);
        let mut session = PlaybackSession::new(Some(ten_second_file()));
        session.scheduled = true;
        session.set_time(&source, 3.0);
        assert!(!session.scheduled());
        assert_eq!(session.current_time(&source), 3.0);
    }

    #[test]
    fn set_looping_clears_scheduled() {
        let mut session = PlaybackSession::new(Some(ten_second_file()));
        session.scheduled = true;
        session.set_looping(true);
        assert!(!session.scheduled());
        session.scheduled = true;
        session.set_looping(false);
        assert!(!session.scheduled());
    }

    #[test]
    fn set_current_time_wraps_only_when_looping() {
        let source = MockSource::new(48_000.0);
        let mut session = PlaybackSession::new(Some(ten_second_file()));
        session.set_current_time(&source, 12.5);
        assert_eq!(session.current_time(&source), 12.5);

        session.set_looping(true);
        session.set_current_time(&source, 12.5);
        assert!((session.current_time(&source) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn looping_without_file_passes_time_through() {
        let source = MockSource::new(48_000.0);
        let mut session = PlaybackSession::default();
        session.set_looping(true);
        session.set_current_time(&source, 42.0);
        assert_eq!(session.current_time(&source), 42.0);
    }

    #[test]
    fn set_file_resets_timeline() {
        let source = MockSource::new(48_000.0);
        let mut session = PlaybackSession::new(Some(ten_second_file()));
        session.set_time(&source, 4.0);
        session.scheduled = true;
        session.set_file(&source, None);
        assert_eq!(session.current_time(&source), 0.0);
        assert!(!session.scheduled());
        assert!(session.file().is_none());
    }
}
