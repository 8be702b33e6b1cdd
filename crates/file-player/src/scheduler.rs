//! Segment scheduling and gapless loop chaining.
//!
//! A scheduling pass submits the remainder of the file from the requested offset and,
//! when looping, immediately queues one full copy of the file behind it. From then on
//! every segment completion queues one more full copy, so the source always has the
//! next loop iteration buffered before the current one ends.
//!
//! Each pass is tagged with the session epoch it ran under. A completion whose epoch
//! no longer matches (the session was stopped, re-seeked or rescheduled since) is a
//! no-op, which keeps a chain from a previous pass from resurrecting playback.

use std::sync::Weak;

use crate::file::AudioFile;
use crate::session::PlaybackSession;
use crate::source::{AudioSource, Completion, Segment, SegmentListener};
use crate::time::AudioTime;

pub struct PlaybackScheduler<'a, S: AudioSource + ?Sized> {
    source: &'a S,
    listener: Weak<dyn SegmentListener>,
}

impl<'a, S: AudioSource + ?Sized> PlaybackScheduler<'a, S> {
    /// `listener` receives the completions of every segment this scheduler chains.
    pub fn new(source: &'a S, listener: Weak<dyn SegmentListener>) -> Self {
        Self { source, listener }
    }

    /// Stop, then submit the file from `offset` seconds under a fresh epoch.
    pub fn schedule(&self, session: &mut PlaybackSession, offset: f64) {
        session.stop(self.source);
        let Some(file) = session.file.clone() else {
            tracing::debug!("schedule skipped: no audio file");
            return;
        };

        let epoch = session.epoch;
        let duration = file.duration();
        let offset = offset.max(0.0);

        if offset < duration {
            let completion = session.looping.then(|| self.continuation(epoch));
            self.schedule_file(&file, Some(0.0), offset, duration - offset, completion);
            if session.looping {
                // Queue the next iteration now rather than on completion.
                self.submit_loop(&file, epoch);
            }
            tracing::debug!(offset, duration, epoch, looping = session.looping, "scheduled");
        } else {
            tracing::debug!(offset, duration, "schedule offset at or past end; nothing queued");
        }

        session.scheduled = true;
    }

    /// Submit `duration` seconds of `file` starting `offset` seconds in, to begin at
    /// player time `time` (seconds) or right after whatever is already queued.
    ///
    /// File positions are converted at the file's rate, the start instant at the
    /// output rate.
    pub fn schedule_file(
        &self,
        file: &AudioFile,
        time: Option<f64>,
        offset: f64,
        duration: f64,
        completion: Option<Completion>,
    ) {
        let file_rate = file.sample_rate() as f64;
        let output_rate = self.source.output_sample_rate();
        let start_frame = (offset * file_rate).round().max(0.0) as u64;
        let frame_count = ((duration * file_rate).round().max(0.0) as u64)
            .min(file.frame_count().saturating_sub(start_frame));
        let at = time.map(|t| AudioTime::from_seconds(t, output_rate));

        self.source.schedule_segment(
            file,
            Segment {
                start_frame,
                frame_count,
                at,
            },
            completion,
        );
    }

    /// Completion-driven step of the loop chain.
    ///
    /// Acts only when `epoch` is still current, looping is still on and the source is
    /// still playing. Returns whether a segment was queued. Callers must hold the
    /// session lock for the whole call so the check and the submission cannot
    /// interleave with `stop`.
    pub fn continue_loop(&self, session: &PlaybackSession, epoch: u64) -> bool {
        if epoch != session.epoch {
            tracing::trace!(epoch, current = session.epoch, "stale loop completion ignored");
            return false;
        }
        if !session.looping || !self.source.is_playing() {
            return false;
        }
        let Some(file) = session.file.as_ref() else {
            return false;
        };
        self.submit_loop(file, epoch);
        true
    }

    /// Schedule first (at the current position) if needed, then pre-buffer.
    pub fn prepare(&self, session: &mut PlaybackSession, frame_count: u32) {
        if !session.scheduled {
            let time = session.current_time(self.source);
            self.schedule(session, time);
        }
        self.source.prepare(frame_count);
    }

    fn submit_loop(&self, file: &AudioFile, epoch: u64) {
        self.source.schedule_segment(
            file,
            Segment {
                start_frame: 0,
                frame_count: file.frame_count(),
                at: None,
            },
            Some(self.continuation(epoch)),
        );
    }

    fn continuation(&self, epoch: u64) -> Completion {
        Completion::new(epoch, self.listener.clone())
    }
}
