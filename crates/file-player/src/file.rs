//! In-memory audio file handle.
//!
//! An [`AudioFile`] is an immutable, cheaply clonable reference to decoded interleaved
//! `f32` PCM. The player core only reads `duration`, `sample_rate` and `frame_count`;
//! the render engine additionally reads the samples.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::decode::SourceInfo;

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Debug)]
pub struct AudioFile {
    inner: Arc<FileData>,
}

#[derive(Debug)]
struct FileData {
    id: u64,
    name: Option<String>,
    sample_rate: u32,
    channels: usize,
    samples: Arc<[f32]>,
    info: SourceInfo,
}

impl AudioFile {
    /// Wrap already-decoded interleaved samples.
    ///
    /// A trailing partial frame is dropped; `channels` is clamped to at least one.
    pub fn from_interleaved(samples: Vec<f32>, channels: usize, sample_rate: u32) -> Self {
        Self::with_info(samples, channels, sample_rate, None, SourceInfo::default())
    }

    pub(crate) fn with_info(
        mut samples: Vec<f32>,
        channels: usize,
        sample_rate: u32,
        name: Option<String>,
        info: SourceInfo,
    ) -> Self {
        let channels = channels.max(1);
        samples.truncate(samples.len() - samples.len() % channels);
        Self {
            inner: Arc::new(FileData {
                id: NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed),
                name,
                sample_rate,
                channels,
                samples: samples.into(),
                info,
            }),
        }
    }

    /// Process-unique identity, shared by clones of the same handle.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.inner.channels
    }

    pub fn frame_count(&self) -> u64 {
        (self.inner.samples.len() / self.inner.channels) as u64
    }

    /// Length in seconds; `0.0` when the sample rate is unknown.
    pub fn duration(&self) -> f64 {
        if self.inner.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.inner.sample_rate as f64
    }

    pub fn samples(&self) -> &Arc<[f32]> {
        &self.inner.samples
    }

    pub fn source_info(&self) -> &SourceInfo {
        &self.inner.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_follows_frames_and_rate() {
        let file = AudioFile::from_interleaved(vec![0.0; 96_000], 2, 48_000);
        assert_eq!(file.frame_count(), 48_000);
        assert_eq!(file.duration(), 1.0);
    }

    #[test]
    fn partial_frames_are_dropped() {
        let file = AudioFile::from_interleaved(vec![0.0; 5], 2, 8);
        assert_eq!(file.frame_count(), 2);
        assert_eq!(file.samples().len(), 4);
    }

    #[test]
    fn zero_rate_reports_zero_duration() {
        let file = AudioFile::from_interleaved(vec![0.0; 10], 1, 0);
        assert_eq!(file.duration(), 0.0);
    }

    #[test]
    fn clones_share_identity() {
        let a = AudioFile::from_interleaved(vec![0.0; 4], 1, 4);
        let b = a.clone();
        let c = AudioFile::from_interleaved(vec![0.0; 4], 1, 4);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }
}
