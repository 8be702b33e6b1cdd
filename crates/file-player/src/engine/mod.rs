//! CPAL-backed [`AudioSource`].
//!
//! [`RenderEngine`] is the handle the player talks to: it owns the render state shared
//! with the output callback, a cache of files converted to the output rate, and the
//! completion thread. [`OutputStream`] keeps the device stream alive and is kept on
//! the thread that created it.

mod render;

pub use render::{RenderBuffer, RenderState};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use anyhow::{Context, Result};
use cpal::traits::StreamTrait;
use crossbeam_channel::{Sender, unbounded};

use crate::config::PlayerConfig;
use crate::device::OutputTarget;
use crate::file::AudioFile;
use crate::playback;
use crate::resample::resample_interleaved;
use crate::source::{AudioSource, Completion, Segment};
use crate::time::AudioTime;

/// Converted files kept around; a player normally only touches one or two.
const MAX_CACHED_BUFFERS: usize = 4;

/// Shared handle to the render state. Cheap to clone.
#[derive(Clone)]
pub struct RenderEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    state: Mutex<RenderState>,
    buffers: Mutex<HashMap<u64, Arc<RenderBuffer>>>,
    completions: Sender<Completion>,
    output_rate: u32,
    chunk_frames: usize,
}

/// Running device stream. Dropping it silences the output.
pub struct OutputStream {
    stream: cpal::Stream,
    device_name: String,
}

impl OutputStream {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn pause(&self) -> Result<()> {
        self.stream.pause().context("pause output stream")
    }

    pub fn resume(&self) -> Result<()> {
        self.stream.play().context("resume output stream")
    }
}

impl RenderEngine {
    /// Engine without a device. `render_into` has to be driven by the caller.
    pub fn new(output_rate: u32, channels: usize, config: &PlayerConfig) -> Result<Self> {
        let (tx, rx) = unbounded::<Completion>();
        thread::Builder::new()
            .name("segment-completions".to_string())
            .spawn(move || {
                for completion in rx {
                    completion.complete();
                }
                tracing::trace!("completion thread exiting");
            })
            .context("spawn completion thread")?;

        Ok(Self {
            inner: Arc::new(EngineInner {
                state: Mutex::new(RenderState::new(output_rate, channels)),
                buffers: Mutex::new(HashMap::new()),
                completions: tx,
                output_rate,
                chunk_frames: config.chunk_frames.max(1),
            }),
        })
    }

    /// Create an engine for `output` and start its stream.
    pub fn start(output: &OutputTarget, config: &PlayerConfig) -> Result<(Self, OutputStream)> {
        let engine = Self::new(
            output.stream_config.sample_rate,
            output.stream_config.channels as usize,
            config,
        )?;
        let stream = playback::build_output_stream(
            &output.device,
            &output.stream_config,
            output.sample_format,
            engine.clone(),
        )?;
        stream.play().context("start output stream")?;
        Ok((
            engine,
            OutputStream {
                stream,
                device_name: output.name.clone(),
            },
        ))
    }

    pub fn channels(&self) -> usize {
        self.state().channels()
    }

    /// Segments waiting to be rendered or still rendering.
    pub fn queued_segments(&self) -> usize {
        self.state().queued_segments()
    }

    /// Render one callback's worth of interleaved output.
    pub fn render_into(&self, out: &mut [f32]) {
        let mut finished = Vec::new();
        self.state().render(out, &mut finished);
        self.deliver(finished);
    }

    fn state(&self) -> MutexGuard<'_, RenderState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, completions: Vec<Completion>) {
        for completion in completions {
            // The receiver lives as long as any engine handle.
            let _ = self.inner.completions.send(completion);
        }
    }

    /// Cached buffer for `file`, without converting.
    fn cached(&self, file: &AudioFile) -> Option<Arc<RenderBuffer>> {
        let buffers = self.inner.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        buffers.get(&file.id()).cloned()
    }

    /// Buffer for `file` at the output rate, converting on first use.
    fn resolve(&self, file: &AudioFile) -> Option<Arc<RenderBuffer>> {
        if let Some(buffer) = self.cached(file) {
            return Some(buffer);
        }

        let buffer = if file.sample_rate() == self.inner.output_rate {
            RenderBuffer::new(file.samples().clone(), file.channels())
        } else {
            let converted = match resample_interleaved(
                file.samples(),
                file.channels(),
                file.sample_rate(),
                self.inner.output_rate,
                self.inner.chunk_frames,
            ) {
                Ok(samples) => samples,
                Err(e) => {
                    tracing::warn!(error = %format!("{e:#}"), file = file.name().unwrap_or(""), "resample failed, rendering silence");
                    return None;
                }
            };
            RenderBuffer::new(converted.into(), file.channels())
        };

        let buffer = Arc::new(buffer);
        let mut buffers = self.inner.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        if buffers.len() >= MAX_CACHED_BUFFERS {
            buffers.clear();
        }
        buffers.insert(file.id(), buffer.clone());
        Some(buffer)
    }

    /// Resolve buffers for segments within the first `frames` queued frames.
    fn resolve_queued(&self, frames: usize) {
        let pending = self.state().unresolved(frames);
        if pending.is_empty() {
            return;
        }
        let resolved: Vec<(u64, Arc<RenderBuffer>)> = pending
            .iter()
            .filter_map(|file| self.resolve(file).map(|b| (file.id(), b)))
            .collect();
        self.state().attach(|id| {
            resolved
                .iter()
                .find(|(file_id, _)| *file_id == id)
                .map(|(_, b)| b.clone())
        });
    }
}

impl AudioSource for RenderEngine {
    fn play(&self, at: Option<AudioTime>) {
        self.resolve_queued(usize::MAX);
        self.state().start(at);
    }

    fn stop(&self) {
        let mut flushed = Vec::new();
        self.state().stop(&mut flushed);
        self.deliver(flushed);
    }

    fn is_playing(&self) -> bool {
        self.state().is_playing()
    }

    fn schedule_segment(&self, file: &AudioFile, segment: Segment, completion: Option<Completion>) {
        let buffer = if self.state().is_started() {
            self.resolve(file)
        } else {
            self.cached(file)
        };
        self.state().enqueue(file, segment, completion, buffer);
    }

    fn prepare(&self, frame_count: u32) {
        self.resolve_queued(frame_count as usize);
    }

    fn current_time(&self) -> AudioTime {
        self.state().now()
    }

    fn node_time(&self, player_time: AudioTime) -> Option<AudioTime> {
        self.state().node_time(player_time)
    }

    fn player_time(&self, node_time: AudioTime) -> Option<AudioTime> {
        self.state().player_time(node_time)
    }

    fn output_sample_rate(&self) -> f64 {
        self.inner.output_rate as f64
    }

    fn volume(&self) -> f32 {
        self.state().volume()
    }

    fn set_volume(&self, volume: f32) {
        self.state().set_volume(volume);
    }

    fn pan(&self) -> f32 {
        self.state().pan()
    }

    fn set_pan(&self, pan: f32) {
        self.state().set_pan(pan);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{FilePlayer, PlayerState};
    use std::time::{Duration, Instant};

    fn engine(rate: u32) -> RenderEngine {
        RenderEngine::new(rate, 1, &PlayerConfig::default()).expect("engine")
    }

    fn ramp(frames: usize, rate: u32) -> AudioFile {
        AudioFile::from_interleaved((0..frames).map(|i| i as f32).collect(), 1, rate)
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    fn render(engine: &RenderEngine, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        engine.render_into(&mut out);
        out
    }

    #[test]
    fn same_rate_file_is_not_copied() {
        let engine = engine(8);
        let file = ramp(4, 8);
        let buffer = engine.resolve(&file).expect("buffer");
        assert_eq!(buffer.frames(), 4);
        assert!(Arc::ptr_eq(&engine.cached(&file).expect("cached"), &buffer));
    }

    #[test]
    fn other_rate_file_is_converted_once() {
        let engine = engine(48_000);
        let file = AudioFile::from_interleaved(vec![0.1; 4_410], 1, 44_100);
        let first = engine.resolve(&file).expect("buffer");
        assert_eq!(first.frames(), 4_800);
        let second = engine.resolve(&file).expect("buffer");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn prepare_attaches_buffers_before_play() {
        let engine = engine(8);
        let file = ramp(4, 8);
        engine.schedule_segment(&file, Segment { start_frame: 0, frame_count: 4, at: None }, None);
        assert_eq!(engine.state().unresolved(16).len(), 1);
        engine.prepare(4);
        assert!(engine.state().unresolved(16).is_empty());
    }

    #[test]
    fn looping_player_renders_gaplessly() {
        let engine = engine(8);
        let player = FilePlayer::new(engine.clone(), Some(ramp(4, 8)));
        player.set_looping(true);
        player.set_current_time(0.25);
        player.prepare(16);
        player.play();
        assert_eq!(player.state(), PlayerState::Playing);

        // Tail of the first pass from the seek point.
        assert_eq!(render(&engine, 2), vec![2.0, 3.0]);
        // Its completion queues the next iteration behind the eager one.
        assert!(wait_for(|| engine.state().queued_segments() == 2));
        assert_eq!(render(&engine, 4), vec![0.0, 1.0, 2.0, 3.0]);
        assert!(wait_for(|| engine.state().queued_segments() == 2));
        assert_eq!(render(&engine, 4), vec![0.0, 1.0, 2.0, 3.0]);
        assert!(player.current_time().abs() < 1e-9);
        assert!(player.looping());
    }

    #[test]
    fn late_start_joins_the_timeline_in_progress() {
        let engine = engine(8);
        let player = FilePlayer::new(engine.clone(), Some(ramp(8, 8)));
        render(&engine, 8);
        player.play_at(Some(AudioTime::new(4, 8.0)));

        assert!((player.current_time() - 0.5).abs() < 1e-9);
        assert_eq!(render(&engine, 2), vec![4.0, 5.0]);
        assert!((player.current_time() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn stop_releases_queue_and_keeps_position() {
        let engine = engine(8);
        let player = FilePlayer::new(engine.clone(), Some(ramp(8, 8)));
        player.set_looping(true);
        player.play();
        render(&engine, 3);
        player.stop();

        assert_eq!(engine.state().queued_segments(), 0);
        assert!(!engine.is_playing());
        assert!((player.current_time() - 0.375).abs() < 1e-9);
        // Flushed completions must not resurrect the loop.
        thread::sleep(Duration::from_millis(20));
        assert_eq!(engine.state().queued_segments(), 0);
        assert_eq!(player.state(), PlayerState::Stopped);
    }

    #[test]
    fn non_looping_player_runs_out() {
        let engine = engine(8);
        let player = FilePlayer::new(engine.clone(), Some(ramp(4, 8)));
        player.play();
        assert_eq!(render(&engine, 6), vec![0.0, 1.0, 2.0, 3.0, 0.0, 0.0]);
        assert!(!player.is_playing());
        assert_eq!(player.state(), PlayerState::Stopped);
    }
}
