//! Device-independent render state.
//!
//! Owns the render clock (frames produced since the stream started), the player
//! timeline anchor and the queue of scheduled segments. The output callback calls
//! [`RenderState::render`] under a short lock; nothing in here blocks or allocates
//! per frame.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::file::AudioFile;
use crate::source::{Completion, Segment};
use crate::time::AudioTime;

/// A file's PCM at the output sample rate.
#[derive(Debug)]
pub struct RenderBuffer {
    samples: Arc<[f32]>,
    channels: usize,
}

impl RenderBuffer {
    pub fn new(samples: Arc<[f32]>, channels: usize) -> Self {
        Self {
            samples,
            channels: channels.max(1),
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    fn frame(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.channels)?;
        self.samples.get(start..start + self.channels)
    }
}

struct QueuedSegment {
    file: AudioFile,
    /// First frame inside the render buffer (output rate).
    first: usize,
    /// Length in output frames.
    len: usize,
    /// Player-timeline frame at which rendering may begin.
    begin: i64,
    /// Frames rendered so far.
    pos: usize,
    buffer: Option<Arc<RenderBuffer>>,
    completion: Option<Completion>,
}

pub struct RenderState {
    output_rate: f64,
    channels: usize,
    node_frames: i64,
    started_at: Option<i64>,
    queue: VecDeque<QueuedSegment>,
    /// Player-timeline frame where the last queued segment ends.
    tail: i64,
    volume: f32,
    pan: f32,
}

impl RenderState {
    pub fn new(output_rate: u32, channels: usize) -> Self {
        Self {
            output_rate: output_rate as f64,
            channels: channels.max(1),
            node_frames: 0,
            started_at: None,
            queue: VecDeque::new(),
            tail: 0,
            volume: 1.0,
            pan: 0.0,
        }
    }

    pub fn output_rate(&self) -> f64 {
        self.output_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The render clock.
    pub fn now(&self) -> AudioTime {
        AudioTime::new(self.node_frames, self.output_rate)
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.started_at.is_some() && !self.queue.is_empty()
    }

    pub fn queued_segments(&self) -> usize {
        self.queue.len()
    }

    /// Anchor player time 0 at render instant `at` (or now). No-op once started.
    pub fn start(&mut self, at: Option<AudioTime>) {
        if self.started_at.is_some() {
            return;
        }
        let start = at
            .map(|t| t.at_rate(self.output_rate).sample_time)
            .unwrap_or(self.node_frames);
        self.started_at = Some(start);
    }

    /// Drop the anchor and the queue; queued completions are moved to `flushed`.
    pub fn stop(&mut self, flushed: &mut Vec<Completion>) {
        self.started_at = None;
        self.tail = 0;
        flushed.extend(self.queue.drain(..).filter_map(|s| s.completion));
    }

    pub fn enqueue(
        &mut self,
        file: &AudioFile,
        segment: Segment,
        completion: Option<Completion>,
        buffer: Option<Arc<RenderBuffer>>,
    ) {
        let ratio = if file.sample_rate() > 0 {
            self.output_rate / file.sample_rate() as f64
        } else {
            0.0
        };
        let first = (segment.start_frame as f64 * ratio).round() as usize;
        let len = (segment.frame_count as f64 * ratio).round() as usize;
        let requested = segment
            .at
            .map(|t| t.at_rate(self.output_rate).sample_time)
            .unwrap_or(self.tail);
        let begin = requested.max(self.tail);
        self.tail = begin + len as i64;

        self.queue.push_back(QueuedSegment {
            file: file.clone(),
            first,
            len,
            begin,
            pos: 0,
            buffer,
            completion,
        });
    }

    /// Files whose segments, within the first `frames` queued frames, still lack a
    /// render buffer. Each file is listed once.
    pub fn unresolved(&self, frames: usize) -> Vec<AudioFile> {
        let mut covered = 0usize;
        let mut out: Vec<AudioFile> = Vec::new();
        for seg in &self.queue {
            if covered >= frames {
                break;
            }
            covered += seg.len - seg.pos.min(seg.len);
            if seg.buffer.is_none() && !out.iter().any(|f| f.id() == seg.file.id()) {
                out.push(seg.file.clone());
            }
        }
        out
    }

    /// Attach resolved buffers to every segment still missing one.
    pub fn attach(&mut self, mut lookup: impl FnMut(u64) -> Option<Arc<RenderBuffer>>) {
        for seg in self.queue.iter_mut().filter(|s| s.buffer.is_none()) {
            seg.buffer = lookup(seg.file.id());
        }
    }

    pub fn node_time(&self, player_time: AudioTime) -> Option<AudioTime> {
        let start = self.started_at?;
        let offset = player_time.at_rate(self.output_rate).sample_time;
        Some(AudioTime::new(start + offset, self.output_rate))
    }

    pub fn player_time(&self, node_time: AudioTime) -> Option<AudioTime> {
        let start = self.started_at?;
        let node = node_time.at_rate(self.output_rate).sample_time;
        Some(AudioTime::new(node - start, self.output_rate))
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_finite() { volume.max(0.0) } else { 1.0 };
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 };
    }

    /// Fill `out` (interleaved, `channels` wide) and advance the render clock.
    ///
    /// Completions of segments that ran out are pushed to `finished`; the caller
    /// delivers them after releasing the lock.
    pub fn render(&mut self, out: &mut [f32], finished: &mut Vec<Completion>) {
        let channels = self.channels;
        let frames = out.len() / channels;
        out.fill(0.0);

        let Some(started_at) = self.started_at else {
            self.node_frames += frames as i64;
            return;
        };

        let (left_gain, right_gain) = self.gains();
        for (i, dst) in out.chunks_exact_mut(channels).enumerate() {
            let player = self.node_frames + i as i64 - started_at;
            if player < 0 {
                continue;
            }
            while let Some(seg) = self.queue.front_mut() {
                if seg.pos >= seg.len {
                    if let Some(done) = self.queue.pop_front().and_then(|s| s.completion) {
                        finished.push(done);
                    }
                    continue;
                }
                if player < seg.begin {
                    break;
                }
                // A start instant already in the past: skip what should have been heard.
                let due = (player - seg.begin) as usize;
                if due > seg.pos {
                    seg.pos = due.min(seg.len);
                    if seg.pos >= seg.len {
                        continue;
                    }
                }
                if let Some(frame) = seg.buffer.as_ref().and_then(|b| b.frame(seg.first + seg.pos)) {
                    write_mapped(frame, dst, left_gain, right_gain);
                }
                seg.pos += 1;
                if seg.pos >= seg.len {
                    if let Some(done) = self.queue.pop_front().and_then(|s| s.completion) {
                        finished.push(done);
                    }
                }
                break;
            }
        }
        self.node_frames += frames as i64;
    }

    /// Per-side gains: volume everywhere, balance-style pan on the first two channels.
    fn gains(&self) -> (f32, f32) {
        if self.channels < 2 {
            return (self.volume, self.volume);
        }
        let left = (1.0 - self.pan).min(1.0);
        let right = (1.0 + self.pan).min(1.0);
        (self.volume * left, self.volume * right)
    }
}

/// Write one source frame into one output frame with basic channel mapping.
///
/// - mono → stereo: duplicate channel 0
/// - stereo → mono: average L/R
/// - same layout: pass-through
/// - other layouts: clamp to the available source channels
fn write_mapped(src: &[f32], dst: &mut [f32], left_gain: f32, right_gain: f32) {
    let src_channels = src.len();
    let dst_channels = dst.len();
    for (ch, out) in dst.iter_mut().enumerate() {
        let sample = match (src_channels, dst_channels) {
            (2, 1) => 0.5 * (src[0] + src[1]),
            (1, _) => src[0],
            _ => src[ch.min(src_channels - 1)],
        };
        let gain = match ch {
            0 => left_gain,
            1 => right_gain,
            _ => left_gain.max(right_gain),
        };
        *out = sample * gain;
    }
}
