//! Scriptable [`AudioSource`] for exercising the timing core without a device.
//!
//! The clock only moves through [`MockSource::advance`]; segments only finish through
//! [`MockSource::finish_next`], which hands the completion back to the test so it can
//! be fired from whichever thread and at whichever moment the scenario needs.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::file::AudioFile;
use crate::source::{AudioSource, Completion, Segment};
use crate::time::AudioTime;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Submitted {
    pub(crate) file_id: u64,
    pub(crate) segment: Segment,
    pub(crate) epoch: Option<u64>,
}

struct Queued {
    completion: Option<Completion>,
}

struct MockState {
    now: i64,
    started_at: Option<i64>,
    queue: VecDeque<Queued>,
    flushed: Vec<Completion>,
    submitted: Vec<Submitted>,
    prepared: Vec<u32>,
    play_calls: usize,
    stop_calls: usize,
    volume: f32,
    pan: f32,
}

pub(crate) struct MockSource {
    rate: f64,
    state: Mutex<MockState>,
}

impl MockSource {
    pub(crate) fn new(rate: f64) -> Self {
        Self {
            rate,
            state: Mutex::new(MockState {
                now: 0,
                started_at: None,
                queue: VecDeque::new(),
                flushed: Vec::new(),
                submitted: Vec::new(),
                prepared: Vec::new(),
                play_calls: 0,
                stop_calls: 0,
                volume: 1.0,
                pan: 0.0,
            }),
        }
    }

    pub(crate) fn advance(&self, frames: i64) {
        self.state.lock().unwrap().now += frames;
    }

    pub(crate) fn submitted(&self) -> Vec<Submitted> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub(crate) fn submit_count(&self) -> usize {
        self.state.lock().unwrap().submitted.len()
    }

    pub(crate) fn queued(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    pub(crate) fn prepared(&self) -> Vec<u32> {
        self.state.lock().unwrap().prepared.clone()
    }

    pub(crate) fn play_calls(&self) -> usize {
        self.state.lock().unwrap().play_calls
    }

    pub(crate) fn stop_calls(&self) -> usize {
        self.state.lock().unwrap().stop_calls
    }

    /// Retire the oldest queued segment and hand back its completion, unfired.
    pub(crate) fn finish_next(&self) -> Option<Completion> {
        let mut st = self.state.lock().unwrap();
        st.queue.pop_front().and_then(|q| q.completion)
    }

    /// Completions flushed by `stop`, unfired.
    pub(crate) fn take_flushed(&self) -> Vec<Completion> {
        std::mem::take(&mut self.state.lock().unwrap().flushed)
    }
}

impl AudioSource for MockSource {
    fn play(&self, _at: Option<AudioTime>) {
        let mut st = self.state.lock().unwrap();
        st.play_calls += 1;
        if st.started_at.is_none() {
            st.started_at = Some(st.now);
        }
    }

    fn stop(&self) {
        let mut st = self.state.lock().unwrap();
        st.stop_calls += 1;
        st.started_at = None;
        let flushed: Vec<Completion> = st.queue.drain(..).filter_map(|q| q.completion).collect();
        st.flushed.extend(flushed);
    }

    fn is_playing(&self) -> bool {
        let st = self.state.lock().unwrap();
        st.started_at.is_some() && !st.queue.is_empty()
    }

    fn schedule_segment(&self, file: &AudioFile, segment: Segment, completion: Option<Completion>) {
        let mut st = self.state.lock().unwrap();
        st.submitted.push(Submitted {
            file_id: file.id(),
            segment,
            epoch: completion.as_ref().map(Completion::epoch),
        });
        st.queue.push_back(Queued { completion });
    }

    fn prepare(&self, frame_count: u32) {
        self.state.lock().unwrap().prepared.push(frame_count);
    }

    fn current_time(&self) -> AudioTime {
        AudioTime::new(self.state.lock().unwrap().now, self.rate)
    }

    fn node_time(&self, player_time: AudioTime) -> Option<AudioTime> {
        let st = self.state.lock().unwrap();
        let start = st.started_at?;
        Some(AudioTime::new(start + player_time.at_rate(self.rate).sample_time, self.rate))
    }

    fn player_time(&self, node_time: AudioTime) -> Option<AudioTime> {
        let st = self.state.lock().unwrap();
        let start = st.started_at?;
        Some(AudioTime::new(node_time.at_rate(self.rate).sample_time - start, self.rate))
    }

    fn output_sample_rate(&self) -> f64 {
        self.rate
    }

    fn volume(&self) -> f32 {
        self.state.lock().unwrap().volume
    }

    fn set_volume(&self, volume: f32) {
        self.state.lock().unwrap().volume = volume;
    }

    fn pan(&self) -> f32 {
        self.state.lock().unwrap().pan
    }

    fn set_pan(&self, pan: f32) {
        self.state.lock().unwrap().pan = pan;
    }
}
