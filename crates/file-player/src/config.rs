/// Player tuning parameters shared by the engine and the CLI.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Frames pre-buffered by `prepare` before starting playback.
    pub prepare_frames: u32,
    /// Resampler input chunk size in frames.
    pub chunk_frames: usize,
    /// Interval between progress reports in milliseconds.
    pub progress_interval_ms: u64,
}

impl Default for PlayerConfig {
    /// Defaults mirror a 100 ms UI refresh and a few milliseconds of pre-roll.
    fn default() -> Self {
        Self {
            prepare_frames: 4096,
            chunk_frames: 1024,
            progress_interval_ms: 100,
        }
    }
}
