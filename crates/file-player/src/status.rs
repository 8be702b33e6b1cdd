use crate::controller::PlayerState;

/// Point-in-time view of a player, suitable for logging and JSON output.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PlayerStatus {
    pub state: PlayerState,
    /// Position in seconds (wrapped while looping).
    pub current_time: f64,
    /// File length in seconds, `0.0` without a file.
    pub duration: f64,
    pub looping: bool,
    pub volume: f32,
    pub pan: f32,
    /// Display name of the loaded file.
    pub file: Option<String>,
    /// Source codec name (for example FLAC/MP3).
    pub codec: Option<String>,
    pub file_sample_rate: Option<u32>,
    pub output_sample_rate: f64,
}

impl PlayerStatus {
    /// Position as a fraction of the duration, clamped to `[0, 1]`.
    ///
    /// This is the value a seek slider would display.
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }

    /// One-line human readable summary, e.g. `01:02.5 / 03:00.0 playing loop`.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} / {} {}",
            format_clock(self.current_time),
            format_clock(self.duration),
            match self.state {
                PlayerState::Stopped => "stopped",
                PlayerState::Scheduled => "ready",
                PlayerState::Playing => "playing",
            }
        );
        if self.looping {
            out.push_str(" loop");
        }
        out
    }
}

/// `mm:ss.t` formatting; negative values are shown with a leading minus.
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "--:--.-".to_string();
    }
    let sign = if seconds < 0.0 { "-" } else { "" };
    let tenths = (seconds.abs() * 10.0).round() as u64;
    let minutes = tenths / 600;
    let secs = (tenths % 600) / 10;
    let frac = tenths % 10;
    format!("{sign}{minutes:02}:{secs:02}.{frac}")
}
