use std::path::PathBuf;

pub use file_player::config::PlayerConfig;

/// Everything `player-cli play` needs.
#[derive(Clone, Debug)]
pub struct PlayConfig {
    pub path: PathBuf,
    pub device: Option<String>,
    pub looping: bool,
    /// Start position in seconds.
    pub start: f64,
    pub volume: f32,
    pub pan: f32,
    pub interactive: bool,
    pub player: PlayerConfig,
}
