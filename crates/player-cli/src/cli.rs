use std::path::PathBuf;

use clap::{Parser, Subcommand};
use file_player::config::PlayerConfig;

use crate::config::PlayConfig;

#[derive(Parser, Debug)]
#[command(name = "player-cli", version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Use a specific output device by substring match
    #[arg(long, global = true)]
    pub device: Option<String>,

    /// Frames pre-buffered before playback starts
    #[arg(long, global = true, default_value_t = 4096)]
    pub prepare_frames: u32,

    /// Resampler input chunk size in frames (only used when the device rate differs)
    #[arg(long, global = true, default_value_t = 1024)]
    pub chunk_frames: usize,

    /// Progress report interval in milliseconds
    #[arg(long, global = true, default_value_t = 100)]
    pub progress_ms: u64,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List output devices and exit
    Devices {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play a local file
    Play {
        /// Path to audio file
        path: PathBuf,

        /// Loop the file gaplessly until stopped
        #[arg(long = "loop")]
        looping: bool,

        /// Start position in seconds
        #[arg(long, default_value_t = 0.0)]
        start: f64,

        /// Linear output gain
        #[arg(long, default_value_t = 1.0)]
        volume: f32,

        /// Stereo balance, -1 (left) to 1 (right)
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        pan: f32,

        /// Read transport commands from stdin
        #[arg(long)]
        interactive: bool,
    },
}

impl Args {
    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            prepare_frames: self.prepare_frames,
            chunk_frames: self.chunk_frames.max(1),
            progress_interval_ms: self.progress_ms.max(1),
        }
    }

    /// `None` unless the subcommand is `play`.
    pub fn play_config(&self) -> Option<PlayConfig> {
        let Command::Play {
            path,
            looping,
            start,
            volume,
            pan,
            interactive,
        } = &self.cmd
        else {
            return None;
        };
        Some(PlayConfig {
            path: path.clone(),
            device: normalize_device_name(self.device.clone()),
            looping: *looping,
            start: *start,
            volume: *volume,
            pan: *pan,
            interactive: *interactive,
            player: self.player_config(),
        })
    }
}

fn normalize_device_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_args_become_play_config() {
        let args = Args::parse_from([
            "player-cli",
            "--device",
            " usb ",
            "--progress-ms",
            "250",
            "play",
            "loop.wav",
            "--loop",
            "--start",
            "1.5",
            "--pan",
            "-0.5",
        ]);
        let config = args.play_config().expect("play config");
        assert_eq!(config.path, PathBuf::from("loop.wav"));
        assert_eq!(config.device.as_deref(), Some("usb"));
        assert!(config.looping);
        assert!(!config.interactive);
        assert_eq!(config.start, 1.5);
        assert_eq!(config.pan, -0.5);
        assert_eq!(config.volume, 1.0);
        assert_eq!(config.player.progress_interval_ms, 250);
        assert_eq!(config.player.prepare_frames, 4096);
    }

    #[test]
    fn devices_has_no_play_config() {
        let args = Args::parse_from(["player-cli", "devices", "--json"]);
        assert!(args.play_config().is_none());
        assert!(matches!(args.cmd, Command::Devices { json: true }));
    }

    #[test]
    fn blank_device_name_means_default() {
        assert_eq!(normalize_device_name(Some("   ".to_string())), None);
        assert_eq!(normalize_device_name(None), None);
    }
}
