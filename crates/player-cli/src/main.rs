//! Player CLI: decode a file, open an output device and play it through the gapless
//! looping player, with an optional interactive transport on stdin.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use player_cli::cli::{Args, Command};
use player_cli::runtime;

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,file_player=info,player_cli=info")
        }))
        .init();

    match &args.cmd {
        Command::Devices { json } => runtime::list_devices(*json),
        Command::Play { .. } => {
            let config = args
                .play_config()
                .ok_or_else(|| anyhow::anyhow!("play arguments missing"))?;
            runtime::run_play(config)
        }
    }
}
