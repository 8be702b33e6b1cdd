//! CLI runtime: device listing and local playback.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use file_player::engine::RenderEngine;
use file_player::{AudioSource, FilePlayer, PlayerState, decode, device};

use crate::commands::{self, Outcome};
use crate::config::PlayConfig;
use crate::progress::start_progress_reporter;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// List output devices on stdout.
pub fn list_devices(json: bool) -> Result<()> {
    let host = cpal::default_host();
    let devices = device::list_devices(&host)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&devices).context("serialize devices")?);
        return Ok(());
    }
    for d in devices {
        let rates = match (d.min_rate, d.max_rate) {
            (Some(min), Some(max)) if min == max => format!(" ({min} Hz)"),
            (Some(min), Some(max)) => format!(" ({min}-{max} Hz)"),
            _ => String::new(),
        };
        let marker = if d.is_default { " [default]" } else { "" };
        println!("#{}: {}{}{}", d.index, d.name, rates, marker);
    }
    Ok(())
}

/// Decode `config.path`, open the output and play until done, interrupted or quit.
pub fn run_play(config: PlayConfig) -> Result<()> {
    let file = decode::load_file(&config.path)?;

    let host = cpal::default_host();
    let output = device::open_output(&host, config.device.as_deref(), Some(file.sample_rate()))?;
    let (engine, stream) = RenderEngine::start(&output, &config.player)?;
    tracing::info!(
        device = stream.device_name(),
        file_rate_hz = file.sample_rate(),
        output_rate_hz = engine.output_sample_rate(),
        "output stream started"
    );

    let player = Arc::new(FilePlayer::new(engine, Some(file)));
    player.set_volume(config.volume);
    player.set_pan(config.pan);
    player.set_looping(config.looping);
    if config.start > 0.0 {
        player.set_current_time(config.start);
    }
    player.prepare(config.player.prepare_frames);
    player.play();

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .context("install Ctrl-C handler")?;
    }

    let reporter = start_progress_reporter(
        player.clone(),
        Duration::from_millis(config.player.progress_interval_ms),
    );
    let input = if config.interactive {
        println!("{}", commands::HELP);
        Some(spawn_stdin_reader()?)
    } else {
        None
    };

    let result = drive(&player, input.as_ref(), &interrupted);

    reporter.stop();
    player.stop();
    tracing::info!(position = player.current_time(), "playback ended");
    drop(stream);
    result
}

/// Main-thread loop: apply stdin commands and watch for the end of playback.
fn drive<S: AudioSource + 'static>(
    player: &FilePlayer<S>,
    input: Option<&Receiver<String>>,
    interrupted: &AtomicBool,
) -> Result<()> {
    loop {
        if interrupted.load(Ordering::SeqCst) {
            tracing::info!("interrupted");
            return Ok(());
        }

        let Some(rx) = input else {
            thread::sleep(POLL_INTERVAL);
            if !player.looping() && player.state() == PlayerState::Stopped {
                return Ok(());
            }
            continue;
        };

        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(line) => match commands::parse(&line) {
                Ok(Some(cmd)) => {
                    if commands::execute(player, cmd)? == Outcome::Quit {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("{e:#}"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::info!("stdin closed");
                return Ok(());
            }
        }
    }
}

/// Forward stdin lines over a channel so the main loop can poll with a timeout.
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("spawn stdin reader")?;
    Ok(rx)
}
