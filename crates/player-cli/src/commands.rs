//! Interactive transport commands read from stdin.

use anyhow::{Context, Result, anyhow, bail};
use file_player::{AudioSource, FilePlayer};

/// Help text printed for `help`.
pub const HELP: &str = "commands: play | toggle | stop | seek <secs>|<pct>% | loop on|off|toggle | vol <0..1> | pan <-1..1> | status | quit";

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    Play,
    /// Play when stopped, stop when playing.
    Toggle,
    Stop,
    Seek(SeekTarget),
    Loop(LoopSetting),
    Volume(f32),
    Pan(f32),
    Status,
    Help,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SeekTarget {
    Seconds(f64),
    /// Fraction of the duration, `0.0..=1.0`.
    Fraction(f64),
}

impl SeekTarget {
    pub fn resolve(self, duration: f64) -> f64 {
        match self {
            SeekTarget::Seconds(secs) => secs,
            SeekTarget::Fraction(f) => f * duration,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopSetting {
    On,
    Off,
    Toggle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    if let Some(extra) = words.next() {
        bail!("unexpected argument: {extra}");
    }

    let cmd = match (verb.to_ascii_lowercase().as_str(), arg) {
        ("play" | "p", None) => Command::Play,
        ("toggle" | "t" | "space", None) => Command::Toggle,
        ("stop" | "s", None) => Command::Stop,
        ("seek", Some(arg)) => Command::Seek(parse_seek(arg)?),
        ("loop" | "l", None) => Command::Loop(LoopSetting::Toggle),
        ("loop" | "l", Some(arg)) => Command::Loop(parse_loop(arg)?),
        ("vol" | "volume", Some(arg)) => Command::Volume(parse_number(arg, 0.0, f32::MAX)?),
        ("pan", Some(arg)) => Command::Pan(parse_number(arg, -1.0, 1.0)?),
        ("status", None) => Command::Status,
        ("help" | "?", None) => Command::Help,
        ("quit" | "q" | "exit", None) => Command::Quit,
        (verb @ ("seek" | "vol" | "volume" | "pan"), None) => bail!("{verb} needs a value"),
        _ => bail!("unknown command: {}", line.trim()),
    };
    Ok(Some(cmd))
}

fn parse_seek(arg: &str) -> Result<SeekTarget> {
    if let Some(pct) = arg.strip_suffix('%') {
        let pct: f64 = pct.parse().with_context(|| format!("bad percentage: {arg}"))?;
        if !(0.0..=100.0).contains(&pct) {
            bail!("percentage out of range: {arg}");
        }
        return Ok(SeekTarget::Fraction(pct / 100.0));
    }
    let secs: f64 = arg.parse().with_context(|| format!("bad seek position: {arg}"))?;
    if !secs.is_finite() || secs < 0.0 {
        bail!("seek position must be a non-negative number of seconds: {arg}");
    }
    Ok(SeekTarget::Seconds(secs))
}

fn parse_loop(arg: &str) -> Result<LoopSetting> {
    match arg.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(LoopSetting::On),
        "off" | "false" | "0" => Ok(LoopSetting::Off),
        "toggle" => Ok(LoopSetting::Toggle),
        other => Err(anyhow!("expected on, off or toggle, got {other}")),
    }
}

fn parse_number(arg: &str, min: f32, max: f32) -> Result<f32> {
    let value: f32 = arg.parse().with_context(|| format!("bad number: {arg}"))?;
    if !value.is_finite() || value < min || value > max {
        bail!("{arg} is outside {min}..{max}");
    }
    Ok(value)
}

/// Apply `cmd` to `player`.
///
/// Seeking keeps the transport running: the player halts on seek and is restarted
/// when it was playing. Changing the loop mode while playing reschedules from the
/// current position so the new mode applies to the pass being heard.
pub fn execute<S: AudioSource + 'static>(player: &FilePlayer<S>, cmd: Command) -> Result<Outcome> {
    match cmd {
        Command::Play => {
            if !player.is_playing() {
                start(player);
            }
        }
        Command::Toggle => {
            if player.is_playing() {
                player.stop();
            } else {
                start(player);
            }
        }
        Command::Stop => player.stop(),
        Command::Seek(target) => {
            let was_playing = player.is_playing();
            let time = target.resolve(player.duration());
            player.set_current_time(time);
            if was_playing {
                player.play();
            }
            tracing::info!(time, resumed = was_playing, "seek");
        }
        Command::Loop(setting) => {
            let looping = match setting {
                LoopSetting::On => true,
                LoopSetting::Off => false,
                LoopSetting::Toggle => !player.looping(),
            };
            if looping != player.looping() {
                let was_playing = player.is_playing();
                if was_playing {
                    player.stop();
                }
                player.set_looping(looping);
                if was_playing {
                    player.play();
                }
            }
            tracing::info!(looping, "loop");
        }
        Command::Volume(volume) => player.set_volume(volume),
        Command::Pan(pan) => player.set_pan(pan),
        Command::Status => {
            let json = serde_json::to_string(&player.status()).context("serialize status")?;
            println!("{json}");
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => return Ok(Outcome::Quit),
    }
    Ok(Outcome::Continue)
}

/// Start from the current position, or from the top once a non-looping pass ran out.
fn start<S: AudioSource + 'static>(player: &FilePlayer<S>) {
    let duration = player.duration();
    if !player.looping() && duration > 0.0 && player.current_time() >= duration {
        player.set_current_time(0.0);
        tracing::info!(duration, "rewind");
    }
    player.play();
}
