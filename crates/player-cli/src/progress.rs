//! Periodic playback position reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use file_player::{AudioSource, FilePlayer, PlayerState};

/// Background thread that logs the player status every interval.
pub(crate) struct ProgressReporter {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

impl ProgressReporter {
    pub(crate) fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.handle.join();
    }
}

/// Spawn a reporter thread for `player`.
///
/// State changes are logged at info level; positions at debug level.
pub(crate) fn start_progress_reporter<S: AudioSource + 'static>(
    player: Arc<FilePlayer<S>>,
    interval: Duration,
) -> ProgressReporter {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_thread = stop.clone();

    let handle = thread::spawn(move || {
        let mut last_state: Option<PlayerState> = None;
        while !stop_thread.load(Ordering::Relaxed) {
            let status = player.status();
            if last_state != Some(status.state) {
                tracing::info!(
                    state = ?status.state,
                    position = status.current_time,
                    looping = status.looping,
                    "player state"
                );
                last_state = Some(status.state);
            }
            if status.is_playing() {
                tracing::debug!(progress = status.progress(), "{}", status.summary());
            }
            thread::sleep(interval);
        }
    });

    ProgressReporter { stop, handle }
}
