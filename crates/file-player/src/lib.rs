pub mod clock;
pub mod config;
pub mod controller;
pub mod decode;
pub mod device;
pub mod engine;
pub mod file;
pub mod playback;
pub mod resample;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod status;
pub mod time;

#[cfg(test)]
pub(crate) mod mock;

pub use controller::{FilePlayer, PlayerState};
pub use file::AudioFile;
pub use source::{AudioSource, Completion, Segment};
pub use time::AudioTime;
