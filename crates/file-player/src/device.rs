//! Output device discovery and stream-config selection.

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

/// Preferred callback size. Small enough that a seek is heard quickly.
const PREFERRED_BUFFER_FRAMES: u32 = 1024;

/// A device together with the stream config chosen for it.
pub struct OutputTarget {
    pub device: cpal::Device,
    pub name: String,
    pub sample_format: cpal::SampleFormat,
    pub stream_config: cpal::StreamConfig,
}

impl std::fmt::Debug for OutputTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputTarget")
            .field("name", &self.name)
            .field("sample_format", &self.sample_format)
            .field("stream_config", &self.stream_config)
            .finish_non_exhaustive()
    }
}

/// Output device metadata for `devices` listings.
#[derive(Clone, Debug, serde::Serialize)]
pub struct OutputDeviceInfo {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
    pub min_rate: Option<u32>,
    pub max_rate: Option<u32>,
}

/// Resolve the device and stream config to render into.
///
/// `preferred_rate` is normally the loaded file's rate, so the common case needs no
/// resampling at all.
pub fn open_output(
    host: &cpal::Host,
    needle: Option<&str>,
    preferred_rate: Option<u32>,
) -> Result<OutputTarget> {
    let device = pick_device(host, needle)?;
    let name = device
        .description()
        .map(|d| d.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    let supported = pick_output_config(&device, preferred_rate)?;
    let mut stream_config: cpal::StreamConfig = supported.config();
    if let Some(buffer_size) = pick_buffer_size(&supported) {
        stream_config.buffer_size = buffer_size;
    }
    tracing::info!(
        device = %name,
        rate_hz = stream_config.sample_rate,
        channels = stream_config.channels,
        format = ?supported.sample_format(),
        buffer = ?stream_config.buffer_size,
        "output selected"
    );
    Ok(OutputTarget {
        device,
        name,
        sample_format: supported.sample_format(),
        stream_config,
    })
}

/// Pick the first output device whose name contains `needle` (case-insensitive), or
/// the host default device.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    if let Some(needle) = needle {
        let mut devices = host.output_devices().context("No output devices")?;
        return devices
            .find(|d| {
                d.description()
                    .map(|n| matches_device_name(&n.to_string(), needle))
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("No output device matched: {needle}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("No default output device"))
}

/// Choose a stream config, preferring an exact `preferred_rate` match, stereo, and
/// float formats, in that order. Falls back to the device default config.
pub fn pick_output_config(
    device: &cpal::Device,
    preferred_rate: Option<u32>,
) -> Result<cpal::SupportedStreamConfig> {
    let ranges: Vec<cpal::SupportedStreamConfigRange> = match device.supported_output_configs() {
        Ok(ranges) => ranges.collect(),
        Err(e) => {
            tracing::warn!(error = %e, "cannot enumerate output configs, using default");
            Vec::new()
        }
    };

    let mut best: Option<(Candidate, cpal::SupportedStreamConfig)> = None;
    for range in ranges {
        let rate = pick_rate_for_range(range.min_sample_rate(), range.max_sample_rate(), preferred_rate);
        let candidate = Candidate {
            exact: preferred_rate == Some(rate),
            stereo: range.channels() == 2,
            format_rank: sample_format_rank(range.sample_format()),
            distance: preferred_rate.map(|p| p.abs_diff(rate)).unwrap_or(0),
        };
        if best.as_ref().is_none_or(|(b, _)| candidate.is_better_than(b)) {
            best = Some((candidate, range.with_sample_rate(rate)));
        }
    }

    match best {
        Some((_, config)) => Ok(config),
        None => device
            .default_output_config()
            .context("No supported output configs"),
    }
}

/// Clamp [`PREFERRED_BUFFER_FRAMES`] into the device's range; `None` keeps the
/// device default.
pub fn pick_buffer_size(config: &cpal::SupportedStreamConfig) -> Option<cpal::BufferSize> {
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } if min <= max => Some(
            cpal::BufferSize::Fixed(PREFERRED_BUFFER_FRAMES.clamp(*min, *max)),
        ),
        _ => None,
    }
}

/// Enumerate output devices for the current host.
pub fn list_devices(host: &cpal::Host) -> Result<Vec<OutputDeviceInfo>> {
    let default_name = host
        .default_output_device()
        .and_then(|d| d.description().ok())
        .map(|d| d.to_string());

    let devices = host.output_devices().context("No output devices")?;
    let mut out = Vec::new();
    for (index, d) in devices.enumerate() {
        let name = d.description()?.to_string();
        let (mut min_rate, mut max_rate) = (None::<u32>, None::<u32>);
        if let Ok(ranges) = d.supported_output_configs() {
            for r in ranges {
                min_rate = Some(min_rate.map_or(r.min_sample_rate(), |m| m.min(r.min_sample_rate())));
                max_rate = Some(max_rate.map_or(r.max_sample_rate(), |m| m.max(r.max_sample_rate())));
            }
        }
        out.push(OutputDeviceInfo {
            index,
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            min_rate,
            max_rate,
        });
    }
    Ok(out)
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate {
    exact: bool,
    stereo: bool,
    format_rank: u8,
    distance: u32,
}

impl Candidate {
    fn is_better_than(&self, other: &Candidate) -> bool {
        if self.exact != other.exact {
            self.exact
        } else if self.stereo != other.stereo {
            self.stereo
        } else if self.format_rank != other.format_rank {
            self.format_rank < other.format_rank
        } else {
            self.distance < other.distance
        }
    }
}

fn pick_rate_for_range(min: u32, max: u32, preferred: Option<u32>) -> u32 {
    match preferred {
        Some(rate) => rate.clamp(min, max.max(min)),
        None => max.max(min).min(48_000).max(min),
    }
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(exact: bool, stereo: bool, format_rank: u8, distance: u32) -> Candidate {
        Candidate {
            exact,
            stereo,
            format_rank,
            distance,
        }
    }

    #[test]
    fn matches_device_name_is_case_insensitive() {
        assert!(matches_device_name("USB DAC", "dac"));
        assert!(!matches_device_name("USB DAC", "speaker"));
        assert!(!matches_device_name("USB DAC", "  "));
    }

    #[test]
    fn preferred_rate_is_clamped_into_range() {
        assert_eq!(pick_rate_for_range(44_100, 96_000, Some(48_000)), 48_000);
        assert_eq!(pick_rate_for_range(44_100, 96_000, Some(22_050)), 44_100);
        assert_eq!(pick_rate_for_range(44_100, 96_000, Some(192_000)), 96_000);
    }

    #[test]
    fn without_preference_rate_caps_at_48k() {
        assert_eq!(pick_rate_for_range(44_100, 192_000, None), 48_000);
        assert_eq!(pick_rate_for_range(96_000, 192_000, None), 96_000);
        assert_eq!(pick_rate_for_range(8_000, 22_050, None), 22_050);
    }

    #[test]
    fn exact_rate_beats_everything_else() {
        let exact_mono_int = candidate(true, false, 2, 0);
        let close_stereo_float = candidate(false, true, 0, 100);
        assert!(exact_mono_int.is_better_than(&close_stereo_float));
        assert!(!close_stereo_float.is_better_than(&exact_mono_int));
    }

    #[test]
    fn stereo_then_format_then_distance() {
        assert!(candidate(false, true, 2, 0).is_better_than(&candidate(false, false, 0, 0)));
        assert!(candidate(false, true, 0, 0).is_better_than(&candidate(false, true, 1, 0)));
        assert!(candidate(false, true, 0, 10).is_better_than(&candidate(false, true, 0, 20)));
        assert!(!candidate(false, true, 0, 20).is_better_than(&candidate(false, true, 0, 20)));
    }
}
