//! Whole-buffer sample-rate conversion.
//!
//! Uses Rubato's sinc resampler to convert a decoded file to the output device rate
//! once, so the render callback can play any frame range without converting on the
//! fly. The result is delay-compensated and exactly `round(frames * to / from)` frames
//! long, which keeps file-frame to output-frame mapping a pure ratio.

use anyhow::{Context, Result, anyhow};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

/// Output length in frames for `frames` input frames converted `from_rate` → `to_rate`.
pub fn resampled_len(frames: usize, from_rate: u32, to_rate: u32) -> usize {
    if from_rate == 0 {
        return 0;
    }
    (frames as f64 * to_rate as f64 / from_rate as f64).round() as usize
}

/// Convert interleaved `samples` from `from_rate` to `to_rate`.
///
/// `chunk_frames` is the resampler's fixed input chunk size. Equal rates return a copy.
pub fn resample_interleaved(
    samples: &[f32],
    channels: usize,
    from_rate: u32,
    to_rate: u32,
    chunk_frames: usize,
) -> Result<Vec<f32>> {
    if channels == 0 || from_rate == 0 || to_rate == 0 {
        return Err(anyhow!(
            "invalid resample request: channels={channels} from={from_rate} to={to_rate}"
        ));
    }
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let in_frames = samples.len() / channels;
    let expected = resampled_len(in_frames, from_rate, to_rate);
    let f_ratio = to_rate as f64 / from_rate as f64;

    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };

    let chunk = chunk_frames.max(1);
    let mut resampler = Async::<f32>::new_sinc(f_ratio, 1.1, &params, chunk, channels, FixedAsync::Input)
        .context("resampler init")?;

    let delay = resampler.output_delay();
    let target = expected + delay;
    let mut out: Vec<f32> = Vec::with_capacity(target * channels);
    let mut out_chunk = vec![0.0f32; channels * resampler.output_frames_max()];
    let mut padded = vec![0.0f32; channels * chunk];

    let mut indexing = Indexing {
        input_offset: 0,
        output_offset: 0,
        active_channels_mask: None,
        partial_len: None,
    };

    let mut pos = 0usize;
    let mut idle_rounds = 0usize;
    while out.len() / channels < target {
        let take = in_frames.saturating_sub(pos).min(chunk);
        let input: &[f32] = if take == chunk {
            &samples[pos * channels..(pos + chunk) * channels]
        } else {
            // Tail and flush rounds: zero-padded, with only `take` frames real.
            padded.fill(0.0);
            padded[..take * channels].copy_from_slice(&samples[pos * channels..(pos + take) * channels]);
            &padded
        };
        pos += take;

        let input_adapter = InterleavedSlice::new(input, channels, chunk)
            .map_err(|e| anyhow!("interleaved slice (input) error: {e}"))?;
        let out_capacity_frames = out_chunk.len() / channels;
        let mut output_adapter = InterleavedSlice::new_mut(&mut out_chunk, channels, out_capacity_frames)
            .map_err(|e| anyhow!("interleaved slice (output) error: {e}"))?;

        indexing.partial_len = if take == chunk { None } else { Some(take) };
        let (_nbr_in, nbr_out) = resampler
            .process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing))
            .context("resampler process")?;

        if nbr_out == 0 {
            idle_rounds += 1;
            if idle_rounds > 8 {
                break;
            }
            continue;
        }
        idle_rounds = 0;
        out.extend_from_slice(&out_chunk[..nbr_out * channels]);
    }

    let skip = (delay * channels).min(out.len());
    out.drain(..skip);
    out.resize(expected * channels, 0.0);

    tracing::debug!(
        from_hz = from_rate,
        to_hz = to_rate,
        in_frames,
        out_frames = expected,
        "resampled buffer"
    );
    Ok(out)
}
