//! CPAL output stream.
//!
//! The real-time callback renders `f32` frames from the engine's render state and
//! converts them to the device sample format. It never waits on anything but the
//! render-state mutex, which control calls only hold briefly.

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;

use crate::engine::RenderEngine;

/// Build a CPAL output stream that renders `engine`.
///
/// `config.channels` must match the channel count the engine was created with.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    engine: RenderEngine,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, engine),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, engine),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, engine),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, engine),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    engine: RenderEngine,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    let err_fn = |err| tracing::warn!("stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            scratch.resize(data.len(), 0.0);
            engine.render_into(&mut scratch);
            for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                *dst = <T as cpal::Sample>::from_sample::<f32>(*src);
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
