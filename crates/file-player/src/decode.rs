//! Whole-file decoding into an [`AudioFile`].
//!
//! Uses Symphonia to probe the container, decode the default track to interleaved
//! `f32` and capture best-effort codec metadata. Looping needs random access to every
//! frame, so unlike a streaming decoder the entire file is held in memory.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::file::AudioFile;

/// Metadata captured while probing the source.
#[derive(Clone, Debug, Default)]
pub struct SourceInfo {
    /// Codec name (best-effort).
    pub codec: Option<String>,
    /// Source bit depth (best-effort).
    pub bit_depth: Option<u16>,
    /// Container/extension hint (best-effort).
    pub container: Option<String>,
}

/// Decode the file at `path` completely.
pub fn load_file(path: &Path) -> Result<AudioFile> {
    let file = File::open(path).with_context(|| format!("open {:?}", path))?;

    let mut hint = Hint::new();
    let ext = path.extension().and_then(|e| e.to_str());
    if let Some(ext) = ext {
        hint.with_extension(ext);
    }

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string);
    let container = ext.map(|e| e.to_ascii_uppercase());

    load_from_media_source(Box::new(file), hint, name, container)
        .with_context(|| format!("decode {:?}", path))
}

/// Decode an arbitrary Symphonia [`MediaSource`] completely.
pub fn load_from_media_source(
    source: Box<dyn MediaSource>,
    hint: Hint,
    name: Option<String>,
    container: Option<String>,
) -> Result<AudioFile> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("No default audio track"))?;
    let track_id = track.id;
    let codec_params: CodecParameters = track.codec_params.clone();

    let channels = codec_params
        .channels
        .ok_or_else(|| anyhow!("Unknown channels"))?
        .count();
    let rate = codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("Unknown sample rate"))?;

    let info = SourceInfo {
        codec: codec_name_from_params(&codec_params),
        bit_depth: codec_params
            .bits_per_sample
            .or(codec_params.bits_per_coded_sample)
            .and_then(|v| u16::try_from(v).ok()),
        container,
    };

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::with_capacity(capacity_hint(&codec_params, channels));
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(_)) => {
                skipped_packets += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    if skipped_packets > 0 {
        tracing::warn!(skipped_packets, "corrupt packets skipped while decoding");
    }

    let file = AudioFile::with_info(samples, channels, rate, name, info);
    tracing::info!(
        file = file.name().unwrap_or(""),
        channels,
        rate_hz = rate,
        frames = file.frame_count(),
        duration_s = file.duration(),
        codec = file.source_info().codec.as_deref().unwrap_or("unknown"),
        "decoded audio file"
    );
    Ok(file)
}

/// Sample capacity to reserve up front, capped so bogus headers cannot over-allocate.
fn capacity_hint(codec_params: &CodecParameters, channels: usize) -> usize {
    const MAX_RESERVE_SAMPLES: u64 = 64 * 1024 * 1024;
    codec_params
        .n_frames
        .map(|frames| frames.saturating_mul(channels as u64).min(MAX_RESERVE_SAMPLES) as usize)
        .unwrap_or(0)
}

/// Best-effort codec label used for status output.
fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM_S32",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use symphonia::core::codecs::*;

    /// Minimal 16-bit PCM WAV image.
    fn wav_bytes(channels: u16, rate: u32, frames: &[i16]) -> Vec<u8> {
        let data_len = (frames.len() * 2) as u32;
        let block_align = channels * 2;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&rate.to_le_bytes());
        out.extend_from_slice(&(rate * block_align as u32).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in frames {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[test]
    fn decodes_wav_into_memory() {
        let samples: Vec<i16> = (0..800).map(|i| if i % 2 == 0 { 16_384 } else { -16_384 }).collect();
        let bytes = wav_bytes(2, 8_000, &samples);
        let mut hint = Hint::new();
        hint.with_extension("wav");

        let file = load_from_media_source(
            Box::new(Cursor::new(bytes)),
            hint,
            Some("tone.wav".to_string()),
            Some("WAV".to_string()),
        )
        .expect("decode wav");

        assert_eq!(file.channels(), 2);
        assert_eq!(file.sample_rate(), 8_000);
        assert_eq!(file.frame_count(), 400);
        assert!((file.duration() - 0.05).abs() < 1e-9);
        assert_eq!(file.name(), Some("tone.wav"));
        assert_eq!(file.source_info().codec.as_deref(), Some("PCM_S16"));
        assert!((file.samples()[0] - 0.5).abs() < 1e-3);
        assert!((file.samples()[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn load_file_reports_missing_path() {
        let err = load_file(Path::new("/definitely/not/here.flac")).unwrap_err();
        assert!(format!("{err:#}").contains("open"));
    }

    #[test]
    fn capacity_hint_is_capped() {
        let mut params = CodecParameters::new();
        assert_eq!(capacity_hint(&params, 2), 0);
        params.n_frames = Some(1_000);
        assert_eq!(capacity_hint(&params, 2), 2_000);
        params.n_frames = Some(u64::MAX);
        assert_eq!(capacity_hint(&params, 2), 64 * 1024 * 1024);
    }

    #[test]
    fn codec_name_from_params_maps_known_codecs() {
        let mut params = CodecParameters::new();
        params.codec = CODEC_TYPE_FLAC;
        assert_eq!(codec_name_from_params(&params), Some("FLAC".to_string()));
        params.codec = CODEC_TYPE_PCM_S16LE;
        assert_eq!(codec_name_from_params(&params), Some("PCM_S16".to_string()));
        assert!(codec_name_from_params(&CodecParameters::new()).is_none());
    }
}
