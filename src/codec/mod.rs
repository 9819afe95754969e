//! PCM to MP3 transcoding
//!
//! Generated speech arrives as raw s16le PCM; the streaming server wants
//! MP3. [`Transcoder`] hides how the conversion happens.

pub mod fake;
pub mod ffmpeg;

pub use fake::FakeTranscoder;
pub use ffmpeg::FfmpegTranscoder;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TranscodeError;

/// Whole-buffer PCM encoder
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Encode interleaved s16le `pcm` to MP3 at `bitrate` bits per second
    async fn encode(
        &self,
        pcm: Bytes,
        sample_rate: u32,
        channels: u16,
        bitrate: u32,
    ) -> Result<Bytes, TranscodeError>;
}

/// Check that `pcm` holds whole s16 frames for `channels`
pub fn validate_pcm(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<(), TranscodeError> {
    if pcm.is_empty() {
        return Err(TranscodeError::InvalidInput("empty PCM buffer".into()));
    }
    if sample_rate == 0 || channels == 0 {
        return Err(TranscodeError::InvalidInput(format!(
            "invalid format {sample_rate} Hz x {channels}"
        )));
    }
    let frame = 2 * channels as usize;
    if pcm.len() % frame != 0 {
        return Err(TranscodeError::InvalidInput(format!(
            "{} bytes is not a multiple of the {frame}-byte frame",
            pcm.len()
        )));
    }
    Ok(())
}

/// Playback duration of s16le PCM in seconds
pub fn pcm_duration_secs(len: usize, sample_rate: u32, channels: u16) -> f64 {
    len as f64 / (sample_rate as f64 * channels as f64 * 2.0)
}
