//! ffmpeg-backed MP3 encoder
//!
//! Pipes PCM through `ffmpeg -f s16le ... -f mp3 pipe:1`. The child is
//! killed if the encode future is dropped, so a cancelled launch does not
//! leave encoders behind.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{validate_pcm, Transcoder};
use crate::error::TranscodeError;

/// Bytes of stderr kept in error messages
const STDERR_TAIL: usize = 512;

pub struct FfmpegTranscoder {
    program: String,
    stats: Mutex<EncoderStats>,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            stats: Mutex::new(EncoderStats::default()),
        }
    }

    fn args(sample_rate: u32, channels: u16, bitrate: u32) -> Vec<String> {
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "s16le".into(),
            "-ar".into(),
            sample_rate.to_string(),
            "-ac".into(),
            channels.to_string(),
            "-i".into(),
            "pipe:0".into(),
            "-f".into(),
            "mp3".into(),
            "-b:a".into(),
            format!("{}k", bitrate / 1000),
            "pipe:1".into(),
        ]
    }

    pub fn stats(&self) -> EncoderStats {
        self.stats.lock().clone()
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let start = text
        .char_indices()
        .rev()
        .nth(STDERR_TAIL)
        .map(|(i, _)| i)
        .unwrap_or(0);
    text[start..].to_string()
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn encode(
        &self,
        pcm: Bytes,
        sample_rate: u32,
        channels: u16,
        bitrate: u32,
    ) -> Result<Bytes, TranscodeError> {
        validate_pcm(&pcm, sample_rate, channels)?;
        let input_len = pcm.len();

        let mut child = Command::new(&self.program)
            .args(Self::args(sample_rate, channels, bitrate))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(TranscodeError::Spawn)?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TranscodeError::Io(std::io::Error::other("encoder stdin not captured")))?;

        // Feed stdin concurrently with draining stdout, or a full pipe deadlocks both sides
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&pcm).await;
            drop(stdin);
            result
        });

        let output = child.wait_with_output().await?;
        let write_result = writer.await.map_err(std::io::Error::other)?;

        if !output.status.success() {
            self.stats.lock().failures += 1;
            return Err(TranscodeError::Failed {
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        write_result?;

        if output.stdout.is_empty() {
            self.stats.lock().failures += 1;
            return Err(TranscodeError::EmptyOutput);
        }

        {
            let mut stats = self.stats.lock();
            stats.segments_encoded += 1;
            stats.bytes_in += input_len as u64;
            stats.bytes_out += output.stdout.len() as u64;
        }
        tracing::debug!(
            input = input_len,
            output = output.stdout.len(),
            "Encoded segment to MP3 at {} kbps",
            bitrate / 1000
        );
        Ok(Bytes::from(output.stdout))
    }
}

/// Encoder statistics
#[derive(Debug, Clone, Default)]
pub struct EncoderStats {
    pub segments_encoded: u64,
    pub failures: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}
