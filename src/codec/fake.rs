//! In-memory transcoder for tests

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::{pcm_duration_secs, validate_pcm, Transcoder};
use crate::error::TranscodeError;

/// Produces a buffer the size a CBR MP3 of the input would have.
///
/// Output bytes are taken cyclically from the input, so content and order
/// can be checked on the receiving side.
#[derive(Default)]
pub struct FakeTranscoder {
    fail: AtomicBool,
    calls: AtomicU64,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let fake = Self::default();
        fake.set_failing(true);
        fake
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Output size for `len` bytes of PCM
    pub fn output_len(len: usize, sample_rate: u32, channels: u16, bitrate: u32) -> usize {
        let secs = pcm_duration_secs(len, sample_rate, channels);
        ((secs * bitrate as f64 / 8.0).round() as usize).max(1)
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn encode(
        &self,
        pcm: Bytes,
        sample_rate: u32,
        channels: u16,
        bitrate: u32,
    ) -> Result<Bytes, TranscodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        validate_pcm(&pcm, sample_rate, channels)?;
        if self.fail.load(Ordering::SeqCst) {
            return Err(TranscodeError::Failed {
                code: Some(1),
                stderr: "fake encoder failure".into(),
            });
        }

        let len = Self::output_len(pcm.len(), sample_rate, channels, bitrate);
        Ok(pcm.iter().copied().cycle().take(len).collect())
    }
}
