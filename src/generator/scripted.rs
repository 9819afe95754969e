//! Deterministic in-process generator

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::ContentGenerator;
use crate::error::GenerationError;
use crate::station::{Segment, SegmentSpec, VoiceMap};

type Hook = Arc<dyn Fn(&SegmentSpec) -> Result<(), GenerationError> + Send + Sync>;

/// Produces fixed-length PCM without any network calls.
///
/// A hook runs before each segment and can fail it or trigger side
/// effects such as cancelling a launch.
pub struct ScriptedGenerator {
    sample_rate: u32,
    channels: u16,
    duration: Duration,
    hook: Option<Hook>,
    calls: AtomicU64,
}

impl ScriptedGenerator {
    pub fn new(sample_rate: u32, channels: u16, duration: Duration) -> Self {
        Self {
            sample_rate,
            channels,
            duration,
            hook: None,
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SegmentSpec) -> Result<(), GenerationError> + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Number of segments requested so far, failed ones included
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Size in bytes of each generated segment
    pub fn segment_len(&self) -> usize {
        let frames = (self.sample_rate as f64 * self.duration.as_secs_f64()).round() as usize;
        frames * self.channels as usize * 2
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate_segment(
        &self,
        spec: &SegmentSpec,
        voices: &VoiceMap,
    ) -> Result<Segment, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.hook {
            hook(spec)?;
        }

        // Byte pattern varies per segment so ordering bugs show up downstream
        let seed = spec.index as usize;
        let raw_audio: Vec<u8> = (0..self.segment_len())
            .map(|i| ((i + seed * 7) % 251) as u8)
            .collect();

        let host = voices.speakers().next().unwrap_or("Host");
        Ok(Segment {
            index: spec.index,
            kind: spec.kind,
            transcript: format!("{host}: {} segment {} about {}", spec.kind, spec.index, spec.topic),
            raw_audio: Bytes::from(raw_audio),
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }
}
