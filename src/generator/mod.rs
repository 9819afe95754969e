//! Content generation
//!
//! A [`ContentGenerator`] turns a [`SegmentSpec`] into one segment of raw
//! PCM speech. The production client talks to the Gemini API; the scripted
//! generator stands in for it in tests.

pub mod gemini;
pub mod plan;
pub mod scripted;

pub use gemini::GeminiGenerator;
pub use plan::SegmentPlan;
pub use scripted::ScriptedGenerator;

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::station::{Segment, SegmentSpec, VoiceMap};

/// Source of broadcast segments.
///
/// Implementations report every failure and never retry; retry policy
/// belongs to the caller.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_segment(
        &self,
        spec: &SegmentSpec,
        voices: &VoiceMap,
    ) -> Result<Segment, GenerationError>;
}
