//! Station data model
//!
//! Identifiers, persisted records and segment types shared by the
//! registry, the status reporter, the generator and the orchestrator.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Broadcast channel identifier, e.g. `101.1`
///
/// Doubles as the Icecast mount name, so only characters that are safe in
/// both a URL path and a file name are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Frequency(String);

impl Frequency {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Server-side mount path for this channel
    pub fn mount_path(&self) -> String {
        format!("/{}.mp3", self.0)
    }
}

fn validate_token(kind: &str, s: &str) -> Result<(), Error> {
    if s.is_empty() {
        return Err(Error::Config(format!("{kind} must not be empty")));
    }
    // Same rule as store keys: the token names a file
    if s == "." || s.contains("..") {
        return Err(Error::Config(format!("invalid {kind}: {s:?}")));
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(Error::Config(format!("invalid {kind}: {s:?}")));
    }
    Ok(())
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        validate_token("frequency", s)?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for Frequency {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Frequency> for String {
    fn from(f: Frequency) -> Self {
        f.0
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique id of one launch attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LaunchId(String);

impl LaunchId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for LaunchId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        validate_token("launch id", s)?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for LaunchId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LaunchId> for String {
    fn from(id: LaunchId) -> Self {
        id.0
    }
}

impl fmt::Display for LaunchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted record of who holds a frequency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyRecord {
    #[serde(skip)]
    pub frequency: Option<Frequency>,
    pub name: String,
}

/// Launch outcome as seen by a polling caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchStatus {
    Pending,
    Success,
    Failed,
}

/// Persisted status of one launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: LaunchStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl StatusRecord {
    pub fn pending() -> Self {
        Self {
            status: LaunchStatus::Pending,
            message: String::new(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: LaunchStatus::Success,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: LaunchStatus::Failed,
            message: message.into(),
        }
    }
}

/// Parameters of a launch request
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub frequency: Frequency,
    pub station_name: String,
    pub topic: String,
    pub launch_id: LaunchId,
}

/// A station as tracked by its orchestrator
#[derive(Debug, Clone)]
pub struct Station {
    pub frequency: Frequency,
    pub name: String,
    pub launch_id: LaunchId,
    pub status: StatusRecord,
}

impl Station {
    pub fn from_request(req: &LaunchRequest) -> Self {
        Self {
            frequency: req.frequency.clone(),
            name: req.station_name.clone(),
            launch_id: req.launch_id.clone(),
            status: StatusRecord::pending(),
        }
    }
}

/// Kind of broadcast content in a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    ColdOpen,
    Topic,
    Banter,
    Ad,
    Outro,
}

impl SegmentKind {
    /// Rough transcript length that keeps a segment under a minute of audio
    pub fn target_words(self) -> u32 {
        match self {
            SegmentKind::ColdOpen => 50,
            SegmentKind::Topic => 80,
            SegmentKind::Banter => 60,
            SegmentKind::Ad => 40,
            SegmentKind::Outro => 40,
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SegmentKind::ColdOpen => "cold_open",
            SegmentKind::Topic => "topic",
            SegmentKind::Banter => "banter",
            SegmentKind::Ad => "ad",
            SegmentKind::Outro => "outro",
        };
        f.write_str(name)
    }
}

/// What the generator is asked to produce
#[derive(Debug, Clone)]
pub struct SegmentSpec {
    pub index: u64,
    pub kind: SegmentKind,
    pub target_words: u32,
    pub topic: String,
}

impl SegmentSpec {
    pub fn new(index: u64, kind: SegmentKind, topic: impl Into<String>) -> Self {
        Self {
            index,
            kind,
            target_words: kind.target_words(),
            topic: topic.into(),
        }
    }
}

/// Ordered mapping of speaker name to prebuilt voice name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceMap(pub Vec<SpeakerVoice>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerVoice {
    pub speaker: String,
    pub voice: String,
}

impl VoiceMap {
    pub fn speakers(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|sv| sv.speaker.as_str())
    }
}

impl Default for VoiceMap {
    fn default() -> Self {
        Self(vec![
            SpeakerVoice {
                speaker: "Dr. Aman".into(),
                voice: "Kore".into(),
            },
            SpeakerVoice {
                speaker: "Liam".into(),
                voice: "Puck".into(),
            },
        ])
    }
}

/// One generated unit of broadcast content, raw s16le PCM
#[derive(Debug, Clone)]
pub struct Segment {
    pub index: u64,
    pub kind: SegmentKind,
    pub transcript: String,
    pub raw_audio: Bytes,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Segment {
    /// Playback duration of the raw audio in seconds
    pub fn duration_secs(&self) -> f64 {
        let bytes_per_sec = self.sample_rate as f64 * self.channels as f64 * 2.0;
        if bytes_per_sec == 0.0 {
            0.0
        } else {
            self.raw_audio.len() as f64 / bytes_per_sec
        }
    }
}
