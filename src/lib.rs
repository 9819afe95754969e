//! # AI Radio Station
//!
//! Launches a talk-radio station on a frequency and keeps it on air with
//! generated two-host segments streamed to an Icecast server.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                  launch_station / station_server (ui)                     │
//! │        LaunchRequest { frequency, station name, topic, launch id }        │
//! └───────────────────────────────────┬──────────────────────────────────────┘
//!                                     │
//!                                     ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                  Launch Orchestrator (orchestrator)                       │
//! │                                                                          │
//! │   Idle ──► FrequencyClaimed ──► Streaming ──► Terminated(ok | failed)    │
//! │                                                                          │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐                  │
//! │  │  Frequency   │   │   Status     │   │ Segment Plan │                  │
//! │  │  Registry    │   │   Reporter   │   │  (generator) │                  │
//! │  └──────┬───────┘   └──────┬───────┘   └──────┬───────┘                  │
//! │         │                  │                  │                          │
//! │         ▼                  ▼                  ▼                          │
//! │  ┌─────────────────────────────────┐   ┌──────────────┐                  │
//! │  │   Key-Value Store (store)       │   │  Generator   │  transcript+TTS  │
//! │  │   frequencies/  status/         │   │  (Gemini)    │ ───► s16le PCM   │
//! │  └─────────────────────────────────┘   └──────┬───────┘                  │
//! │                                               ▼                          │
//! │                                        ┌──────────────┐                  │
//! │                                        │  Transcoder  │  PCM ──► MP3     │
//! │                                        │  (ffmpeg)    │                  │
//! │                                        └──────┬───────┘                  │
//! │                                               ▼                          │
//! │                                        ┌──────────────┐                  │
//! │                                        │   Streamer   │  paced chunks    │
//! │                                        │  (network)   │  at bitrate      │
//! │                                        └──────┬───────┘                  │
//! └───────────────────────────────────────────────┼──────────────────────────┘
//!                                                 │ TCP, SOURCE /<freq>.mp3
//!                                                 ▼
//!                                      ┌─────────────────────┐
//!                                      │   Icecast server    │
//!                                      └─────────────────────┘
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod generator;
pub mod network;
pub mod orchestrator;
pub mod registry;
pub mod station;
pub mod status;
pub mod store;
#[cfg(feature = "server")]
pub mod ui;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default Icecast listen port
    pub const DEFAULT_ICECAST_PORT: u16 = 8000;

    /// Default MP3 bitrate in bits per second
    pub const DEFAULT_BITRATE: u32 = 96_000;

    /// Bytes written per paced send
    pub const DEFAULT_CHUNK_SIZE: usize = 4096;

    /// Default control API port
    pub const DEFAULT_HTTP_PORT: u16 = 5000;

    /// PCM rate assumed when the TTS response omits it
    pub const DEFAULT_TTS_SAMPLE_RATE: u32 = 24_000;

    /// TTS output is mono
    pub const DEFAULT_TTS_CHANNELS: u16 = 1;

    /// Station name used when a launch request leaves it blank
    pub const DEFAULT_STATION_NAME: &str = "Unnamed Station";

    /// Topic used when a launch request leaves it blank
    pub const DEFAULT_TOPIC: &str = "Empty, topicless podcast where we talk about nothing";
}
