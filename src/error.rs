//! Error types for the station launcher

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Status error: {0}")]
    Status(#[from] StatusError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Backing key-value store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store task failed: {0}")]
    Task(String),
}

/// Frequency registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("frequency {frequency} is occupied")]
    FrequencyOccupied { frequency: String },

    #[error("Corrupt frequency record for {frequency}: {reason}")]
    CorruptRecord { frequency: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Content generation errors (one segment)
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Missing API key for the generative service")]
    MissingApiKey,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Prompt blocked: {0}")]
    Blocked(String),

    #[error("Response carried no transcript text")]
    MissingTranscript,

    #[error("Response carried no inline audio data")]
    MissingAudio,

    #[error("Invalid audio payload: {0}")]
    InvalidAudio(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        GenerationError::Request(e.to_string())
    }
}

/// Transcoding errors
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Invalid PCM input: {0}")]
    InvalidInput(String),

    #[error("Failed to spawn encoder: {0}")]
    Spawn(std::io::Error),

    #[error("Encoder exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("Encoder produced no output")]
    EmptyOutput,

    #[error("Encoder IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Streaming server connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Connection to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection to {0} timed out")]
    ConnectTimeout(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(std::io::Error),

    #[error("Write timed out after {0:?}")]
    WriteTimeout(std::time::Duration),

    #[error("Connection already closed")]
    Closed,

    #[error("Bitrate must be positive")]
    ZeroBitrate,
}

/// Status persistence errors
#[derive(Error, Debug)]
pub enum StatusError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Malformed status record: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
