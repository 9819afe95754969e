//! Application configuration
//!
//! Loaded from TOML, then overridden from the environment so deployments
//! can keep secrets out of the file.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::Error;
use crate::station::VoiceMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: StreamServerConfig,
    pub generation: GenerationConfig,
    pub broadcast: BroadcastConfig,
    pub storage: StorageConfig,
    pub ui: UiConfig,
}

/// Streaming media server (Icecast) connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamServerConfig {
    pub host: String,
    pub port: u16,
    /// Source identity used in the Basic auth header
    pub source_user: String,
    pub password: String,
    /// Target MP3 bitrate in bits per second
    pub bitrate: u32,
    pub chunk_size: usize,
    pub connect_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for StreamServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_ICECAST_PORT,
            source_user: "source".into(),
            password: "hackme".into(),
            bitrate: DEFAULT_BITRATE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout_ms: 5_000,
            write_timeout_ms: 10_000,
        }
    }
}

impl StreamServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Generative service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Usually supplied through `GEMINI_API_KEY`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub text_model: String,
    pub tts_model: String,
    pub request_timeout_ms: u64,
    pub voices: VoiceMap,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".into(),
            text_model: "gemini-2.0-flash".into(),
            tts_model: "gemini-2.5-flash-preview-tts".into(),
            request_timeout_ms: 120_000,
            voices: VoiceMap::default(),
        }
    }
}

impl GenerationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Broadcast loop policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Pause between segments
    pub segment_gap_ms: u64,
    /// Retries for a failed segment after the first one
    pub segment_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            segment_gap_ms: 500,
            segment_retries: 2,
            retry_backoff_ms: 1_000,
        }
    }
}

impl BroadcastConfig {
    pub fn segment_gap(&self) -> Duration {
        Duration::from_millis(self.segment_gap_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `frequencies/` and `status/`
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
        }
    }
}

impl StorageConfig {
    /// Storage location from the environment alone, used when the config
    /// file itself cannot be loaded
    pub fn from_lookup<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        var("STATION_DATA_DIR")
            .map(|dir| Self {
                data_dir: PathBuf::from(dir),
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub bind_address: String,
    pub http_port: u16,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".into(),
            http_port: DEFAULT_HTTP_PORT,
        }
    }
}

impl AppConfig {
    /// Default config file location for this platform
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "airwaves", "ai-radio-station")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn from_toml(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    /// Load from `path`, else the platform default if present, else
    /// defaults; then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(p) => {
                    tracing::info!("Loading config from {}", p.display());
                    Self::from_file(&p)?
                }
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("ICECAST_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("ICECAST_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("ICECAST_PORT is not a port: {port}")))?;
        }
        if let Some(password) = var("ICECAST_SOURCE_PASSWORD") {
            self.server.password = password;
        }
        if let Some(key) = var("GEMINI_API_KEY").filter(|k| !k.is_empty()) {
            self.generation.api_key = Some(key);
        }
        if let Some(dir) = var("STATION_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(port) = var("STATION_HTTP_PORT") {
            self.ui.http_port = port
                .parse()
                .map_err(|_| Error::Config(format!("STATION_HTTP_PORT is not a port: {port}")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.server.bitrate < 8_000 {
            return Err(Error::Config(format!(
                "bitrate {} is too low",
                self.server.bitrate
            )));
        }
        if self.server.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".into()));
        }
        // Multi-speaker synthesis takes exactly two named speakers
        let speakers: Vec<&str> = self.generation.voices.speakers().collect();
        if speakers.len() != 2 || speakers[0] == speakers[1] {
            return Err(Error::Config(format!(
                "exactly two distinct host voices are required, got {speakers:?}"
            )));
        }
        Ok(())
    }
}
