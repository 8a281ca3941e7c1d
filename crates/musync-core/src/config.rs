use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    #[serde(default)]
    pub log_level: LogLevel,
    pub music_folder: PathBuf,
    pub playlists: Vec<PlaylistEntry>,
    #[serde(default = "default_grace_period")]
    pub deletion_grace_period: u32,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub empty_snapshot: EmptySnapshotPolicy,
    #[serde(default)]
    pub max_fetch_attempts: Option<u32>,
    #[serde(default)]
    pub downloader: DownloaderConfig,
}

fn default_grace_period() -> u32 {
    1
}

fn default_refresh_interval() -> u64 {
    6 * 60 * 60
}

fn default_poll_interval() -> u64 {
    60
}

impl SyncConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.playlists.is_empty() {
            return Err(ConfigValidationError::EmptyPlaylists);
        }
        if self.music_folder.as_os_str().is_empty() {
            return Err(ConfigValidationError::InvalidMusicFolder);
        }
        if self.deletion_grace_period == 0 {
            return Err(ConfigValidationError::ZeroGracePeriod);
        }
        if self.refresh_interval_secs == 0 || self.poll_interval_secs == 0 {
            return Err(ConfigValidationError::ZeroInterval);
        }
        if self.max_fetch_attempts == Some(0) {
            return Err(ConfigValidationError::ZeroFetchAttempts);
        }

        let mut seen = HashSet::new();
        for entry in &self.playlists {
            if entry.name.trim().is_empty() || entry.url.trim().is_empty() {
                return Err(ConfigValidationError::IncompletePlaylist(entry.name.clone()));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigValidationError::DuplicatePlaylist(entry.name.clone()));
            }
        }
        Ok(())
    }

    pub fn playlist_folder(&self, entry: &PlaylistEntry) -> PathBuf {
        self.music_folder.join(&entry.subfolder)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy {
            grace_period: self.deletion_grace_period,
            empty_snapshot: self.empty_snapshot,
            max_fetch_attempts: self.max_fetch_attempts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub subfolder: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloaderConfig {
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
}

fn default_binary() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_audio_format() -> String {
    "mp3".into()
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            audio_format: default_audio_format(),
        }
    }
}

/// How a successful query that returned no songs is interpreted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmptySnapshotPolicy {
    /// Treat it like a failed query and leave every tracked song alone.
    #[default]
    Skip,
    /// Trust it: the remote playlist really is empty.
    Apply,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[serde(alias = "TRACE")]
    Trace,
    #[serde(alias = "DEBUG")]
    Debug,
    #[default]
    #[serde(alias = "INFO")]
    Info,
    #[serde(alias = "WARN")]
    Warn,
    #[serde(alias = "ERROR")]
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// The knobs a playlist needs while reconciling and downloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    pub grace_period: u32,
    pub empty_snapshot: EmptySnapshotPolicy,
    pub max_fetch_attempts: Option<u32>,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            grace_period: default_grace_period(),
            empty_snapshot: EmptySnapshotPolicy::Skip,
            max_fetch_attempts: None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("no playlists configured")]
    EmptyPlaylists,
    #[error("music folder must be provided")]
    InvalidMusicFolder,
    #[error("deletion grace period must be at least 1")]
    ZeroGracePeriod,
    #[error("refresh and poll intervals must be non-zero")]
    ZeroInterval,
    #[error("max fetch attempts must be at least 1 when set")]
    ZeroFetchAttempts,
    #[error("playlist {0:?} needs both a name and a url")]
    IncompletePlaylist(String),
    #[error("playlist name {0:?} is used more than once")]
    DuplicatePlaylist(String),
}
