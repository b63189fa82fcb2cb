//! Typed settings models.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Torrent storage.
    pub torrent: TorrentSettings,
    /// Load pipeline bounds.
    pub loader: LoaderSettings,
    /// Connection to the backend process.
    pub backend: BackendSettings,
    /// Log output.
    pub logging: LogSettings,
}

/// Torrent storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TorrentSettings {
    /// Directory where torrent data is stored.
    pub directory: PathBuf,
}

impl Default for TorrentSettings {
    fn default() -> Self {
        Self {
            directory: std::env::temp_dir().join("popcorn-fx").join("torrents"),
        }
    }
}

/// Bounds applied by the load pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderSettings {
    /// Upper bound for searching available subtitles.
    pub retrieve_subtitles_timeout_secs: u64,
    /// Upper bound for downloading and parsing the selected subtitle.
    pub download_subtitle_timeout_secs: u64,
    /// Upper bound for waiting on the backend session.
    pub session_init_timeout_secs: u64,
    /// Automatic restarts after a stream preparation failure.
    pub max_prepare_retries: u32,
}

impl LoaderSettings {
    /// Subtitle search bound.
    #[must_use]
    pub const fn retrieve_subtitles_timeout(&self) -> Duration {
        Duration::from_secs(self.retrieve_subtitles_timeout_secs)
    }

    /// Subtitle download bound.
    #[must_use]
    pub const fn download_subtitle_timeout(&self) -> Duration {
        Duration::from_secs(self.download_subtitle_timeout_secs)
    }

    /// Session wait bound.
    #[must_use]
    pub const fn session_init_timeout(&self) -> Duration {
        Duration::from_secs(self.session_init_timeout_secs)
    }
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            retrieve_subtitles_timeout_secs: 15,
            download_subtitle_timeout_secs: 30,
            session_init_timeout_secs: 60,
            max_prepare_retries: 3,
        }
    }
}

/// Backend process connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSettings {
    /// `host:port` the backend listens on.
    pub address: String,
    /// Upper bound for a single request/response exchange.
    pub request_timeout_ms: u64,
}

impl BackendSettings {
    /// Request bound as a duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:9876".to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

/// Output format of log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormatSetting {
    /// Human readable multi-line output.
    Pretty,
    /// One JSON object per record.
    Json,
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Output format; inferred from the build profile when absent.
    pub format: Option<LogFormatSetting>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
        }
    }
}
