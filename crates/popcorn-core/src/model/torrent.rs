use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Opaque identifier of a torrent owned by the backend process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TorrentHandle(pub u64);

impl Display for TorrentHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "torrent#{}", self.0)
    }
}

/// Opaque identifier of a torrent stream owned by the backend process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamHandle(pub u64);

impl Display for StreamHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Lifecycle state of a single torrent as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    /// Metadata of the torrent is still being created.
    Initializing,
    /// Existing files are being validated.
    CheckingFiles,
    /// Metadata is being retrieved from peers.
    RetrievingMetadata,
    /// Metadata is available, the download can start.
    Ready,
    /// The download is starting.
    Starting,
    /// The torrent is downloading.
    Downloading,
    /// The download has been paused.
    Paused,
    /// Every piece has been downloaded.
    Completed,
    /// The torrent failed and cannot be downloaded.
    Error,
}

impl TorrentState {
    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::CheckingFiles => "checking_files",
            Self::RetrievingMetadata => "retrieving_metadata",
            Self::Ready => "ready",
            Self::Starting => "starting",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl Display for TorrentState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the backend torrent session which hosts every torrent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// The session is being created.
    #[default]
    Creating,
    /// The session exists but is still initializing.
    Initializing,
    /// The session accepts torrents.
    Running,
    /// The session failed to start.
    Error,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Creating => "creating",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Download statistics pushed by the backend while a torrent is active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadStatus {
    /// Progress between 0 and 1.
    pub progress: f32,
    /// Number of seeds available for the torrent.
    pub seeds: u32,
    /// Number of connected peers.
    pub peers: u32,
    /// Payload download rate in bytes per second.
    pub download_speed: u64,
    /// Payload upload rate in bytes per second.
    pub upload_speed: u64,
    /// Total amount of payload downloaded in bytes.
    pub downloaded: u64,
    /// Total size of the torrent in bytes.
    pub total_size: u64,
}

impl DownloadStatus {
    /// Progress expressed as a percentage, clamped to `0..=100`.
    #[must_use]
    pub fn percent_complete(&self) -> f32 {
        (self.progress * 100.0).clamp(0.0, 100.0)
    }
}

/// Callback payload for torrent push notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TorrentEvent {
    /// The torrent moved to another state.
    StateChanged {
        /// Previous state.
        old: TorrentState,
        /// New state.
        new: TorrentState,
    },
    /// Fresh download statistics.
    DownloadStatus(DownloadStatus),
    /// The torrent failed.
    Error {
        /// Backend supplied reason.
        message: String,
    },
}

/// Callback payload for stream push notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Enough data is available and the stream url can be played.
    Ready,
    /// The stream has been stopped.
    Stopped,
    /// The stream failed.
    Error {
        /// Backend supplied reason.
        message: String,
    },
}

/// Individual file within a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFileInfo {
    /// File name without directories.
    pub filename: String,
    /// Path of the file within the torrent.
    pub file_path: String,
    /// Size in bytes.
    pub file_size: u64,
    /// Index of the file within the torrent.
    pub file_index: u32,
}

/// Metadata of a resolved torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Magnet uri of the torrent.
    pub uri: String,
    /// Display name of the torrent.
    pub name: String,
    /// Directory inside the torrent that holds the media files, if any.
    pub directory_name: Option<String>,
    /// Files contained in the torrent.
    pub files: Vec<TorrentFileInfo>,
}

impl TorrentInfo {
    /// Find a file by name, ignoring case and path separators.
    ///
    /// The name is first matched as-is, then prefixed with the torrent directory.
    #[must_use]
    pub fn by_filename(&self, filename: &str) -> Option<TorrentFileInfo> {
        let expected = simplified_filepath(filename);
        self.find_by_path(&expected)
            .or_else(|| {
                debug!(
                    filename,
                    directory = ?self.directory_name,
                    "torrent file not found without directory, retrying with directory"
                );
                let directory = self.directory_name.as_deref().unwrap_or_default();
                let expected = format!("{}{expected}", simplified_filepath(directory));
                self.find_by_path(&expected)
            })
            .cloned()
    }

    /// The largest file of the torrent; the first one wins on equal sizes.
    #[must_use]
    pub fn largest_file(&self) -> Option<TorrentFileInfo> {
        let mut largest: Option<&TorrentFileInfo> = None;
        for file in &self.files {
            if file.file_size > largest.map_or(0, |current| current.file_size) {
                largest = Some(file);
            }
        }
        largest.cloned()
    }

    fn find_by_path(&self, expected: &str) -> Option<&TorrentFileInfo> {
        self.files.iter().find(|file| {
            let path = simplified_filepath(&file.file_path);
            trace!(path = %path, expected, "comparing torrent file path");
            path.eq_ignore_ascii_case(expected)
        })
    }
}

fn simplified_filepath(path: &str) -> String {
    path.replace(['/', '\\'], "").trim().to_string()
}
