//! Typed messages understood by the backend process.

use popcorn_core::{
    Episode, MovieDetails, SessionState, ShowDetails, StreamEvent, StreamHandle, Subtitle,
    SubtitleInfo, SubtitleMatcher, TorrentEvent, TorrentFileInfo, TorrentHandle, TorrentInfo,
    TorrentState,
};
use serde::{Deserialize, Serialize};

use crate::message::IpcMessage;

macro_rules! ipc_message {
    ($($name:ident),+ $(,)?) => {
        $(
            impl IpcMessage for $name {
                const TYPE: &'static str = stringify!($name);
            }
        )+
    };
}

/// Classification of a backend error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The stream could not be prepared; the load may be restarted.
    PrepareFailed,
    /// The referenced torrent or stream does not exist.
    NotFound,
    /// Any other failure.
    Other,
}

/// Error reply sent instead of the expected response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Human readable reason.
    pub reason: String,
}

/// Empty acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {}

/// Resolve the metadata of a magnet or torrent url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTorrentInfoRequest {
    /// Magnet or torrent url.
    pub url: String,
}

/// Reply to [`GetTorrentInfoRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTorrentInfoResponse {
    /// Resolved metadata.
    pub info: TorrentInfo,
}

/// Create a torrent for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTorrentRequest {
    /// File to download.
    pub file_info: TorrentFileInfo,
    /// Storage directory.
    pub directory: String,
    /// Start downloading immediately.
    pub auto_start: bool,
}

/// Reply to [`CreateTorrentRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTorrentResponse {
    /// Handle of the new torrent.
    pub handle: TorrentHandle,
    /// Initial state.
    pub state: TorrentState,
}

/// Remove a torrent from the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveTorrentRequest {
    /// Torrent to remove.
    pub handle: TorrentHandle,
}

/// Query the session state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStateRequest {}

/// Reply to [`SessionStateRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStateResponse {
    /// Current session state.
    pub state: SessionState,
}

/// Pushed whenever the session state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStateChanged {
    /// New session state.
    pub state: SessionState,
}

/// Pushed for every torrent event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentEventNotification {
    /// Torrent the event belongs to.
    pub handle: TorrentHandle,
    /// The event.
    pub event: TorrentEvent,
}

/// Start streaming a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartStreamRequest {
    /// Torrent to stream.
    pub torrent: TorrentHandle,
}

/// Reply to [`StartStreamRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartStreamResponse {
    /// Handle of the new stream.
    pub handle: StreamHandle,
    /// Url serving the stream.
    pub url: String,
}

/// Stop a running stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopStreamRequest {
    /// Stream to stop.
    pub handle: StreamHandle,
}

/// Pushed for every stream event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEventNotification {
    /// Stream the event belongs to.
    pub handle: StreamHandle,
    /// The event.
    pub event: StreamEvent,
}

/// What to search subtitles for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubtitleQuery {
    /// Subtitles of a movie.
    Movie {
        /// The movie.
        movie: MovieDetails,
    },
    /// Subtitles of a show episode.
    Episode {
        /// The show.
        show: ShowDetails,
        /// The episode.
        episode: Episode,
    },
    /// Subtitles matching a filename.
    File {
        /// Filename to match.
        filename: String,
    },
}

/// Search available subtitles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveSubtitlesRequest {
    /// Search subject.
    pub query: SubtitleQuery,
}

/// Reply to [`RetrieveSubtitlesRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveSubtitlesResponse {
    /// Available subtitles.
    pub subtitles: Vec<SubtitleInfo>,
}

/// Download and parse a subtitle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSubtitleRequest {
    /// Subtitle to download.
    pub info: SubtitleInfo,
    /// File matching hints.
    pub matcher: SubtitleMatcher,
}

/// Reply to [`DownloadSubtitleRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSubtitleResponse {
    /// Parsed subtitle.
    pub subtitle: Subtitle,
}

/// Ask the backend to pick the preferred subtitle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultSubtitleRequest {
    /// Candidates.
    pub available: Vec<SubtitleInfo>,
}

/// Reply to [`DefaultSubtitleRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultSubtitleResponse {
    /// Selected subtitle, the none sentinel when nothing matches.
    pub info: SubtitleInfo,
}

/// Activate a subtitle for playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetActiveSubtitle {
    /// Subtitle to activate.
    pub subtitle: Subtitle,
}

ipc_message!(
    ErrorReply,
    Ack,
    GetTorrentInfoRequest,
    GetTorrentInfoResponse,
    CreateTorrentRequest,
    CreateTorrentResponse,
    RemoveTorrentRequest,
    SessionStateRequest,
    SessionStateResponse,
    SessionStateChanged,
    TorrentEventNotification,
    StartStreamRequest,
    StartStreamResponse,
    StopStreamRequest,
    StreamEventNotification,
    RetrieveSubtitlesRequest,
    RetrieveSubtitlesResponse,
    DownloadSubtitleRequest,
    DownloadSubtitleResponse,
    DefaultSubtitleRequest,
    DefaultSubtitleResponse,
    SetActiveSubtitle,
);
