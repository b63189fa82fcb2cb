//! Core domain types and DTOs shared across the workspace.

mod media;
mod request;
mod subtitle;
mod torrent;

pub use media::{Episode, Media, MediaTorrentInfo, MovieDetails, ShowDetails};
pub use request::{LoadRequest, MagnetUrlRequest, MediaTorrentRequest, UrlTorrentRequest};
pub use subtitle::{Subtitle, SubtitleInfo, SubtitleLanguage, SubtitleMatcher, SubtitlePreference};
pub use torrent::{
    DownloadStatus, SessionState, StreamEvent, StreamHandle, TorrentEvent, TorrentFileInfo,
    TorrentHandle, TorrentInfo, TorrentState,
};
