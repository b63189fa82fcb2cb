#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Backend-agnostic torrent, stream and subtitle contracts plus the DTOs the
//! loader exchanges with the external backend process.
//!
//! Layout: `model/` (torrent, media, subtitle and load request types),
//! `service/` (collaborator traits and callback registries), `error.rs`.

pub mod error;
pub mod model;
pub mod service;

pub use error::{
    RequestError, StreamError, StreamResult, SubtitleError, SubtitleResult, TorrentError,
    TorrentResult,
};
pub use model::{
    DownloadStatus, Episode, LoadRequest, MagnetUrlRequest, Media, MediaTorrentInfo,
    MediaTorrentRequest, MovieDetails, SessionState, ShowDetails, StreamEvent, StreamHandle,
    Subtitle, SubtitleInfo, SubtitleLanguage, SubtitleMatcher, SubtitlePreference,
    TorrentEvent, TorrentFileInfo, TorrentHandle, TorrentInfo, TorrentState, UrlTorrentRequest,
};
pub use service::{
    CallbackHandle, Callbacks, StreamCallback, SubtitleService, Torrent, TorrentCallback,
    TorrentService, TorrentStream, TorrentStreamService,
};
