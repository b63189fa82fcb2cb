//! Event payload types carried across the application.

use chrono::{DateTime, Utc};
use popcorn_core::{
    Episode, MagnetUrlRequest, Media, MediaTorrentRequest, StreamHandle, TorrentHandle,
    TorrentInfo, UrlTorrentRequest,
};
use serde::Serialize;

/// Identifier assigned to each event emitted by the application.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 256;

/// Media context of a playback started from a media torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaPlayback {
    /// Media item being played.
    pub media: Media,
    /// Episode being played, for shows.
    pub sub_item: Option<Episode>,
    /// Quality label of the torrent.
    pub quality: String,
}

/// Everything the player needs to start playing a loaded torrent stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayRequest {
    /// Url served by the torrent stream.
    pub url: String,
    /// Title shown by the player.
    pub title: String,
    /// Whether subtitles may be shown during playback.
    pub subtitles_enabled: bool,
    /// Torrent backing the stream.
    pub torrent: TorrentHandle,
    /// Stream serving the file.
    pub stream: StreamHandle,
    /// Media context, absent for plain url loads.
    pub media: Option<MediaPlayback>,
}

/// Typed application events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The user asked to play the torrent of a media item.
    LoadMediaTorrent(MediaTorrentRequest),
    /// The user picked a file of a resolved torrent.
    LoadUrlTorrent(UrlTorrentRequest),
    /// The user opened a magnet or torrent url.
    LoadUrl(MagnetUrlRequest),
    /// The loader was closed and released its resources.
    LoadClosed,
    /// A torrent stream is ready to be played.
    PlayStarted(PlayRequest),
    /// A url was resolved and its files can be shown to the user.
    ShowTorrentDetails {
        /// Url that was resolved.
        url: String,
        /// Resolved torrent metadata.
        info: TorrentInfo,
    },
}

impl Event {
    /// Machine-friendly discriminator used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::LoadMediaTorrent(_) => "load_media_torrent",
            Self::LoadUrlTorrent(_) => "load_url_torrent",
            Self::LoadUrl(_) => "load_url",
            Self::LoadClosed => "load_closed",
            Self::PlayStarted(_) => "play_started",
            Self::ShowTorrentDetails { .. } => "show_torrent_details",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// Payload.
    pub event: Event,
}
