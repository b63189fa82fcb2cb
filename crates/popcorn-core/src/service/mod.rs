//! Collaborator traits implemented by backend adapters.

mod callbacks;

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

pub use callbacks::{CallbackHandle, Callbacks};

use crate::error::{StreamResult, SubtitleResult, TorrentResult};
use crate::model::{
    Episode, MovieDetails, SessionState, ShowDetails, StreamEvent, StreamHandle, Subtitle,
    SubtitleInfo, SubtitleMatcher, TorrentEvent, TorrentFileInfo, TorrentHandle, TorrentInfo,
    TorrentState,
};

/// Callback invoked for torrent push notifications.
pub type TorrentCallback = Arc<dyn Fn(TorrentEvent) + Send + Sync>;

/// Callback invoked for stream push notifications.
pub type StreamCallback = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// A torrent created in the backend session.
pub trait Torrent: Debug + Send + Sync {
    /// Backend handle of the torrent.
    fn handle(&self) -> TorrentHandle;

    /// File of the torrent being downloaded.
    fn filename(&self) -> String;

    /// Last known state.
    fn state(&self) -> TorrentState;

    /// Subscribe to push notifications of this torrent.
    ///
    /// Events pushed before the first subscriber arrived are replayed to it.
    fn subscribe(&self, callback: TorrentCallback) -> CallbackHandle;

    /// Remove a previously registered callback.
    fn unsubscribe(&self, handle: CallbackHandle);
}

/// A stream serving a torrent file over http.
pub trait TorrentStream: Debug + Send + Sync {
    /// Backend handle of the stream.
    fn handle(&self) -> StreamHandle;

    /// Torrent backing the stream.
    fn torrent(&self) -> Arc<dyn Torrent>;

    /// Url the player should open.
    fn stream_url(&self) -> String;

    /// Subscribe to push notifications of this stream.
    ///
    /// Events pushed before the first subscriber arrived, `Ready` included,
    /// are replayed to it.
    fn subscribe(&self, callback: StreamCallback) -> CallbackHandle;

    /// Remove a previously registered callback.
    fn unsubscribe(&self, handle: CallbackHandle);
}

/// Torrent session management exposed by the backend.
#[async_trait]
pub trait TorrentService: Send + Sync {
    /// Resolve the metadata of a magnet or torrent url.
    async fn get_torrent_info(&self, url: &str) -> TorrentResult<TorrentInfo>;

    /// Create a torrent for a single file, stored below `directory`.
    async fn create(
        &self,
        file_info: &TorrentFileInfo,
        directory: &Path,
        auto_start: bool,
    ) -> TorrentResult<Arc<dyn Torrent>>;

    /// Remove a torrent from the session and release its resources.
    async fn remove(&self, handle: TorrentHandle) -> TorrentResult<()>;

    /// Observe the state of the backend session.
    fn session_state(&self) -> watch::Receiver<SessionState>;
}

/// Streaming of torrent files.
#[async_trait]
pub trait TorrentStreamService: Send + Sync {
    /// Start streaming the given torrent.
    async fn start_stream(&self, torrent: Arc<dyn Torrent>) -> StreamResult<Arc<dyn TorrentStream>>;

    /// Stop a running stream.
    async fn stop_stream(&self, handle: StreamHandle) -> StreamResult<()>;
}

/// Subtitle search, download and activation.
#[async_trait]
pub trait SubtitleService: Send + Sync {
    /// Available subtitles of a movie.
    async fn retrieve_movie_subtitles(
        &self,
        movie: &MovieDetails,
    ) -> SubtitleResult<Vec<SubtitleInfo>>;

    /// Available subtitles of a show episode.
    async fn retrieve_episode_subtitles(
        &self,
        show: &ShowDetails,
        episode: &Episode,
    ) -> SubtitleResult<Vec<SubtitleInfo>>;

    /// Available subtitles matching a bare filename.
    async fn retrieve_file_subtitles(&self, filename: &str)
    -> SubtitleResult<Vec<SubtitleInfo>>;

    /// Download the best matching file of `info` and parse it.
    async fn download_and_parse(
        &self,
        info: &SubtitleInfo,
        matcher: &SubtitleMatcher,
    ) -> SubtitleResult<Subtitle>;

    /// Pick the user's default subtitle, or the interface language, from `available`.
    ///
    /// Returns [`SubtitleInfo::none`] when nothing matches.
    async fn default_or_interface_language(&self, available: &[SubtitleInfo]) -> SubtitleInfo;

    /// Activate a subtitle for playback; [`Subtitle::none`] disables subtitles.
    async fn set_active_subtitle(&self, subtitle: Subtitle);
}
