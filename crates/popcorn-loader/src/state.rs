//! Loader states and the listener registry notified on every transition.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use popcorn_core::{CallbackHandle, Callbacks, DownloadStatus, Media};

/// Progress of the current load attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// Nothing is being loaded.
    #[default]
    Idle,
    /// A load request was accepted.
    Starting,
    /// Waiting for the backend torrent session.
    Initializing,
    /// Resolving and creating the torrent.
    Connecting,
    /// Searching available subtitles.
    RetrievingSubtitles,
    /// Downloading the selected subtitle.
    DownloadingSubtitle,
    /// The torrent is downloading.
    Downloading,
    /// The stream can be played.
    Ready,
    /// The attempt failed.
    Error,
}

impl LoadState {
    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Initializing => "initializing",
            Self::Connecting => "connecting",
            Self::RetrievingSubtitles => "retrieving_subtitles",
            Self::DownloadingSubtitle => "downloading_subtitle",
            Self::Downloading => "downloading",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// `Ready` and `Error` end an attempt.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Error)
    }
}

impl Display for LoadState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification delivered to load listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadTorrentEvent {
    /// The loader moved to another state.
    StateChanged(LoadState),
    /// The media item being loaded changed; `None` for url loads.
    MediaChanged(Option<Media>),
    /// Fresh download statistics of the loading torrent.
    DownloadStatusChanged(DownloadStatus),
}

/// Identifier returned by [`ListenerRegistry::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(CallbackHandle);

/// Closures observing the loader.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    callbacks: Callbacks<LoadTorrentEvent>,
}

impl ListenerRegistry {
    /// Register a listener. It is invoked on the emitting thread and must not block.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(LoadTorrentEvent) + Send + Sync + 'static,
    {
        ListenerId(self.callbacks.add(Arc::new(listener)))
    }

    /// Remove a listener; returns `false` when it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.callbacks.remove(id.0)
    }

    pub(crate) fn emit(&self, event: &LoadTorrentEvent) {
        self.callbacks.invoke(event);
    }
}
