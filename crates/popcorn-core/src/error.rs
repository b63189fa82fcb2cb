//! Error types for the collaborator contracts.
//!
//! # Design
//! - One enum per collaborator so callers can classify failures without string matching.
//! - Messages stay constant; context travels in fields.

use std::error::Error;

use thiserror::Error;

use crate::model::{StreamHandle, TorrentHandle};

/// Raised when a load request is built without its mandatory fields.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// A mandatory field was empty or absent.
    #[error("load request is missing a mandatory field")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },
}

/// Primary error type for torrent operations.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// The torrent metadata could not be resolved from the given url.
    #[error("torrent info could not be resolved")]
    InfoUnavailable {
        /// Magnet or torrent url that was resolved.
        url: String,
        /// Backend supplied reason.
        reason: String,
    },
    /// The resolved torrent does not contain any file that can be played.
    #[error("torrent does not contain a playable file")]
    NoPlayableFile {
        /// Magnet or torrent url of the torrent.
        url: String,
    },
    /// The backend refused to create the torrent.
    #[error("torrent creation failed")]
    CreateFailed {
        /// File within the torrent that was requested.
        filename: String,
        /// Backend supplied reason.
        reason: String,
    },
    /// The torrent session never reached a usable state.
    #[error("torrent session is unavailable")]
    SessionUnavailable {
        /// Reason the session could not be used.
        reason: &'static str,
    },
    /// Operation failed in the backend or its transport.
    #[error("torrent operation failed")]
    OperationFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Torrent handle when available.
        handle: Option<TorrentHandle>,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

/// Convenience alias for torrent operation results.
pub type TorrentResult<T> = Result<T, TorrentError>;

/// Errors raised while starting or stopping a torrent stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The backend could not prepare the stream for the torrent.
    ///
    /// This condition is transient: the loader restarts the whole load when it sees it.
    #[error("failed to prepare torrent stream")]
    PrepareFailed {
        /// Torrent file the stream was prepared for.
        filename: String,
        /// Backend supplied reason.
        reason: String,
    },
    /// Operation failed in the backend or its transport.
    #[error("torrent stream operation failed")]
    OperationFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Stream handle when available.
        handle: Option<StreamHandle>,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

/// Convenience alias for stream operation results.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors raised by the subtitle collaborator.
#[derive(Debug, Error)]
pub enum SubtitleError {
    /// Searching the available subtitles failed.
    #[error("subtitle search failed")]
    SearchFailed {
        /// Backend supplied reason.
        reason: String,
    },
    /// Downloading or parsing the selected subtitle failed.
    #[error("subtitle download failed")]
    DownloadFailed {
        /// Backend supplied reason.
        reason: String,
    },
    /// Operation failed in the transport.
    #[error("subtitle operation failed")]
    OperationFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

/// Convenience alias for subtitle operation results.
pub type SubtitleResult<T> = Result<T, SubtitleError>;
