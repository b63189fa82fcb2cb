use serde::Serialize;

use crate::error::RequestError;
use crate::model::media::{Episode, Media, MediaTorrentInfo};
use crate::model::subtitle::SubtitleInfo;
use crate::model::torrent::TorrentFileInfo;

/// Request to load the torrent attached to a media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaTorrentRequest {
    torrent: MediaTorrentInfo,
    media: Media,
    sub_item: Option<Episode>,
    quality: String,
    subtitle: Option<SubtitleInfo>,
}

impl MediaTorrentRequest {
    /// Build a request; the torrent url and quality must not be blank.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::MissingField`] when a mandatory field is blank.
    pub fn new(
        torrent: MediaTorrentInfo,
        media: Media,
        quality: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let quality = quality.into();
        if torrent.url.trim().is_empty() {
            return Err(RequestError::MissingField { field: "torrent.url" });
        }
        if quality.trim().is_empty() {
            return Err(RequestError::MissingField { field: "quality" });
        }
        Ok(Self {
            torrent,
            media,
            sub_item: None,
            quality,
            subtitle: None,
        })
    }

    /// Attach the episode being played.
    #[must_use]
    pub fn with_sub_item(mut self, episode: Episode) -> Self {
        self.sub_item = Some(episode);
        self
    }

    /// Attach a subtitle already chosen by the user.
    #[must_use]
    pub fn with_subtitle(mut self, subtitle: SubtitleInfo) -> Self {
        self.subtitle = Some(subtitle);
        self
    }

    /// Torrent reference to load.
    #[must_use]
    pub const fn torrent(&self) -> &MediaTorrentInfo {
        &self.torrent
    }

    /// Media item being loaded.
    #[must_use]
    pub const fn media(&self) -> &Media {
        &self.media
    }

    /// Episode being played, for show requests.
    #[must_use]
    pub const fn sub_item(&self) -> Option<&Episode> {
        self.sub_item.as_ref()
    }

    /// Quality label of the torrent.
    #[must_use]
    pub fn quality(&self) -> &str {
        &self.quality
    }

    /// Subtitle chosen by the user, if any.
    #[must_use]
    pub const fn subtitle(&self) -> Option<&SubtitleInfo> {
        self.subtitle.as_ref()
    }
}

/// Request to load a single file of an already resolved torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlTorrentRequest {
    file_info: TorrentFileInfo,
    subtitle: Option<SubtitleInfo>,
}

impl UrlTorrentRequest {
    /// Build a request for the given file.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::MissingField`] when the filename is blank.
    pub fn new(file_info: TorrentFileInfo) -> Result<Self, RequestError> {
        if file_info.filename.trim().is_empty() {
            return Err(RequestError::MissingField {
                field: "file_info.filename",
            });
        }
        Ok(Self {
            file_info,
            subtitle: None,
        })
    }

    /// Attach a subtitle already chosen by the user.
    #[must_use]
    pub fn with_subtitle(mut self, subtitle: SubtitleInfo) -> Self {
        self.subtitle = Some(subtitle);
        self
    }

    /// File of the torrent to load.
    #[must_use]
    pub const fn file_info(&self) -> &TorrentFileInfo {
        &self.file_info
    }

    /// Subtitle chosen by the user, if any.
    #[must_use]
    pub const fn subtitle(&self) -> Option<&SubtitleInfo> {
        self.subtitle.as_ref()
    }
}

/// Request to resolve a magnet or torrent url and show its details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MagnetUrlRequest {
    url: String,
}

impl MagnetUrlRequest {
    /// Build a request for the given url.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::MissingField`] when the url is blank.
    pub fn new(url: impl Into<String>) -> Result<Self, RequestError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(RequestError::MissingField { field: "url" });
        }
        Ok(Self { url })
    }

    /// Url to resolve.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// A load request as stored by the loader for retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadRequest {
    /// Load the torrent of a media item.
    Media(MediaTorrentRequest),
    /// Load a file of a resolved torrent.
    Url(UrlTorrentRequest),
}

impl LoadRequest {
    /// Subtitle chosen by the user, if any.
    #[must_use]
    pub const fn subtitle(&self) -> Option<&SubtitleInfo> {
        match self {
            Self::Media(request) => request.subtitle(),
            Self::Url(request) => request.subtitle(),
        }
    }

    /// Media item of the request, url requests have none.
    #[must_use]
    pub const fn media(&self) -> Option<&Media> {
        match self {
            Self::Media(request) => Some(request.media()),
            Self::Url(_) => None,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Media(_) => "media",
            Self::Url(_) => "url",
        }
    }
}

impl From<MediaTorrentRequest> for LoadRequest {
    fn from(request: MediaTorrentRequest) -> Self {
        Self::Media(request)
    }
}

impl From<UrlTorrentRequest> for LoadRequest {
    fn from(request: UrlTorrentRequest) -> Self {
        Self::Url(request)
    }
}
