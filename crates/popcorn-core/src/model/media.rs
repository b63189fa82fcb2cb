use serde::{Deserialize, Serialize};

/// Movie metadata needed to load and play a movie torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieDetails {
    /// IMDB identifier of the movie.
    pub imdb_id: String,
    /// Display title.
    pub title: String,
    /// Release year as shown by the provider.
    pub year: String,
}

/// Show metadata needed to load and play an episode torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowDetails {
    /// IMDB identifier of the show.
    pub imdb_id: String,
    /// TVDB identifier of the show.
    pub tvdb_id: String,
    /// Display title.
    pub title: String,
}

/// A single episode of a show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    /// TVDB identifier of the episode.
    pub tvdb_id: String,
    /// Episode title.
    pub title: String,
    /// Season number.
    pub season: u32,
    /// Episode number within the season.
    pub episode: u32,
}

/// Media item a torrent is loaded for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Media {
    /// A movie.
    Movie(MovieDetails),
    /// A show; the episode travels next to it in the request.
    Show(ShowDetails),
}

impl Media {
    /// IMDB identifier of the media item.
    #[must_use]
    pub fn imdb_id(&self) -> &str {
        match self {
            Self::Movie(movie) => &movie.imdb_id,
            Self::Show(show) => &show.imdb_id,
        }
    }

    /// Display title of the media item.
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Movie(movie) => &movie.title,
            Self::Show(show) => &show.title,
        }
    }
}

/// Torrent reference attached to a media item by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTorrentInfo {
    /// Magnet or torrent url.
    pub url: String,
    /// File within the torrent to play; the largest file is used when absent.
    pub file: Option<String>,
}

impl MediaTorrentInfo {
    /// Torrent reference without an explicit file.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file: None,
        }
    }

    /// Torrent reference targeting a single file.
    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}
