//! Sample media, torrents and load requests.

use popcorn_core::{
    Episode, Media, MediaTorrentInfo, MediaTorrentRequest, MovieDetails, RequestError,
    ShowDetails, TorrentFileInfo, TorrentInfo, UrlTorrentRequest,
};

/// Magnet url used by the sample requests.
pub const MAGNET_URL: &str = "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567";

/// Title of [`movie`].
pub const MOVIE_TITLE: &str = "Big Buck Bunny";

/// A sample movie.
#[must_use]
pub fn movie() -> MovieDetails {
    MovieDetails {
        imdb_id: "tt1254207".into(),
        title: MOVIE_TITLE.into(),
        year: "2008".into(),
    }
}

/// A sample show.
#[must_use]
pub fn show() -> ShowDetails {
    ShowDetails {
        imdb_id: "tt0944947".into(),
        tvdb_id: "121361".into(),
        title: "Open Movie Series".into(),
    }
}

/// An episode of [`show`].
#[must_use]
pub fn episode() -> Episode {
    Episode {
        tvdb_id: "3254641".into(),
        title: "Pilot".into(),
        season: 1,
        episode: 1,
    }
}

/// A file entry of a torrent.
#[must_use]
pub fn file(path: &str, file_size: u64, file_index: u32) -> TorrentFileInfo {
    let filename = path.rsplit('/').next().unwrap_or(path).to_string();
    TorrentFileInfo {
        filename,
        file_path: path.to_string(),
        file_size,
        file_index,
    }
}

/// Resolved torrent with a sample, the feature and a subtitle file.
#[must_use]
pub fn torrent_info(url: &str) -> TorrentInfo {
    TorrentInfo {
        uri: url.to_string(),
        name: MOVIE_TITLE.into(),
        directory_name: Some("Big.Buck.Bunny.1080p".into()),
        files: vec![
            file("Big.Buck.Bunny.1080p/sample.mkv", 4_096, 0),
            file("Big.Buck.Bunny.1080p/Big.Buck.Bunny.1080p.mkv", 1_073_741_824, 1),
            file("Big.Buck.Bunny.1080p/Big.Buck.Bunny.1080p.srt", 2_048, 2),
        ],
    }
}

/// Request to play [`movie`] in 1080p without a preselected subtitle.
///
/// # Errors
///
/// Never fails for the constant inputs; the result mirrors the constructor.
pub fn movie_request() -> Result<MediaTorrentRequest, RequestError> {
    MediaTorrentRequest::new(
        MediaTorrentInfo::new(MAGNET_URL),
        Media::Movie(movie()),
        "1080p",
    )
}

/// Request to play [`episode`] of [`show`] in 720p.
///
/// # Errors
///
/// Never fails for the constant inputs; the result mirrors the constructor.
pub fn episode_request() -> Result<MediaTorrentRequest, RequestError> {
    Ok(MediaTorrentRequest::new(
        MediaTorrentInfo::new(MAGNET_URL),
        Media::Show(show()),
        "720p",
    )?
    .with_sub_item(episode()))
}

/// Request to play a single file picked from a resolved torrent.
///
/// # Errors
///
/// Never fails for the constant inputs; the result mirrors the constructor.
pub fn url_request() -> Result<UrlTorrentRequest, RequestError> {
    UrlTorrentRequest::new(file("Big.Buck.Bunny.1080p/Big.Buck.Bunny.1080p.mkv", 1_073_741_824, 1))
}
