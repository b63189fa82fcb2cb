use async_trait::async_trait;
use popcorn_core::{
    Episode, MovieDetails, ShowDetails, Subtitle, SubtitleError, SubtitleInfo, SubtitleMatcher,
    SubtitleResult, SubtitleService,
};
use tracing::warn;

use crate::channel::FxChannel;
use crate::error::IpcError;
use crate::messages::{
    DefaultSubtitleRequest, DefaultSubtitleResponse, DownloadSubtitleRequest,
    DownloadSubtitleResponse, RetrieveSubtitlesRequest, RetrieveSubtitlesResponse,
    SetActiveSubtitle, SubtitleQuery,
};

/// [`SubtitleService`] forwarding to the backend over an [`FxChannel`].
#[derive(Debug, Clone)]
pub struct ChannelSubtitleService {
    channel: FxChannel,
}

impl ChannelSubtitleService {
    /// Wrap a channel.
    #[must_use]
    pub const fn new(channel: FxChannel) -> Self {
        Self { channel }
    }

    async fn retrieve(&self, query: SubtitleQuery) -> SubtitleResult<Vec<SubtitleInfo>> {
        self.channel
            .get::<_, RetrieveSubtitlesResponse>(&RetrieveSubtitlesRequest { query })
            .await
            .map(|response| response.subtitles)
            .map_err(|err| match err {
                IpcError::Remote { reason, .. } => SubtitleError::SearchFailed { reason },
                err => SubtitleError::OperationFailed {
                    operation: "subtitle.retrieve",
                    source: Box::new(err),
                },
            })
    }
}

#[async_trait]
impl SubtitleService for ChannelSubtitleService {
    async fn retrieve_movie_subtitles(
        &self,
        movie: &MovieDetails,
    ) -> SubtitleResult<Vec<SubtitleInfo>> {
        self.retrieve(SubtitleQuery::Movie {
            movie: movie.clone(),
        })
        .await
    }

    async fn retrieve_episode_subtitles(
        &self,
        show: &ShowDetails,
        episode: &Episode,
    ) -> SubtitleResult<Vec<SubtitleInfo>> {
        self.retrieve(SubtitleQuery::Episode {
            show: show.clone(),
            episode: episode.clone(),
        })
        .await
    }

    async fn retrieve_file_subtitles(
        &self,
        filename: &str,
    ) -> SubtitleResult<Vec<SubtitleInfo>> {
        self.retrieve(SubtitleQuery::File {
            filename: filename.to_string(),
        })
        .await
    }

    async fn download_and_parse(
        &self,
        info: &SubtitleInfo,
        matcher: &SubtitleMatcher,
    ) -> SubtitleResult<Subtitle> {
        let request = DownloadSubtitleRequest {
            info: info.clone(),
            matcher: matcher.clone(),
        };
        self.channel
            .get::<_, DownloadSubtitleResponse>(&request)
            .await
            .map(|response| response.subtitle)
            .map_err(|err| match err {
                IpcError::Remote { reason, .. } => SubtitleError::DownloadFailed { reason },
                err => SubtitleError::OperationFailed {
                    operation: "subtitle.download",
                    source: Box::new(err),
                },
            })
    }

    async fn default_or_interface_language(&self, available: &[SubtitleInfo]) -> SubtitleInfo {
        let request = DefaultSubtitleRequest {
            available: available.to_vec(),
        };
        match self
            .channel
            .get::<_, DefaultSubtitleResponse>(&request)
            .await
        {
            Ok(response) => response.info,
            Err(err) => {
                warn!(error = %err, "failed to select default subtitle");
                SubtitleInfo::none()
            }
        }
    }

    async fn set_active_subtitle(&self, subtitle: Subtitle) {
        if let Err(err) = self.channel.send(&SetActiveSubtitle { subtitle }) {
            warn!(error = %err, "failed to activate subtitle");
        }
    }
}
