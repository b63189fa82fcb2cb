//! Load-torrent orchestration.
//!
//! # Design
//! - A single `Session` sits behind an async mutex. Every entry point takes it
//!   before touching the attempt and keeps it across teardown.
//! - Each attempt runs in its own task with a cancellation token and a
//!   generation id. Listener notifications are emitted under the lock after
//!   checking both, so a superseded attempt stays silent.
//! - Backend calls allocating a torrent or stream always run to completion.
//!   What a superseded attempt allocated is released right away.
//! - Backend callbacks only forward into the attempt's channel; the attempt
//!   task reacts to them in arrival order.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use popcorn_config::SettingsHandle;
use popcorn_core::{
    CallbackHandle, DownloadStatus, LoadRequest, MagnetUrlRequest, Media, MediaTorrentRequest,
    SessionState, StreamError, StreamEvent, Subtitle, SubtitleInfo, SubtitleMatcher,
    SubtitleService, Torrent, TorrentError, TorrentEvent, TorrentFileInfo, TorrentService,
    TorrentStream, TorrentStreamService, UrlTorrentRequest,
};
use popcorn_events::{Event, EventBus, MediaPlayback, PlayRequest};
use popcorn_telemetry::{AttemptContext, with_attempt_context};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{LoadError, LoadResult};
use crate::state::{ListenerId, ListenerRegistry, LoadState, LoadTorrentEvent};

struct TorrentSlot {
    torrent: Arc<dyn Torrent>,
    callback: CallbackHandle,
}

struct StreamSlot {
    stream: Arc<dyn TorrentStream>,
    callback: CallbackHandle,
}

/// Everything owned by the current load attempt.
#[derive(Default)]
struct Session {
    request: Option<LoadRequest>,
    attempt: u64,
    state: LoadState,
    /// `Ready` or `Error` once the attempt reached one of them.
    outcome: Option<LoadState>,
    task: Option<CancellationToken>,
    torrent: Option<TorrentSlot>,
    stream: Option<StreamSlot>,
    prepare_retries: u32,
}

impl Session {
    fn is_current(&self, attempt: &Attempt) -> bool {
        self.attempt == attempt.id && !attempt.token.is_cancelled()
    }

    fn next_attempt(&mut self) -> Attempt {
        self.attempt += 1;
        self.outcome = None;
        let token = CancellationToken::new();
        self.task = Some(token.clone());
        Attempt {
            id: self.attempt,
            token,
        }
    }

    fn reset_to_idle(&mut self) {
        self.request = None;
        self.state = LoadState::Idle;
        self.outcome = None;
        self.task = None;
        self.prepare_retries = 0;
    }
}

#[derive(Clone)]
struct Attempt {
    id: u64,
    token: CancellationToken,
}

enum Signal {
    Torrent(TorrentEvent),
    Stream(StreamEvent),
}

/// Loads torrents for playback and reports progress to registered listeners.
pub struct LoadTorrentService {
    torrents: Arc<dyn TorrentService>,
    streams: Arc<dyn TorrentStreamService>,
    subtitles: Arc<dyn SubtitleService>,
    events: EventBus,
    settings: SettingsHandle,
    listeners: ListenerRegistry,
    session: Mutex<Session>,
}

impl LoadTorrentService {
    /// Construct an idle loader over the given collaborators.
    #[must_use]
    pub fn new(
        torrents: Arc<dyn TorrentService>,
        streams: Arc<dyn TorrentStreamService>,
        subtitles: Arc<dyn SubtitleService>,
        events: EventBus,
        settings: SettingsHandle,
    ) -> Self {
        Self {
            torrents,
            streams,
            subtitles,
            events,
            settings,
            listeners: ListenerRegistry::default(),
            session: Mutex::new(Session::default()),
        }
    }

    /// Register a listener for state, media and download status changes.
    ///
    /// Listeners run synchronously while the loader holds its session lock.
    /// They must return quickly, must not block and must not call back into
    /// the loader; forward the event to a channel for anything heavier.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(LoadTorrentEvent) + Send + Sync + 'static,
    {
        self.listeners.add_listener(listener)
    }

    /// Remove a listener; returns `false` when it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove_listener(id)
    }

    /// Load the torrent of a media item.
    pub async fn load_media_torrent(self: &Arc<Self>, request: MediaTorrentRequest) {
        debug!(
            imdb_id = request.media().imdb_id(),
            title = request.media().title(),
            quality = request.quality(),
            "loading media torrent stream"
        );
        self.load(LoadRequest::Media(request)).await;
    }

    /// Load a single file of an already resolved torrent.
    pub async fn load_url_torrent(self: &Arc<Self>, request: UrlTorrentRequest) {
        debug!(
            filename = %request.file_info().filename,
            "loading url torrent stream"
        );
        self.load(LoadRequest::Url(request)).await;
    }

    /// Tear down the running attempt and start loading `request`.
    ///
    /// Returns once the new attempt has been started; progress is reported to
    /// the listeners.
    pub async fn load(self: &Arc<Self>, request: LoadRequest) {
        let mut session = self.session.lock().await;
        self.teardown(&mut session).await;
        session.prepare_retries = 0;
        self.start_attempt(&mut session, request);
    }

    /// Cancel the running attempt, release its resources and close the loader.
    pub async fn cancel(&self) {
        {
            let mut session = self.session.lock().await;
            self.teardown(&mut session).await;
            session.reset_to_idle();
        }
        info!("torrent loading cancelled");
        self.subtitles.set_active_subtitle(Subtitle::none()).await;
        self.events.publish(Event::LoadClosed);
    }

    /// Replay the last load request; returns `false` when nothing is stored.
    pub async fn retry_loading_torrent(self: &Arc<Self>) -> bool {
        let request = self.session.lock().await.request.clone();
        let Some(request) = request else {
            debug!("no load request stored, ignoring retry");
            return false;
        };
        info!(kind = request.kind(), "retrying torrent load");
        self.load(request).await;
        true
    }

    /// Resolve a magnet or torrent url and publish its details.
    pub async fn load_url(self: &Arc<Self>, request: MagnetUrlRequest) {
        debug!(url = request.url(), "loading magnet url");
        let attempt = {
            let mut session = self.session.lock().await;
            self.teardown(&mut session).await;
            session.reset_to_idle();
            let attempt = session.next_attempt();
            self.notify(&mut session, LoadTorrentEvent::MediaChanged(None));
            self.notify(
                &mut session,
                LoadTorrentEvent::StateChanged(LoadState::Connecting),
            );
            attempt
        };

        let context = AttemptContext {
            attempt: attempt.id,
            kind: "magnet",
        };
        let service = Arc::clone(self);
        tokio::spawn(with_attempt_context(context, async move {
            service.resolve_url(attempt, request).await;
        }));
    }

    /// The request of the running attempt, if any.
    pub async fn current_request(&self) -> Option<LoadRequest> {
        self.session.lock().await.request.clone()
    }

    /// Last state reported to the listeners.
    pub async fn state(&self) -> LoadState {
        self.session.lock().await.state
    }

    fn start_attempt(self: &Arc<Self>, session: &mut Session, request: LoadRequest) {
        let attempt = session.next_attempt();
        session.request = Some(request.clone());
        self.notify(
            session,
            LoadTorrentEvent::MediaChanged(request.media().cloned()),
        );
        self.notify(session, LoadTorrentEvent::StateChanged(LoadState::Starting));

        let context = AttemptContext {
            attempt: attempt.id,
            kind: request.kind(),
        };
        let service = Arc::clone(self);
        tokio::spawn(with_attempt_context(context, async move {
            service.run_attempt(attempt, request).await;
        }));
    }

    async fn run_attempt(self: Arc<Self>, attempt: Attempt, request: LoadRequest) {
        match self.drive(&attempt, &request).await {
            Ok(()) => debug!(attempt = attempt.id, "load attempt finished"),
            Err(LoadError::Cancelled) => debug!(attempt = attempt.id, "load attempt cancelled"),
            Err(LoadError::Restart { source }) => self.restart(&attempt, request, &source).await,
            Err(LoadError::Fatal { stage, source }) if attempt.token.is_cancelled() => {
                debug!(attempt = attempt.id, stage, error = %source, "superseded load attempt failed");
            }
            Err(LoadError::Fatal { stage, source }) => {
                error!(
                    attempt = attempt.id,
                    stage,
                    error = %source,
                    "failed to load torrent"
                );
                self.enter_error(&attempt).await;
            }
        }
    }

    async fn drive(&self, attempt: &Attempt, request: &LoadRequest) -> LoadResult<()> {
        let settings = self.settings.current();
        let loader = settings.loader;

        self.await_session(attempt, loader.session_init_timeout())
            .await?;
        let file_info = self.resolve_file(attempt, request).await?;

        self.transition(attempt, LoadState::Connecting).await?;
        self.transition(attempt, LoadState::RetrievingSubtitles)
            .await?;
        let directory = settings.torrent.directory;
        let (created, available) = tokio::join!(
            self.torrents.create(&file_info, &directory, true),
            cancellable(
                &attempt.token,
                self.retrieve_subtitles(
                    request,
                    &file_info.filename,
                    loader.retrieve_subtitles_timeout()
                ),
            ),
        );
        let torrent = created.map_err(|err| LoadError::fatal("create_torrent", err))?;
        info!(
            handle = %torrent.handle(),
            filename = %file_info.filename,
            "torrent created"
        );

        let (signals, mut receiver) = mpsc::unbounded_channel();
        self.attach_torrent(attempt, &torrent, signals.clone())
            .await?;
        let available = available?;

        self.activate_subtitle(
            attempt,
            request,
            &file_info.filename,
            &available,
            loader.download_subtitle_timeout(),
        )
        .await?;

        let stream = self
            .streams
            .start_stream(Arc::clone(&torrent))
            .await
            .map_err(LoadError::from_stream)?;
        info!(
            handle = %stream.handle(),
            url = %stream.stream_url(),
            "torrent stream started"
        );
        self.attach_stream(attempt, &stream, signals).await?;

        self.monitor(attempt, request, &stream, &mut receiver).await
    }

    async fn await_session(&self, attempt: &Attempt, timeout: Duration) -> LoadResult<()> {
        let mut session_state = self.torrents.session_state();
        if *session_state.borrow_and_update() == SessionState::Running {
            return Ok(());
        }

        self.transition(attempt, LoadState::Initializing).await?;
        debug!(
            timeout_secs = timeout.as_secs(),
            "waiting for the torrent session to be running"
        );
        let outcome = cancellable(
            &attempt.token,
            time::timeout(timeout, wait_until_running(&mut session_state)),
        )
        .await?;
        match outcome {
            Ok(Ok(())) => {
                debug!("torrent session is running");
                Ok(())
            }
            Ok(Err(_)) => Err(LoadError::fatal(
                "session_wait",
                TorrentError::SessionUnavailable {
                    reason: "session state channel closed",
                },
            )),
            Err(_) => Err(LoadError::fatal(
                "session_wait",
                TorrentError::SessionUnavailable {
                    reason: "session did not start in time",
                },
            )),
        }
    }

    async fn resolve_file(
        &self,
        attempt: &Attempt,
        request: &LoadRequest,
    ) -> LoadResult<TorrentFileInfo> {
        let request = match request {
            LoadRequest::Url(request) => return Ok(request.file_info().clone()),
            LoadRequest::Media(request) => request,
        };

        let url = &request.torrent().url;
        let info = cancellable(&attempt.token, self.torrents.get_torrent_info(url))
            .await?
            .map_err(|err| LoadError::fatal("torrent_info", err))?;
        // a file named by the media provider wins over the largest file
        let file = request
            .torrent()
            .file
            .as_deref()
            .and_then(|filename| info.by_filename(filename))
            .or_else(|| info.largest_file());
        let file = file.ok_or_else(|| {
            LoadError::fatal(
                "torrent_info",
                TorrentError::NoPlayableFile { url: url.clone() },
            )
        })?;
        debug!(
            filename = %file.filename,
            file_size = file.file_size,
            "torrent file selected"
        );
        Ok(file)
    }

    async fn retrieve_subtitles(
        &self,
        request: &LoadRequest,
        filename: &str,
        timeout: Duration,
    ) -> Vec<SubtitleInfo> {
        let lookup = async {
            match request {
                LoadRequest::Media(request) => match (request.media(), request.sub_item()) {
                    (Media::Movie(movie), _) => {
                        self.subtitles.retrieve_movie_subtitles(movie).await
                    }
                    (Media::Show(show), Some(episode)) => {
                        self.subtitles
                            .retrieve_episode_subtitles(show, episode)
                            .await
                    }
                    (Media::Show(_), None) => Ok(Vec::new()),
                },
                LoadRequest::Url(_) => self.subtitles.retrieve_file_subtitles(filename).await,
            }
        };

        match time::timeout(timeout, lookup).await {
            Ok(Ok(available)) => {
                debug!(count = available.len(), "available subtitles retrieved");
                available
            }
            Ok(Err(err)) => {
                warn!(error = %err, "failed to retrieve subtitles");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "retrieving subtitles timed out"
                );
                Vec::new()
            }
        }
    }

    async fn activate_subtitle(
        &self,
        attempt: &Attempt,
        request: &LoadRequest,
        filename: &str,
        available: &[SubtitleInfo],
        timeout: Duration,
    ) -> LoadResult<()> {
        let selected = match request.subtitle() {
            Some(subtitle) => subtitle.clone(),
            None => {
                cancellable(
                    &attempt.token,
                    self.subtitles.default_or_interface_language(available),
                )
                .await?
            }
        };
        if selected.is_none() {
            debug!("no subtitle selected for playback");
            return Ok(());
        }

        self.transition(attempt, LoadState::DownloadingSubtitle)
            .await?;
        let quality = match request {
            LoadRequest::Media(request) => Some(request.quality()),
            LoadRequest::Url(_) => None,
        };
        let matcher = SubtitleMatcher::from_filename(filename, quality);
        let download = time::timeout(
            timeout,
            self.subtitles.download_and_parse(&selected, &matcher),
        );
        let subtitle = match cancellable(&attempt.token, download).await? {
            Ok(Ok(subtitle)) => {
                info!(
                    language = %subtitle.info.language,
                    file = %subtitle.file,
                    "subtitle activated for playback"
                );
                subtitle
            }
            Ok(Err(err)) => {
                warn!(
                    language = %selected.language,
                    error = %err,
                    "failed to download subtitle"
                );
                Subtitle::none()
            }
            Err(_) => {
                warn!(
                    language = %selected.language,
                    timeout_secs = timeout.as_secs(),
                    "downloading subtitle timed out"
                );
                Subtitle::none()
            }
        };
        self.subtitles.set_active_subtitle(subtitle).await;
        Ok(())
    }

    async fn attach_torrent(
        &self,
        attempt: &Attempt,
        torrent: &Arc<dyn Torrent>,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> LoadResult<()> {
        let mut session = self.session.lock().await;
        if !session.is_current(attempt) {
            drop(session);
            debug!(handle = %torrent.handle(), "releasing torrent of a superseded attempt");
            self.remove_torrent(torrent.as_ref()).await;
            return Err(LoadError::Cancelled);
        }

        let callback = torrent.subscribe(Arc::new(move |event: TorrentEvent| {
            let _ = signals.send(Signal::Torrent(event));
        }));
        session.torrent = Some(TorrentSlot {
            torrent: Arc::clone(torrent),
            callback,
        });
        Ok(())
    }

    async fn attach_stream(
        &self,
        attempt: &Attempt,
        stream: &Arc<dyn TorrentStream>,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> LoadResult<()> {
        let mut session = self.session.lock().await;
        if !session.is_current(attempt) {
            drop(session);
            debug!(handle = %stream.handle(), "stopping stream of a superseded attempt");
            self.stop_stream(stream.as_ref()).await;
            return Err(LoadError::Cancelled);
        }

        let callback = stream.subscribe(Arc::new(move |event: StreamEvent| {
            let _ = signals.send(Signal::Stream(event));
        }));
        session.stream = Some(StreamSlot {
            stream: Arc::clone(stream),
            callback,
        });
        Ok(())
    }

    async fn monitor(
        &self,
        attempt: &Attempt,
        request: &LoadRequest,
        stream: &Arc<dyn TorrentStream>,
        receiver: &mut mpsc::UnboundedReceiver<Signal>,
    ) -> LoadResult<()> {
        loop {
            let Some(signal) = cancellable(&attempt.token, receiver.recv()).await? else {
                return Ok(());
            };
            match signal {
                Signal::Torrent(TorrentEvent::DownloadStatus(status)) => {
                    self.download_status(attempt, status).await?;
                }
                Signal::Torrent(TorrentEvent::StateChanged { old, new }) => {
                    debug!(old = old.as_str(), new = new.as_str(), "torrent state changed");
                }
                Signal::Torrent(TorrentEvent::Error { message }) => {
                    error!(attempt = attempt.id, %message, "torrent failed");
                    self.enter_error(attempt).await;
                }
                Signal::Stream(StreamEvent::Ready) => {
                    self.stream_ready(attempt, request, stream).await?;
                }
                Signal::Stream(StreamEvent::Error { message }) => {
                    error!(attempt = attempt.id, %message, "failed to stream torrent");
                    self.enter_error(attempt).await;
                }
                Signal::Stream(StreamEvent::Stopped) => {
                    self.stream_stopped(attempt).await;
                    return Ok(());
                }
            }
        }
    }

    async fn download_status(&self, attempt: &Attempt, status: DownloadStatus) -> LoadResult<()> {
        let mut session = self.session.lock().await;
        if !session.is_current(attempt) {
            return Err(LoadError::Cancelled);
        }
        self.notify(
            &mut session,
            LoadTorrentEvent::StateChanged(LoadState::Downloading),
        );
        self.notify(&mut session, LoadTorrentEvent::DownloadStatusChanged(status));
        Ok(())
    }

    async fn stream_ready(
        &self,
        attempt: &Attempt,
        request: &LoadRequest,
        stream: &Arc<dyn TorrentStream>,
    ) -> LoadResult<()> {
        let mut session = self.session.lock().await;
        if !session.is_current(attempt) {
            return Err(LoadError::Cancelled);
        }
        if let Some(outcome) = session.outcome {
            debug!(%outcome, "ignoring stream ready after the attempt finished");
            return Ok(());
        }

        self.notify(&mut session, LoadTorrentEvent::StateChanged(LoadState::Ready));
        let play = play_request(request, stream.as_ref());
        info!(url = %play.url, title = %play.title, "torrent stream ready for playback");
        self.events.publish(Event::PlayStarted(play));
        Ok(())
    }

    async fn stream_stopped(&self, attempt: &Attempt) {
        let mut session = self.session.lock().await;
        if !session.is_current(attempt) {
            return;
        }
        debug!(attempt = attempt.id, "torrent stream has been stopped");
        // the backend already released the stream, only our references go
        detach(&mut session);
        session.reset_to_idle();
    }

    async fn restart(
        self: &Arc<Self>,
        attempt: &Attempt,
        request: LoadRequest,
        source: &StreamError,
    ) {
        let mut session = self.session.lock().await;
        if !session.is_current(attempt) {
            return;
        }

        let max_retries = self.settings.current().loader.max_prepare_retries;
        if session.prepare_retries >= max_retries {
            error!(
                attempt = attempt.id,
                retries = session.prepare_retries,
                error = %source,
                "failed to prepare torrent stream, giving up"
            );
            self.notify(&mut session, LoadTorrentEvent::StateChanged(LoadState::Error));
            return;
        }

        warn!(
            attempt = attempt.id,
            retry = session.prepare_retries + 1,
            max_retries,
            error = %source,
            "failed to prepare torrent stream, restarting load torrent process"
        );
        self.teardown(&mut session).await;
        session.prepare_retries += 1;
        self.start_attempt(&mut session, request);
    }

    async fn resolve_url(&self, attempt: Attempt, request: MagnetUrlRequest) {
        let url = request.url();
        let Ok(resolved) =
            cancellable(&attempt.token, self.torrents.get_torrent_info(url)).await
        else {
            debug!(url, "magnet url resolution cancelled");
            return;
        };

        match resolved {
            Ok(info) => {
                let session = self.session.lock().await;
                if !session.is_current(&attempt) {
                    return;
                }
                info!(url, files = info.files.len(), "torrent details resolved");
                self.events.publish(Event::ShowTorrentDetails {
                    url: url.to_string(),
                    info,
                });
            }
            Err(err) => {
                error!(url, error = %err, "failed to retrieve torrent details");
                self.enter_error(&attempt).await;
            }
        }
    }

    /// Emit a state change for a still current attempt.
    async fn transition(&self, attempt: &Attempt, state: LoadState) -> LoadResult<()> {
        let mut session = self.session.lock().await;
        if !session.is_current(attempt) {
            return Err(LoadError::Cancelled);
        }
        self.notify(&mut session, LoadTorrentEvent::StateChanged(state));
        Ok(())
    }

    async fn enter_error(&self, attempt: &Attempt) {
        let mut session = self.session.lock().await;
        if session.is_current(attempt) && session.outcome.is_none() {
            self.notify(&mut session, LoadTorrentEvent::StateChanged(LoadState::Error));
        }
    }

    fn notify(&self, session: &mut Session, event: LoadTorrentEvent) {
        if let LoadTorrentEvent::StateChanged(state) = &event {
            debug!(from = %session.state, to = %state, "load state changed");
            session.state = *state;
            if state.is_terminal() {
                session.outcome = Some(*state);
            }
        }
        self.listeners.emit(&event);
    }

    /// Cancel the attempt task, unsubscribe, then release the stream and torrent.
    async fn teardown(&self, session: &mut Session) {
        let (stream, torrent) = detach(session);
        if let Some(slot) = stream {
            self.stop_stream(slot.stream.as_ref()).await;
        }
        if let Some(slot) = torrent {
            self.remove_torrent(slot.torrent.as_ref()).await;
        }
    }

    async fn stop_stream(&self, stream: &dyn TorrentStream) {
        let handle = stream.handle();
        match self.streams.stop_stream(handle).await {
            Ok(()) => debug!(%handle, "torrent stream stopped"),
            Err(err) => warn!(%handle, error = %err, "failed to stop torrent stream"),
        }
    }

    async fn remove_torrent(&self, torrent: &dyn Torrent) {
        let handle = torrent.handle();
        match self.torrents.remove(handle).await {
            Ok(()) => debug!(%handle, "torrent removed"),
            Err(err) => warn!(%handle, error = %err, "failed to remove torrent"),
        }
    }
}

/// Cancel the attempt task and unsubscribe from the resources it owns.
fn detach(session: &mut Session) -> (Option<StreamSlot>, Option<TorrentSlot>) {
    if let Some(token) = session.task.take() {
        token.cancel();
    }
    let stream = session.stream.take();
    let torrent = session.torrent.take();
    if let Some(slot) = &stream {
        slot.stream.unsubscribe(slot.callback);
    }
    if let Some(slot) = &torrent {
        slot.torrent.unsubscribe(slot.callback);
    }
    (stream, torrent)
}

async fn cancellable<F: Future>(token: &CancellationToken, future: F) -> LoadResult<F::Output> {
    tokio::select! {
        biased;
        () = token.cancelled() => Err(LoadError::Cancelled),
        output = future => Ok(output),
    }
}

async fn wait_until_running(
    receiver: &mut watch::Receiver<SessionState>,
) -> Result<(), watch::error::RecvError> {
    loop {
        let state = *receiver.borrow_and_update();
        if state == SessionState::Running {
            return Ok(());
        }
        debug!(%state, "torrent session is not running yet");
        receiver.changed().await?;
    }
}

fn play_request(request: &LoadRequest, stream: &dyn TorrentStream) -> PlayRequest {
    let (title, media) = match request {
        LoadRequest::Media(request) => (
            request.media().title().to_string(),
            Some(MediaPlayback {
                media: request.media().clone(),
                sub_item: request.sub_item().cloned(),
                quality: request.quality().to_string(),
            }),
        ),
        LoadRequest::Url(request) => (request.file_info().filename.clone(), None),
    };

    PlayRequest {
        url: stream.stream_url(),
        title,
        subtitles_enabled: true,
        torrent: stream.torrent().handle(),
        stream: stream.handle(),
        media,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use popcorn_core::{SubtitleLanguage, TorrentState};
    use popcorn_test_support::{
        FakeStreamService, FakeSubtitleService, FakeTorrentService, Journal, fixtures,
    };
    use std::sync::Mutex as StdMutex;

    const WAIT: Duration = Duration::from_secs(2);

    struct Harness {
        service: Arc<LoadTorrentService>,
        torrents: Arc<FakeTorrentService>,
        streams: Arc<FakeStreamService>,
        subtitles: Arc<FakeSubtitleService>,
        states: Arc<StdMutex<Vec<LoadState>>>,
    }

    fn harness() -> Harness {
        let journal = Journal::new();
        let torrents = Arc::new(FakeTorrentService::new(journal.clone()));
        let streams = Arc::new(FakeStreamService::new(journal.clone()));
        let subtitles = Arc::new(FakeSubtitleService::new(journal));
        let service = Arc::new(LoadTorrentService::new(
            Arc::clone(&torrents) as Arc<dyn TorrentService>,
            Arc::clone(&streams) as Arc<dyn TorrentStreamService>,
            Arc::clone(&subtitles) as Arc<dyn SubtitleService>,
            EventBus::new(),
            SettingsHandle::default(),
        ));
        let states = Arc::new(StdMutex::new(Vec::new()));
        service.add_listener({
            let states = Arc::clone(&states);
            move |event: LoadTorrentEvent| {
                if let LoadTorrentEvent::StateChanged(state) = event {
                    states.lock().expect("states lock").push(state);
                }
            }
        });
        Harness {
            service,
            torrents,
            streams,
            subtitles,
            states,
        }
    }

    async fn wait_for_state(
        service: &LoadTorrentService,
        expected: LoadState,
    ) -> anyhow::Result<()> {
        time::timeout(WAIT, async {
            while service.state().await != expected {
                time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn url_request_skips_torrent_resolution() -> anyhow::Result<()> {
        let harness = harness();
        harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);

        harness
            .service
            .load_url_torrent(fixtures::url_request()?)
            .await;
        wait_for_state(&harness.service, LoadState::Ready).await?;

        let states = harness.states.lock().expect("states lock").clone();
        assert_eq!(
            states,
            vec![
                LoadState::Starting,
                LoadState::Connecting,
                LoadState::RetrievingSubtitles,
                LoadState::Ready,
            ]
        );
        assert_eq!(harness.torrents.torrents().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn preselected_subtitle_is_downloaded_with_the_request_quality() -> anyhow::Result<()> {
        let harness = harness();
        harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);
        let request = fixtures::movie_request()?
            .with_subtitle(SubtitleInfo::new("tt1254207", SubtitleLanguage::French));

        harness
            .torrents
            .set_torrent_info(Some(fixtures::torrent_info(fixtures::MAGNET_URL)));
        harness.service.load_media_torrent(request).await;
        wait_for_state(&harness.service, LoadState::Ready).await?;

        let activated = harness.subtitles.activated();
        assert_eq!(activated.len(), 1);
        assert_eq!(activated[0].info.language, SubtitleLanguage::French);
        assert_eq!(activated[0].file, "Big.Buck.Bunny.1080p.mkv.fr.srt");
        Ok(())
    }

    #[tokio::test]
    async fn download_progress_after_ready_is_still_reported() -> anyhow::Result<()> {
        let harness = harness();
        harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);

        harness
            .service
            .load_url_torrent(fixtures::url_request()?)
            .await;
        wait_for_state(&harness.service, LoadState::Ready).await?;

        let torrent = harness.torrents.torrents().remove(0);
        torrent.emit(TorrentEvent::DownloadStatus(DownloadStatus {
            progress: 0.5,
            ..DownloadStatus::default()
        }));
        wait_for_state(&harness.service, LoadState::Downloading).await?;

        // the attempt already finished with Ready, a late failure is not a second outcome
        harness.streams.streams()[0].emit(StreamEvent::Error {
            message: "connection reset".into(),
        });
        time::sleep(Duration::from_millis(50)).await;

        let states = harness.states.lock().expect("states lock").clone();
        assert_eq!(
            states[3..],
            [LoadState::Ready, LoadState::Downloading]
        );
        Ok(())
    }

    #[tokio::test]
    async fn torrent_errors_end_the_attempt_in_error() -> anyhow::Result<()> {
        let harness = harness();
        harness
            .torrents
            .set_torrent_info(Some(fixtures::torrent_info(fixtures::MAGNET_URL)));
        harness.torrents.emit_on_subscribe(vec![
            TorrentEvent::StateChanged {
                old: TorrentState::Starting,
                new: TorrentState::Downloading,
            },
            TorrentEvent::Error {
                message: "tracker unreachable".into(),
            },
        ]);

        harness
            .service
            .load_media_torrent(fixtures::movie_request()?)
            .await;
        wait_for_state(&harness.service, LoadState::Error).await?;

        let states = harness.states.lock().expect("states lock").clone();
        assert_eq!(states.last(), Some(&LoadState::Error));
        assert!(!states.contains(&LoadState::Ready));
        Ok(())
    }
}
