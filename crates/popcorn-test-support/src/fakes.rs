//! In-memory implementations of the collaborator contracts.
//!
//! Every fake writes the calls it receives into a shared [`Journal`] so tests
//! can assert on cross-service ordering (for example unsubscribe before remove).

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use popcorn_core::{
    CallbackHandle, Callbacks, Episode, MovieDetails, SessionState, ShowDetails, StreamCallback,
    StreamError, StreamEvent, StreamHandle, StreamResult, Subtitle, SubtitleError, SubtitleInfo,
    SubtitleMatcher, SubtitleResult, SubtitleService, Torrent, TorrentCallback, TorrentError,
    TorrentEvent, TorrentFileInfo, TorrentHandle, TorrentInfo, TorrentResult, TorrentService,
    TorrentState, TorrentStream, TorrentStreamService,
};
use tokio::sync::watch;
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ordered record of the calls made against the fakes.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn record(&self, entry: impl Into<String>) {
        let entry = entry.into();
        debug!(%entry, "fake collaborator call");
        lock(&self.entries).push(entry);
    }

    /// Snapshot of every entry in call order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        lock(&self.entries).clone()
    }

    /// Index of the first entry equal to `entry`.
    #[must_use]
    pub fn position(&self, entry: &str) -> Option<usize> {
        lock(&self.entries).iter().position(|item| item == entry)
    }

    /// Number of entries starting with `prefix`.
    #[must_use]
    pub fn count(&self, prefix: &str) -> usize {
        lock(&self.entries)
            .iter()
            .filter(|item| item.starts_with(prefix))
            .count()
    }

    /// Whether an entry equal to `entry` was recorded.
    #[must_use]
    pub fn contains(&self, entry: &str) -> bool {
        self.position(entry).is_some()
    }
}

/// Torrent handed out by [`FakeTorrentService`].
#[derive(Debug)]
pub struct FakeTorrent {
    handle: TorrentHandle,
    filename: String,
    state: Mutex<TorrentState>,
    callbacks: Callbacks<TorrentEvent>,
    on_subscribe: Vec<TorrentEvent>,
    journal: Journal,
}

impl FakeTorrent {
    /// Deliver an event to every subscriber.
    pub fn emit(&self, event: TorrentEvent) {
        if let TorrentEvent::StateChanged { new, .. } = &event {
            *lock(&self.state) = *new;
        }
        self.callbacks.invoke(&event);
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.callbacks.len()
    }
}

impl Torrent for FakeTorrent {
    fn handle(&self) -> TorrentHandle {
        self.handle
    }

    fn filename(&self) -> String {
        self.filename.clone()
    }

    fn state(&self) -> TorrentState {
        *lock(&self.state)
    }

    fn subscribe(&self, callback: TorrentCallback) -> CallbackHandle {
        self.journal.record(format!("subscribe {}", self.handle));
        let handle = self.callbacks.add(Arc::clone(&callback));
        for event in &self.on_subscribe {
            callback(event.clone());
        }
        handle
    }

    fn unsubscribe(&self, handle: CallbackHandle) {
        self.journal.record(format!("unsubscribe {}", self.handle));
        self.callbacks.remove(handle);
    }
}

/// Scriptable [`TorrentService`].
#[derive(Debug)]
pub struct FakeTorrentService {
    journal: Journal,
    session: watch::Sender<SessionState>,
    info: Mutex<Option<TorrentInfo>>,
    fail_create: AtomicBool,
    create_delay: Mutex<Option<Duration>>,
    on_subscribe: Mutex<Vec<TorrentEvent>>,
    next_handle: AtomicU64,
    created: Mutex<Vec<Arc<FakeTorrent>>>,
}

impl FakeTorrentService {
    /// A service whose session is already running and which knows no torrent info.
    #[must_use]
    pub fn new(journal: Journal) -> Self {
        let (session, _) = watch::channel(SessionState::Running);
        Self {
            journal,
            session,
            info: Mutex::new(None),
            fail_create: AtomicBool::new(false),
            create_delay: Mutex::new(None),
            on_subscribe: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Info returned by `get_torrent_info`; `None` makes resolution fail.
    pub fn set_torrent_info(&self, info: Option<TorrentInfo>) {
        *lock(&self.info) = info;
    }

    /// Publish a new session state to every watcher.
    pub fn set_session_state(&self, state: SessionState) {
        self.session.send_replace(state);
    }

    /// Make `create` fail.
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Delay every `create` call.
    pub fn set_create_delay(&self, delay: Duration) {
        *lock(&self.create_delay) = Some(delay);
    }

    /// Events delivered to each callback as soon as it subscribes.
    pub fn emit_on_subscribe(&self, events: Vec<TorrentEvent>) {
        *lock(&self.on_subscribe) = events;
    }

    /// Every torrent created so far.
    #[must_use]
    pub fn torrents(&self) -> Vec<Arc<FakeTorrent>> {
        lock(&self.created).clone()
    }
}

#[async_trait]
impl TorrentService for FakeTorrentService {
    async fn get_torrent_info(&self, url: &str) -> TorrentResult<TorrentInfo> {
        self.journal.record(format!("get_torrent_info {url}"));
        lock(&self.info)
            .clone()
            .ok_or_else(|| TorrentError::InfoUnavailable {
                url: url.to_string(),
                reason: "no torrent info configured".into(),
            })
    }

    async fn create(
        &self,
        file_info: &TorrentFileInfo,
        _directory: &Path,
        _auto_start: bool,
    ) -> TorrentResult<Arc<dyn Torrent>> {
        self.journal.record(format!("create {}", file_info.filename));
        let delay = *lock(&self.create_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(TorrentError::CreateFailed {
                filename: file_info.filename.clone(),
                reason: "scripted failure".into(),
            });
        }

        let torrent = Arc::new(FakeTorrent {
            handle: TorrentHandle(self.next_handle.fetch_add(1, Ordering::SeqCst)),
            filename: file_info.filename.clone(),
            state: Mutex::new(TorrentState::Starting),
            callbacks: Callbacks::new(),
            on_subscribe: lock(&self.on_subscribe).clone(),
            journal: self.journal.clone(),
        });
        lock(&self.created).push(Arc::clone(&torrent));
        Ok(torrent)
    }

    async fn remove(&self, handle: TorrentHandle) -> TorrentResult<()> {
        self.journal.record(format!("remove {handle}"));
        Ok(())
    }

    fn session_state(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }
}

/// Stream handed out by [`FakeStreamService`].
#[derive(Debug)]
pub struct FakeStream {
    handle: StreamHandle,
    url: String,
    torrent: Arc<dyn Torrent>,
    callbacks: Callbacks<StreamEvent>,
    on_subscribe: Vec<StreamEvent>,
    journal: Journal,
}

impl FakeStream {
    /// Deliver an event to every subscriber.
    pub fn emit(&self, event: StreamEvent) {
        self.callbacks.invoke(&event);
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.callbacks.len()
    }
}

impl TorrentStream for FakeStream {
    fn handle(&self) -> StreamHandle {
        self.handle
    }

    fn torrent(&self) -> Arc<dyn Torrent> {
        Arc::clone(&self.torrent)
    }

    fn stream_url(&self) -> String {
        self.url.clone()
    }

    fn subscribe(&self, callback: StreamCallback) -> CallbackHandle {
        self.journal.record(format!("subscribe {}", self.handle));
        let handle = self.callbacks.add(Arc::clone(&callback));
        for event in &self.on_subscribe {
            callback(event.clone());
        }
        handle
    }

    fn unsubscribe(&self, handle: CallbackHandle) {
        self.journal.record(format!("unsubscribe {}", self.handle));
        self.callbacks.remove(handle);
    }
}

/// Scriptable [`TorrentStreamService`].
#[derive(Debug)]
pub struct FakeStreamService {
    journal: Journal,
    prepare_failures: AtomicU32,
    fail_start: AtomicBool,
    on_subscribe: Mutex<Vec<StreamEvent>>,
    next_handle: AtomicU64,
    started: Mutex<Vec<Arc<FakeStream>>>,
}

impl FakeStreamService {
    /// A service whose streams start successfully.
    #[must_use]
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            prepare_failures: AtomicU32::new(0),
            fail_start: AtomicBool::new(false),
            on_subscribe: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
            started: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next `times` starts with [`StreamError::PrepareFailed`].
    pub fn fail_prepare(&self, times: u32) {
        self.prepare_failures.store(times, Ordering::SeqCst);
    }

    /// Fail every start with a non-recoverable error.
    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Events delivered to each callback as soon as it subscribes.
    pub fn emit_on_subscribe(&self, events: Vec<StreamEvent>) {
        *lock(&self.on_subscribe) = events;
    }

    /// Every stream started so far.
    #[must_use]
    pub fn streams(&self) -> Vec<Arc<FakeStream>> {
        lock(&self.started).clone()
    }
}

#[async_trait]
impl TorrentStreamService for FakeStreamService {
    async fn start_stream(
        &self,
        torrent: Arc<dyn Torrent>,
    ) -> StreamResult<Arc<dyn TorrentStream>> {
        self.journal.record(format!("start_stream {}", torrent.handle()));
        let prepare_failed = self
            .prepare_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if prepare_failed {
            return Err(StreamError::PrepareFailed {
                filename: torrent.filename(),
                reason: "scripted prepare failure".into(),
            });
        }
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(StreamError::OperationFailed {
                operation: "start_stream",
                handle: None,
                source: Box::new(io::Error::other("scripted start failure")),
            });
        }

        let stream = Arc::new(FakeStream {
            handle: StreamHandle(self.next_handle.fetch_add(1, Ordering::SeqCst)),
            url: format!("http://127.0.0.1:8090/{}", torrent.filename()),
            torrent,
            callbacks: Callbacks::new(),
            on_subscribe: lock(&self.on_subscribe).clone(),
            journal: self.journal.clone(),
        });
        lock(&self.started).push(Arc::clone(&stream));
        Ok(stream)
    }

    async fn stop_stream(&self, handle: StreamHandle) -> StreamResult<()> {
        self.journal.record(format!("stop_stream {handle}"));
        Ok(())
    }
}

/// Scriptable [`SubtitleService`].
#[derive(Debug)]
pub struct FakeSubtitleService {
    journal: Journal,
    available: Mutex<Vec<SubtitleInfo>>,
    preferred: Mutex<SubtitleInfo>,
    retrieve_delay: Mutex<Option<Duration>>,
    fail_retrieve: AtomicBool,
    download_delay: Mutex<Option<Duration>>,
    fail_download: AtomicBool,
    activated: Mutex<Vec<Subtitle>>,
}

impl FakeSubtitleService {
    /// A service without subtitles whose preference resolves to none.
    #[must_use]
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            available: Mutex::new(Vec::new()),
            preferred: Mutex::new(SubtitleInfo::none()),
            retrieve_delay: Mutex::new(None),
            fail_retrieve: AtomicBool::new(false),
            download_delay: Mutex::new(None),
            fail_download: AtomicBool::new(false),
            activated: Mutex::new(Vec::new()),
        }
    }

    /// Subtitles returned by every retrieval.
    pub fn set_available(&self, available: Vec<SubtitleInfo>) {
        *lock(&self.available) = available;
    }

    /// Subtitle returned by `default_or_interface_language`.
    pub fn set_preferred(&self, preferred: SubtitleInfo) {
        *lock(&self.preferred) = preferred;
    }

    /// Delay every retrieval.
    pub fn set_retrieve_delay(&self, delay: Duration) {
        *lock(&self.retrieve_delay) = Some(delay);
    }

    /// Make every retrieval fail.
    pub fn fail_retrieve(&self, fail: bool) {
        self.fail_retrieve.store(fail, Ordering::SeqCst);
    }

    /// Delay every download.
    pub fn set_download_delay(&self, delay: Duration) {
        *lock(&self.download_delay) = Some(delay);
    }

    /// Make every download fail.
    pub fn fail_download(&self, fail: bool) {
        self.fail_download.store(fail, Ordering::SeqCst);
    }

    /// Subtitles activated so far, oldest first.
    #[must_use]
    pub fn activated(&self) -> Vec<Subtitle> {
        lock(&self.activated).clone()
    }

    async fn retrieve(&self) -> SubtitleResult<Vec<SubtitleInfo>> {
        let delay = *lock(&self.retrieve_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_retrieve.load(Ordering::SeqCst) {
            return Err(SubtitleError::SearchFailed {
                reason: "scripted search failure".into(),
            });
        }
        Ok(lock(&self.available).clone())
    }
}

#[async_trait]
impl SubtitleService for FakeSubtitleService {
    async fn retrieve_movie_subtitles(
        &self,
        movie: &MovieDetails,
    ) -> SubtitleResult<Vec<SubtitleInfo>> {
        self.journal
            .record(format!("retrieve_movie_subtitles {}", movie.imdb_id));
        self.retrieve().await
    }

    async fn retrieve_episode_subtitles(
        &self,
        show: &ShowDetails,
        episode: &Episode,
    ) -> SubtitleResult<Vec<SubtitleInfo>> {
        self.journal.record(format!(
            "retrieve_episode_subtitles {} {}",
            show.imdb_id, episode.tvdb_id
        ));
        self.retrieve().await
    }

    async fn retrieve_file_subtitles(
        &self,
        filename: &str,
    ) -> SubtitleResult<Vec<SubtitleInfo>> {
        self.journal
            .record(format!("retrieve_file_subtitles {filename}"));
        self.retrieve().await
    }

    async fn download_and_parse(
        &self,
        info: &SubtitleInfo,
        matcher: &SubtitleMatcher,
    ) -> SubtitleResult<Subtitle> {
        self.journal
            .record(format!("download_and_parse {}", info.language));
        let delay = *lock(&self.download_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_download.load(Ordering::SeqCst) {
            return Err(SubtitleError::DownloadFailed {
                reason: "scripted download failure".into(),
            });
        }
        let name = matcher.name.clone().unwrap_or_default();
        Ok(Subtitle {
            info: info.clone(),
            file: format!("{name}.{}.srt", info.language),
            cue_count: 42,
        })
    }

    async fn default_or_interface_language(&self, available: &[SubtitleInfo]) -> SubtitleInfo {
        self.journal.record(format!(
            "default_or_interface_language {}",
            available.len()
        ));
        lock(&self.preferred).clone()
    }

    async fn set_active_subtitle(&self, subtitle: Subtitle) {
        self.journal
            .record(format!("set_active_subtitle {}", subtitle.info.language));
        lock(&self.activated).push(subtitle);
    }
}
