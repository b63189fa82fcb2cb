use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, bail};
use popcorn_config::{Settings, SettingsHandle};
use popcorn_core::{
    DownloadStatus, LoadRequest, MagnetUrlRequest, Media, MediaTorrentInfo, MediaTorrentRequest,
    SessionState, StreamEvent,
    SubtitleInfo, SubtitleLanguage, SubtitleService, TorrentEvent, TorrentService,
    TorrentStreamService,
};
use popcorn_events::{Event, EventBus, EventStream};
use popcorn_loader::{LoadState, LoadTorrentEvent, LoadTorrentService, spawn_request_listener};
use popcorn_test_support::fixtures::{self, MAGNET_URL, MOVIE_TITLE};
use popcorn_test_support::{FakeStreamService, FakeSubtitleService, FakeTorrentService, Journal};
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    journal: Journal,
    torrents: Arc<FakeTorrentService>,
    streams: Arc<FakeStreamService>,
    subtitles: Arc<FakeSubtitleService>,
    events: EventBus,
    service: Arc<LoadTorrentService>,
    recorded: Arc<Mutex<Vec<LoadTorrentEvent>>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_settings(|_| {})
    }

    fn with_settings(configure: impl FnOnce(&mut Settings)) -> Self {
        let mut settings = Settings::default();
        configure(&mut settings);

        let journal = Journal::new();
        let torrents = Arc::new(FakeTorrentService::new(journal.clone()));
        let streams = Arc::new(FakeStreamService::new(journal.clone()));
        let subtitles = Arc::new(FakeSubtitleService::new(journal.clone()));
        torrents.set_torrent_info(Some(fixtures::torrent_info(MAGNET_URL)));

        let events = EventBus::new();
        let service = Arc::new(LoadTorrentService::new(
            Arc::clone(&torrents) as Arc<dyn TorrentService>,
            Arc::clone(&streams) as Arc<dyn TorrentStreamService>,
            Arc::clone(&subtitles) as Arc<dyn SubtitleService>,
            events.clone(),
            SettingsHandle::new(settings),
        ));
        let recorded = Arc::new(Mutex::new(Vec::new()));
        service.add_listener({
            let recorded = Arc::clone(&recorded);
            move |event: LoadTorrentEvent| recorded.lock().expect("recorded lock").push(event)
        });

        Self {
            journal,
            torrents,
            streams,
            subtitles,
            events,
            service,
            recorded,
        }
    }

    fn recorded(&self) -> Vec<LoadTorrentEvent> {
        self.recorded.lock().expect("recorded lock").clone()
    }

    fn states(&self) -> Vec<LoadState> {
        self.recorded()
            .into_iter()
            .filter_map(|event| match event {
                LoadTorrentEvent::StateChanged(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    async fn wait_for_state(&self, expected: LoadState) -> anyhow::Result<()> {
        timeout(WAIT, async {
            while self.service.state().await != expected {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .with_context(|| format!("loader never reached {expected}"))
    }

    async fn wait_for_journal(&self, entry: &str) -> anyhow::Result<()> {
        timeout(WAIT, async {
            while !self.journal.contains(entry) {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .with_context(|| format!("journal never recorded {entry}"))
    }

    fn position(&self, entry: &str) -> anyhow::Result<usize> {
        self.journal
            .position(entry)
            .with_context(|| format!("journal is missing {entry}"))
    }
}

async fn next_event(stream: &mut EventStream, kind: &str) -> anyhow::Result<Event> {
    timeout(WAIT, async {
        while let Some(envelope) = stream.next().await {
            if envelope.event.kind() == kind {
                return Ok(envelope.event);
            }
        }
        bail!("event bus closed")
    })
    .await
    .with_context(|| format!("no {kind} event published"))?
}

fn status(progress: f32) -> DownloadStatus {
    DownloadStatus {
        progress,
        seeds: 12,
        peers: 4,
        download_speed: 2_048_000,
        upload_speed: 1_024,
        downloaded: 10_485_760,
        total_size: 1_073_741_824,
    }
}

#[tokio::test]
async fn media_request_reaches_ready_and_starts_playback() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness
        .subtitles
        .set_available(vec![SubtitleInfo::new("tt1254207", SubtitleLanguage::English)]);
    harness
        .subtitles
        .set_preferred(SubtitleInfo::new("tt1254207", SubtitleLanguage::English));
    harness.torrents.emit_on_subscribe(vec![
        TorrentEvent::DownloadStatus(status(0.01)),
        TorrentEvent::DownloadStatus(status(0.02)),
    ]);
    harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);
    let mut bus = harness.events.subscribe(None);

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness.wait_for_state(LoadState::Ready).await?;

    let recorded = harness.recorded();
    assert_eq!(
        recorded.first(),
        Some(&LoadTorrentEvent::MediaChanged(Some(Media::Movie(
            fixtures::movie()
        ))))
    );
    assert_eq!(
        harness.states(),
        vec![
            LoadState::Starting,
            LoadState::Connecting,
            LoadState::RetrievingSubtitles,
            LoadState::DownloadingSubtitle,
            LoadState::Downloading,
            LoadState::Downloading,
            LoadState::Ready,
        ]
    );
    let statuses = recorded
        .iter()
        .filter(|event| matches!(event, LoadTorrentEvent::DownloadStatusChanged(_)))
        .count();
    assert_eq!(statuses, 2);

    let Event::PlayStarted(play) = next_event(&mut bus, "play_started").await? else {
        bail!("unexpected event");
    };
    assert_eq!(play.title, MOVIE_TITLE);
    assert_eq!(play.url, "http://127.0.0.1:8090/Big.Buck.Bunny.1080p.mkv");
    assert!(play.subtitles_enabled);
    let media = play.media.context("media playback context")?;
    assert_eq!(media.quality, "1080p");

    assert!(harness.journal.contains("retrieve_movie_subtitles tt1254207"));
    assert!(harness.journal.contains("download_and_parse en"));
    assert!(harness.journal.contains("set_active_subtitle en"));
    Ok(())
}

#[tokio::test]
async fn named_file_is_preferred_over_the_largest_file() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);
    let request = MediaTorrentRequest::new(
        MediaTorrentInfo::new(MAGNET_URL).with_file("sample.mkv"),
        Media::Movie(fixtures::movie()),
        "1080p",
    )?;

    harness.service.load_media_torrent(request).await;
    harness.wait_for_state(LoadState::Ready).await?;

    assert!(harness.journal.contains("create sample.mkv"));
    Ok(())
}

#[tokio::test]
async fn subtitle_retrieval_timeout_does_not_block_playback() -> anyhow::Result<()> {
    let harness = Harness::with_settings(|settings| {
        settings.loader.retrieve_subtitles_timeout_secs = 1;
    });
    harness.subtitles.set_retrieve_delay(Duration::from_secs(30));
    harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness.wait_for_state(LoadState::Ready).await?;

    assert!(harness.journal.contains("default_or_interface_language 0"));
    assert!(!harness.states().contains(&LoadState::DownloadingSubtitle));
    assert!(!harness.states().contains(&LoadState::Error));
    Ok(())
}

#[tokio::test]
async fn failed_subtitle_download_disables_subtitles() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness.subtitles.fail_retrieve(true);
    harness
        .subtitles
        .set_preferred(SubtitleInfo::new("tt1254207", SubtitleLanguage::Dutch));
    harness.subtitles.fail_download(true);
    harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness.wait_for_state(LoadState::Ready).await?;

    assert!(harness.states().contains(&LoadState::DownloadingSubtitle));
    let activated = harness.subtitles.activated();
    assert_eq!(activated.len(), 1);
    assert!(activated[0].is_none());
    Ok(())
}

#[tokio::test]
async fn subtitle_download_timeout_disables_subtitles() -> anyhow::Result<()> {
    let harness = Harness::with_settings(|settings| {
        settings.loader.download_subtitle_timeout_secs = 1;
    });
    harness
        .subtitles
        .set_preferred(SubtitleInfo::new("tt1254207", SubtitleLanguage::English));
    harness.subtitles.set_download_delay(Duration::from_secs(30));
    harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness.wait_for_state(LoadState::Ready).await?;

    assert_eq!(
        harness.states(),
        vec![
            LoadState::Starting,
            LoadState::Connecting,
            LoadState::RetrievingSubtitles,
            LoadState::DownloadingSubtitle,
            LoadState::Ready,
        ]
    );
    let activated = harness.subtitles.activated();
    assert_eq!(activated.len(), 1);
    assert!(activated[0].is_none());
    Ok(())
}

#[tokio::test]
async fn subtitle_retrieval_runs_while_the_torrent_is_created() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness.torrents.set_create_delay(Duration::from_millis(500));
    harness.subtitles.set_retrieve_delay(Duration::from_millis(100));
    harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness
        .wait_for_journal("create Big.Buck.Bunny.1080p.mkv")
        .await?;
    harness
        .wait_for_journal("retrieve_movie_subtitles tt1254207")
        .await?;
    assert!(!harness.journal.contains("subscribe torrent#1"));

    harness.wait_for_state(LoadState::Ready).await?;
    Ok(())
}

#[tokio::test]
async fn cancel_during_creation_releases_the_late_torrent() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness.torrents.set_create_delay(Duration::from_millis(200));
    let mut bus = harness.events.subscribe(None);

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness
        .wait_for_journal("create Big.Buck.Bunny.1080p.mkv")
        .await?;
    harness.service.cancel().await;
    next_event(&mut bus, "load_closed").await?;
    let seen = harness.recorded().len();

    harness.wait_for_journal("remove torrent#1").await?;
    assert!(!harness.journal.contains("subscribe torrent#1"));
    assert_eq!(harness.journal.count("start_stream"), 0);
    assert_eq!(harness.recorded().len(), seen);
    assert_eq!(harness.service.state().await, LoadState::Idle);
    Ok(())
}

#[tokio::test]
async fn reload_during_creation_releases_the_first_torrent() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness.torrents.set_create_delay(Duration::from_millis(200));

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness
        .wait_for_journal("create Big.Buck.Bunny.1080p.mkv")
        .await?;

    harness.torrents.set_create_delay(Duration::ZERO);
    harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);
    harness
        .service
        .load_url_torrent(fixtures::url_request()?)
        .await;
    harness.wait_for_state(LoadState::Ready).await?;
    harness.wait_for_journal("remove torrent#2").await?;

    // the url load finished first and owns torrent#1, the late movie torrent is released
    assert!(harness.journal.contains("subscribe torrent#1"));
    assert!(!harness.journal.contains("subscribe torrent#2"));
    assert!(!harness.journal.contains("remove torrent#1"));
    assert_eq!(harness.journal.count("start_stream"), 1);
    Ok(())
}

#[tokio::test]
async fn prepare_failure_replays_the_request() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness.streams.fail_prepare(1);
    harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);

    let request = fixtures::movie_request()?;
    harness.service.load_media_torrent(request.clone()).await;
    harness.wait_for_state(LoadState::Ready).await?;

    let starts = harness
        .states()
        .into_iter()
        .filter(|state| *state == LoadState::Starting)
        .count();
    assert_eq!(starts, 2);
    assert_eq!(harness.journal.count("get_torrent_info"), 2);
    assert_eq!(harness.journal.count("start_stream"), 2);
    // the failed attempt is released before the replay creates a new torrent
    assert!(harness.position("unsubscribe torrent#1")? < harness.position("remove torrent#1")?);
    assert!(harness.position("remove torrent#1")? < harness.position("subscribe torrent#2")?);
    assert_eq!(
        harness.service.current_request().await,
        Some(LoadRequest::Media(request))
    );
    Ok(())
}

#[tokio::test]
async fn prepare_restarts_are_capped() -> anyhow::Result<()> {
    let harness = Harness::with_settings(|settings| {
        settings.loader.max_prepare_retries = 2;
    });
    harness.streams.fail_prepare(u32::MAX);

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness.wait_for_state(LoadState::Error).await?;

    assert_eq!(harness.journal.count("start_stream"), 3);
    let states = harness.states();
    assert_eq!(
        states.iter().filter(|state| **state == LoadState::Starting).count(),
        3
    );
    assert_eq!(states.last(), Some(&LoadState::Error));
    assert!(!states.contains(&LoadState::Ready));
    Ok(())
}

#[tokio::test]
async fn fatal_failures_end_in_error() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness.torrents.fail_create(true);

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness.wait_for_state(LoadState::Error).await?;

    let states = harness.states();
    assert_eq!(states.last(), Some(&LoadState::Error));
    assert_eq!(
        states.iter().filter(|state| state.is_terminal()).count(),
        1
    );
    assert_eq!(harness.journal.count("start_stream"), 0);
    Ok(())
}

#[tokio::test]
async fn unresolvable_torrent_ends_in_error() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness.torrents.set_torrent_info(None);

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness.wait_for_state(LoadState::Error).await?;

    assert_eq!(harness.journal.count("create"), 0);
    Ok(())
}

#[tokio::test]
async fn cancel_releases_resources_and_silences_the_attempt() -> anyhow::Result<()> {
    let harness = Harness::new();
    let mut bus = harness.events.subscribe(None);

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness.wait_for_journal("subscribe stream#1").await?;
    harness.service.cancel().await;

    let unsubscribe_stream = harness.position("unsubscribe stream#1")?;
    let unsubscribe_torrent = harness.position("unsubscribe torrent#1")?;
    let stop_stream = harness.position("stop_stream stream#1")?;
    let remove_torrent = harness.position("remove torrent#1")?;
    let disable_subtitle = harness.position("set_active_subtitle none")?;
    assert!(unsubscribe_stream < stop_stream);
    assert!(unsubscribe_torrent < remove_torrent);
    assert!(unsubscribe_torrent < stop_stream);
    assert!(remove_torrent < disable_subtitle);

    assert_eq!(harness.service.state().await, LoadState::Idle);
    assert_eq!(harness.service.current_request().await, None);
    next_event(&mut bus, "load_closed").await?;

    let seen = harness.recorded().len();
    let streams = harness.streams.streams();
    for stream in &streams {
        stream.emit(StreamEvent::Ready);
    }
    sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.recorded().len(), seen);
    assert!(streams.iter().all(|stream| stream.subscriber_count() == 0));
    Ok(())
}

#[tokio::test]
async fn cancel_while_waiting_for_the_session_emits_nothing_more() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness.torrents.set_session_state(SessionState::Initializing);

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness.wait_for_state(LoadState::Initializing).await?;
    harness.service.cancel().await;
    let seen = harness.recorded().len();

    harness.torrents.set_session_state(SessionState::Running);
    sleep(Duration::from_millis(50)).await;

    assert_eq!(harness.recorded().len(), seen);
    assert_eq!(harness.journal.count("get_torrent_info"), 0);
    Ok(())
}

#[tokio::test]
async fn back_to_back_loads_tear_down_the_first_attempt() -> anyhow::Result<()> {
    let harness = Harness::new();

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness.wait_for_journal("subscribe stream#1").await?;

    harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);
    harness
        .service
        .load_media_torrent(fixtures::episode_request()?)
        .await;
    harness.wait_for_state(LoadState::Ready).await?;

    let unsubscribe_torrent = harness.position("unsubscribe torrent#1")?;
    let unsubscribe_stream = harness.position("unsubscribe stream#1")?;
    let stop_stream = harness.position("stop_stream stream#1")?;
    let remove_torrent = harness.position("remove torrent#1")?;
    let second_torrent = harness.position("subscribe torrent#2")?;
    assert!(unsubscribe_stream < stop_stream);
    assert!(unsubscribe_torrent < remove_torrent);
    assert!(stop_stream < second_torrent);
    assert!(remove_torrent < second_torrent);
    assert!(
        harness
            .journal
            .contains("retrieve_episode_subtitles tt0944947 3254641")
    );

    let media = harness
        .recorded()
        .into_iter()
        .filter_map(|event| match event {
            LoadTorrentEvent::MediaChanged(media) => media,
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(
        media,
        vec![Media::Movie(fixtures::movie()), Media::Show(fixtures::show())]
    );
    Ok(())
}

#[tokio::test]
async fn retry_without_request_is_a_no_op() -> anyhow::Result<()> {
    let harness = Harness::new();
    let mut bus = harness.events.subscribe(None);

    assert!(!harness.service.retry_loading_torrent().await);

    assert!(harness.recorded().is_empty());
    assert!(harness.journal.entries().is_empty());
    assert!(timeout(Duration::from_millis(50), bus.next()).await.is_err());
    Ok(())
}

#[tokio::test]
async fn retry_replays_the_stored_request() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness.torrents.fail_create(true);

    harness
        .service
        .load_url_torrent(fixtures::url_request()?)
        .await;
    harness.wait_for_state(LoadState::Error).await?;

    harness.torrents.fail_create(false);
    harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);
    assert!(harness.service.retry_loading_torrent().await);
    harness.wait_for_state(LoadState::Ready).await?;

    assert_eq!(harness.journal.count("create Big.Buck.Bunny.1080p.mkv"), 2);
    Ok(())
}

#[tokio::test]
async fn session_wait_blocks_until_running() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness.torrents.set_session_state(SessionState::Initializing);
    harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness.wait_for_state(LoadState::Initializing).await?;
    assert_eq!(harness.journal.count("get_torrent_info"), 0);

    harness.torrents.set_session_state(SessionState::Running);
    harness.wait_for_state(LoadState::Ready).await?;

    assert_eq!(
        harness.states()[..3],
        [
            LoadState::Starting,
            LoadState::Initializing,
            LoadState::Connecting
        ]
    );
    Ok(())
}

#[tokio::test]
async fn session_wait_times_out() -> anyhow::Result<()> {
    let harness = Harness::with_settings(|settings| {
        settings.loader.session_init_timeout_secs = 1;
    });
    harness.torrents.set_session_state(SessionState::Initializing);

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness.wait_for_state(LoadState::Error).await?;

    assert_eq!(harness.journal.count("get_torrent_info"), 0);
    Ok(())
}

#[tokio::test]
async fn url_request_plays_the_file_name() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);
    let mut bus = harness.events.subscribe(None);

    harness
        .service
        .load_url_torrent(fixtures::url_request()?)
        .await;
    harness.wait_for_state(LoadState::Ready).await?;

    assert_eq!(harness.recorded()[0], LoadTorrentEvent::MediaChanged(None));
    assert_eq!(harness.journal.count("get_torrent_info"), 0);
    assert!(
        harness
            .journal
            .contains("retrieve_file_subtitles Big.Buck.Bunny.1080p.mkv")
    );
    let Event::PlayStarted(play) = next_event(&mut bus, "play_started").await? else {
        bail!("unexpected event");
    };
    assert_eq!(play.title, "Big.Buck.Bunny.1080p.mkv");
    assert!(play.media.is_none());
    Ok(())
}

#[tokio::test]
async fn stopped_stream_resets_the_loader() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness
        .streams
        .emit_on_subscribe(vec![StreamEvent::Ready, StreamEvent::Stopped]);

    harness
        .service
        .load_media_torrent(fixtures::movie_request()?)
        .await;
    harness.wait_for_state(LoadState::Idle).await?;

    assert!(harness.states().contains(&LoadState::Ready));
    assert_eq!(harness.service.current_request().await, None);
    assert!(harness.journal.contains("unsubscribe stream#1"));
    assert!(harness.journal.contains("unsubscribe torrent#1"));
    assert_eq!(harness.journal.count("stop_stream"), 0);
    assert_eq!(harness.journal.count("remove"), 0);

    // nothing is left for a later cancel to release
    harness.service.cancel().await;
    assert_eq!(harness.journal.count("stop_stream"), 0);
    assert_eq!(harness.journal.count("remove"), 0);
    Ok(())
}

#[tokio::test]
async fn load_url_publishes_torrent_details() -> anyhow::Result<()> {
    let harness = Harness::new();
    let mut bus = harness.events.subscribe(None);

    harness
        .service
        .load_url(MagnetUrlRequest::new(MAGNET_URL)?)
        .await;

    let Event::ShowTorrentDetails { url, info } =
        next_event(&mut bus, "show_torrent_details").await?
    else {
        bail!("unexpected event");
    };
    assert_eq!(url, MAGNET_URL);
    assert_eq!(info.files.len(), 3);
    assert_eq!(
        harness.recorded(),
        vec![
            LoadTorrentEvent::MediaChanged(None),
            LoadTorrentEvent::StateChanged(LoadState::Connecting),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn load_url_failure_reports_error() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness.torrents.set_torrent_info(None);

    harness
        .service
        .load_url(MagnetUrlRequest::new(MAGNET_URL)?)
        .await;
    harness.wait_for_state(LoadState::Error).await?;

    assert_eq!(
        harness.states(),
        vec![LoadState::Connecting, LoadState::Error]
    );
    Ok(())
}

#[tokio::test]
async fn bus_requests_drive_the_loader() -> anyhow::Result<()> {
    let harness = Harness::new();
    harness.streams.emit_on_subscribe(vec![StreamEvent::Ready]);
    let listener = spawn_request_listener(Arc::clone(&harness.service), &harness.events);
    let mut bus = harness.events.subscribe(None);

    harness
        .events
        .publish(Event::LoadMediaTorrent(fixtures::movie_request()?));
    next_event(&mut bus, "play_started").await?;

    assert_eq!(harness.service.state().await, LoadState::Ready);
    listener.abort();
    Ok(())
}
