use std::sync::Arc;

use crate::dispatch::spawn_request_listener;
use crate::error::{AppError, AppResult};
use crate::orchestrator::LoadTorrentService;
use crate::state::LoadTorrentEvent;
use popcorn_config::{ConfigLoader, LogFormatSetting, Settings, SettingsHandle};
use popcorn_core::{SubtitleService, TorrentService, TorrentStreamService};
use popcorn_events::EventBus;
use popcorn_ipc::{ChannelStreamService, ChannelSubtitleService, ChannelTorrentService, FxChannel};
use popcorn_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Build identifier baked in at compile time, if any.
const BUILD_SHA: Option<&str> = option_env!("POPCORN_BUILD_SHA");

/// Dependencies required to bootstrap the loader.
pub(crate) struct BootstrapDependencies {
    settings: Settings,
    events: EventBus,
}

impl BootstrapDependencies {
    /// Load settings from the config file and environment.
    pub(crate) fn from_env() -> AppResult<Self> {
        let settings = ConfigLoader::from_env()
            .load()
            .map_err(|err| AppError::config("config_loader.load", err))?;
        Ok(Self {
            settings,
            events: EventBus::new(),
        })
    }
}

/// Entry point for the loader boot sequence.
///
/// # Errors
///
/// Returns an error if configuration, logging or the backend connection fail.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

/// Boot sequence relying entirely on injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies { settings, events } = dependencies;

    popcorn_telemetry::init_logging(&logging_config(&settings))
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("loader");
    info!("popcorn loader bootstrap starting");

    let address = settings.backend.address.clone();
    let connection = TcpStream::connect(&address)
        .await
        .map_err(|source| AppError::Io {
            operation: "backend.connect",
            address: Some(address.clone()),
            source,
        })?;
    let channel = FxChannel::new(connection, settings.backend.request_timeout());
    info!(%address, "connected to backend");

    let torrents: Arc<dyn TorrentService> = Arc::new(ChannelTorrentService::new(channel.clone()));
    let streams: Arc<dyn TorrentStreamService> =
        Arc::new(ChannelStreamService::new(channel.clone()));
    let subtitles: Arc<dyn SubtitleService> =
        Arc::new(ChannelSubtitleService::new(channel.clone()));

    let service = Arc::new(LoadTorrentService::new(
        torrents,
        streams,
        subtitles,
        events.clone(),
        SettingsHandle::new(settings),
    ));
    service.add_listener(|event| match event {
        LoadTorrentEvent::StateChanged(state) => info!(%state, "load state changed"),
        LoadTorrentEvent::MediaChanged(media) => debug!(?media, "load media changed"),
        LoadTorrentEvent::DownloadStatusChanged(status) => trace!(
            progress = status.progress,
            peers = status.peers,
            download_speed = status.download_speed,
            "download status changed"
        ),
    });
    let listener = spawn_request_listener(Arc::clone(&service), &events);
    info!("torrent loader ready");

    tokio::select! {
        () = channel.closed() => warn!("backend connection closed"),
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("shutdown requested"),
            Err(err) => warn!(error = %err, "failed to listen for the shutdown signal"),
        },
    }

    service.cancel().await;
    listener.abort();
    channel.close();
    info!("popcorn loader stopped");
    Ok(())
}

fn logging_config(settings: &Settings) -> LoggingConfig<'_> {
    let format = match settings.logging.format {
        Some(LogFormatSetting::Json) => LogFormat::Json,
        Some(LogFormatSetting::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    };
    LoggingConfig {
        level: &settings.logging.level,
        format,
        build_sha: BUILD_SHA.unwrap_or("dev"),
    }
}
