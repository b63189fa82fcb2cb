//! Bridges load-request events on the bus to the orchestrator.

use std::sync::Arc;

use popcorn_events::{Event, EventBus};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::orchestrator::LoadTorrentService;

/// Spawn a task that drives `service` from the load requests published on `events`.
///
/// The subscription is taken before the task starts, so requests published
/// right after this call returns are not missed.
pub fn spawn_request_listener(
    service: Arc<LoadTorrentService>,
    events: &EventBus,
) -> JoinHandle<()> {
    let mut stream = events.subscribe(None);
    tokio::spawn(async move {
        while let Some(envelope) = stream.next().await {
            let kind = envelope.event.kind();
            match envelope.event {
                Event::LoadMediaTorrent(request) => service.load_media_torrent(request).await,
                Event::LoadUrlTorrent(request) => service.load_url_torrent(request).await,
                Event::LoadUrl(request) => service.load_url(request).await,
                Event::LoadClosed | Event::PlayStarted(_) | Event::ShowTorrentDetails { .. } => {
                    trace!(event_id = envelope.id, kind, "ignoring event");
                    continue;
                }
            }
            debug!(event_id = envelope.id, kind, "load request dispatched");
        }
    })
}
