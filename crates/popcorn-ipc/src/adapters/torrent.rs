use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use popcorn_core::{
    CallbackHandle, SessionState, Torrent, TorrentCallback, TorrentError, TorrentEvent,
    TorrentFileInfo, TorrentHandle, TorrentInfo, TorrentResult, TorrentService, TorrentState,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Registry, Relay, Routed};
use crate::channel::FxChannel;
use crate::error::IpcError;
use crate::message::FxMessage;
use crate::messages::{
    Ack, CreateTorrentRequest, CreateTorrentResponse, ErrorKind, GetTorrentInfoRequest,
    GetTorrentInfoResponse, RemoveTorrentRequest, SessionStateChanged, SessionStateRequest,
    SessionStateResponse, TorrentEventNotification,
};

/// Torrent living in the backend session.
#[derive(Debug)]
pub struct ChannelTorrent {
    handle: TorrentHandle,
    filename: String,
    state: Mutex<TorrentState>,
    relay: Relay<TorrentEvent>,
}

impl ChannelTorrent {
    fn new(handle: TorrentHandle, filename: String, state: TorrentState) -> Self {
        Self {
            handle,
            filename,
            state: Mutex::new(state),
            relay: Relay::new(),
        }
    }
}

impl Routed for ChannelTorrent {
    type Event = TorrentEvent;

    fn deliver(&self, event: TorrentEvent) {
        if let TorrentEvent::StateChanged { new, .. } = &event {
            *self.state.lock().unwrap_or_else(PoisonError::into_inner) = *new;
        }
        self.relay.deliver(event);
    }
}

impl Torrent for ChannelTorrent {
    fn handle(&self) -> TorrentHandle {
        self.handle
    }

    fn filename(&self) -> String {
        self.filename.clone()
    }

    fn state(&self) -> TorrentState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribe(&self, callback: TorrentCallback) -> CallbackHandle {
        self.relay.subscribe(callback)
    }

    fn unsubscribe(&self, handle: CallbackHandle) {
        self.relay.unsubscribe(handle);
    }
}

/// [`TorrentService`] forwarding to the backend over an [`FxChannel`].
#[derive(Debug)]
pub struct ChannelTorrentService {
    channel: FxChannel,
    torrents: Arc<Registry<TorrentHandle, ChannelTorrent>>,
    session: Arc<watch::Sender<SessionState>>,
    dispatcher: JoinHandle<()>,
}

impl ChannelTorrentService {
    /// Create the service and start routing torrent and session pushes.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(channel: FxChannel) -> Self {
        let torrents = Arc::new(Registry::new());
        let (session, _) = watch::channel(SessionState::Creating);
        let session = Arc::new(session);

        let torrent_events = channel.subscribe::<TorrentEventNotification>();
        let session_events = channel.subscribe::<SessionStateChanged>();
        let dispatcher = tokio::spawn(dispatch(
            channel.clone(),
            Arc::clone(&torrents),
            Arc::clone(&session),
            torrent_events,
            session_events,
        ));

        Self {
            channel,
            torrents,
            session,
            dispatcher,
        }
    }
}

impl Drop for ChannelTorrentService {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

#[async_trait]
impl TorrentService for ChannelTorrentService {
    async fn get_torrent_info(&self, url: &str) -> TorrentResult<TorrentInfo> {
        let request = GetTorrentInfoRequest {
            url: url.to_string(),
        };
        match self
            .channel
            .get::<_, GetTorrentInfoResponse>(&request)
            .await
        {
            Ok(response) => Ok(response.info),
            Err(IpcError::Remote { reason, .. }) => Err(TorrentError::InfoUnavailable {
                url: url.to_string(),
                reason,
            }),
            Err(err) => Err(operation_failed("torrent.info", None, err)),
        }
    }

    async fn create(
        &self,
        file_info: &TorrentFileInfo,
        directory: &Path,
        auto_start: bool,
    ) -> TorrentResult<Arc<dyn Torrent>> {
        let request = CreateTorrentRequest {
            file_info: file_info.clone(),
            directory: directory.to_string_lossy().into_owned(),
            auto_start,
        };
        let response = match self.channel.get::<_, CreateTorrentResponse>(&request).await {
            Ok(response) => response,
            Err(IpcError::Remote { reason, .. }) => {
                return Err(TorrentError::CreateFailed {
                    filename: file_info.filename.clone(),
                    reason,
                });
            }
            Err(err) => return Err(operation_failed("torrent.create", None, err)),
        };

        let torrent = Arc::new(ChannelTorrent::new(
            response.handle,
            file_info.filename.clone(),
            response.state,
        ));
        self.torrents.insert(response.handle, Arc::clone(&torrent));
        info!(handle = %response.handle, filename = %file_info.filename, "torrent created");
        Ok(torrent)
    }

    async fn remove(&self, handle: TorrentHandle) -> TorrentResult<()> {
        self.torrents.remove(handle);
        match self
            .channel
            .get::<_, Ack>(&RemoveTorrentRequest { handle })
            .await
        {
            Ok(Ack {}) => {
                debug!(handle = %handle, "torrent removed");
                Ok(())
            }
            Err(IpcError::Remote {
                kind: ErrorKind::NotFound,
                ..
            }) => {
                debug!(handle = %handle, "torrent was already removed");
                Ok(())
            }
            Err(err) => Err(operation_failed("torrent.remove", Some(handle), err)),
        }
    }

    fn session_state(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }
}

fn operation_failed(
    operation: &'static str,
    handle: Option<TorrentHandle>,
    err: IpcError,
) -> TorrentError {
    TorrentError::OperationFailed {
        operation,
        handle,
        source: Box::new(err),
    }
}

async fn dispatch(
    channel: FxChannel,
    torrents: Arc<Registry<TorrentHandle, ChannelTorrent>>,
    session: Arc<watch::Sender<SessionState>>,
    mut torrent_events: mpsc::UnboundedReceiver<FxMessage>,
    mut session_events: mpsc::UnboundedReceiver<FxMessage>,
) {
    match channel
        .get::<_, SessionStateResponse>(&SessionStateRequest {})
        .await
    {
        Ok(response) => {
            session.send_replace(response.state);
        }
        Err(err) => warn!(error = %err, "failed to query torrent session state"),
    }

    loop {
        tokio::select! {
            Some(message) = torrent_events.recv() => {
                match message.decode::<TorrentEventNotification>() {
                    Ok(notification) => torrents.route(notification.handle, notification.event),
                    Err(err) => warn!(error = %err, "malformed torrent notification"),
                }
            }
            Some(message) = session_events.recv() => {
                match message.decode::<SessionStateChanged>() {
                    Ok(changed) => {
                        info!(state = %changed.state, "torrent session state changed");
                        session.send_replace(changed.state);
                    }
                    Err(err) => warn!(error = %err, "malformed session notification"),
                }
            }
            else => break,
        }
    }
    debug!("torrent dispatcher ended");
}
