use std::sync::Arc;

use async_trait::async_trait;
use popcorn_core::{
    CallbackHandle, StreamCallback, StreamError, StreamEvent, StreamHandle,
    StreamResult, Torrent, TorrentStream, TorrentStreamService,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Registry, Relay, Routed};
use crate::channel::FxChannel;
use crate::error::IpcError;
use crate::message::FxMessage;
use crate::messages::{
    Ack, ErrorKind, StartStreamRequest, StartStreamResponse, StopStreamRequest,
    StreamEventNotification,
};

/// Stream served by the backend.
#[derive(Debug)]
pub struct ChannelStream {
    handle: StreamHandle,
    url: String,
    torrent: Arc<dyn Torrent>,
    relay: Relay<StreamEvent>,
}

impl Routed for ChannelStream {
    type Event = StreamEvent;

    fn deliver(&self, event: StreamEvent) {
        self.relay.deliver(event);
    }
}

impl TorrentStream for ChannelStream {
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
        self.relay.subscribe(callback)
    }

    fn unsubscribe(&self, handle: CallbackHandle) {
        self.relay.unsubscribe(handle);
    }
}

/// [`TorrentStreamService`] forwarding to the backend over an [`FxChannel`].
#[derive(Debug)]
pub struct ChannelStreamService {
    channel: FxChannel,
    streams: Arc<Registry<StreamHandle, ChannelStream>>,
    dispatcher: JoinHandle<()>,
}

impl ChannelStreamService {
    /// Create the service and start routing stream pushes.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(channel: FxChannel) -> Self {
        let streams = Arc::new(Registry::new());
        let events = channel.subscribe::<StreamEventNotification>();
        let dispatcher = tokio::spawn(dispatch(Arc::clone(&streams), events));
        Self {
            channel,
            streams,
            dispatcher,
        }
    }
}

impl Drop for ChannelStreamService {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

#[async_trait]
impl TorrentStreamService for ChannelStreamService {
    async fn start_stream(&self, torrent: Arc<dyn Torrent>) -> StreamResult<Arc<dyn TorrentStream>> {
        let request = StartStreamRequest {
            torrent: torrent.handle(),
        };
        let response = match self.channel.get::<_, StartStreamResponse>(&request).await {
            Ok(response) => response,
            Err(IpcError::Remote {
                kind: ErrorKind::PrepareFailed,
                reason,
                ..
            }) => {
                return Err(StreamError::PrepareFailed {
                    filename: torrent.filename(),
                    reason,
                });
            }
            Err(err) => {
                return Err(StreamError::OperationFailed {
                    operation: "stream.start",
                    handle: None,
                    source: Box::new(err),
                });
            }
        };

        let stream = Arc::new(ChannelStream {
            handle: response.handle,
            url: response.url,
            torrent,
            relay: Relay::new(),
        });
        self.streams.insert(stream.handle, Arc::clone(&stream));
        info!(handle = %stream.handle, url = %stream.url, "torrent stream started");
        Ok(stream)
    }

    async fn stop_stream(&self, handle: StreamHandle) -> StreamResult<()> {
        self.streams.remove(handle);
        match self
            .channel
            .get::<_, Ack>(&StopStreamRequest { handle })
            .await
        {
            Ok(Ack {}) => Ok(()),
            Err(IpcError::Remote {
                kind: ErrorKind::NotFound,
                ..
            }) => {
                debug!(handle = %handle, "stream was already stopped");
                Ok(())
            }
            Err(err) => Err(StreamError::OperationFailed {
                operation: "stream.stop",
                handle: Some(handle),
                source: Box::new(err),
            }),
        }
    }
}

async fn dispatch(
    streams: Arc<Registry<StreamHandle, ChannelStream>>,
    mut events: mpsc::UnboundedReceiver<FxMessage>,
) {
    while let Some(message) = events.recv().await {
        match message.decode::<StreamEventNotification>() {
            Ok(notification) => streams.route(notification.handle, notification.event),
            Err(err) => warn!(error = %err, "malformed stream notification"),
        }
    }
    debug!("stream dispatcher ended");
}
