//! Request/response and push-notification channel to the backend process.
//!
//! Frames are length prefixed (4 byte big-endian) JSON [`FxMessage`] envelopes.
//! Replies are matched on `reply_to`; every other frame is routed to the
//! subscribers of its message type.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, trace, warn};

use crate::error::{IpcError, IpcResult};
use crate::message::{FxMessage, IpcMessage};
use crate::messages::ErrorReply;

/// Default bound for a single request/response exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Cloneable handle to a channel whose IO runs on a background task.
#[derive(Debug, Clone)]
pub struct FxChannel {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    sequence_id: AtomicU32,
    outgoing: mpsc::UnboundedSender<FxMessage>,
    pending: Mutex<HashMap<u32, oneshot::Sender<FxMessage>>>,
    subscribers: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<FxMessage>>>>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl FxChannel {
    /// Start a channel over the given transport.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<T>(io: T, timeout: Duration) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            sequence_id: AtomicU32::new(1),
            outgoing,
            pending: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            timeout,
            cancel: CancellationToken::new(),
        });

        let framed = Framed::new(io, LengthDelimitedCodec::new());
        tokio::spawn(run_io(Arc::clone(&inner), framed, outgoing_rx));

        Self { inner }
    }

    /// Send a request and wait for its typed reply.
    ///
    /// # Errors
    ///
    /// Fails on timeout, when the channel closes, when the backend answers with
    /// an [`ErrorReply`], or when the reply cannot be decoded as `Resp`.
    pub async fn get<Req, Resp>(&self, request: &Req) -> IpcResult<Resp>
    where
        Req: IpcMessage,
        Resp: IpcMessage,
    {
        let sequence_id = self.inner.next_sequence_id();
        let message = FxMessage::encode(request, sequence_id, None)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner.lock_pending().insert(sequence_id, reply_tx);
        let _pending = PendingReply {
            inner: &self.inner,
            sequence_id,
        };
        self.inner.enqueue(message)?;

        let reply = match time::timeout(self.inner.timeout, reply_rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(IpcError::Closed),
            Err(_) => {
                warn!(
                    message_type = Req::TYPE,
                    sequence_id, "channel request timed out"
                );
                return Err(IpcError::Timeout {
                    message_type: Req::TYPE,
                    timeout: self.inner.timeout,
                });
            }
        };

        if reply.is::<ErrorReply>() {
            let error = reply.decode::<ErrorReply>()?;
            return Err(IpcError::Remote {
                message_type: Req::TYPE,
                kind: error.kind,
                reason: error.reason,
            });
        }
        reply.decode::<Resp>()
    }

    /// Send a message without waiting for a reply.
    ///
    /// # Errors
    ///
    /// Fails when the message cannot be encoded or the channel is closed.
    pub fn send<M: IpcMessage>(&self, message: &M) -> IpcResult<()> {
        let message = FxMessage::encode(message, self.inner.next_sequence_id(), None)?;
        self.inner.enqueue(message)
    }

    /// Answer a request received from the backend.
    ///
    /// # Errors
    ///
    /// Fails when the message cannot be encoded or the channel is closed.
    pub fn send_reply<M: IpcMessage>(&self, request: &FxMessage, message: &M) -> IpcResult<()> {
        let message = FxMessage::encode(
            message,
            self.inner.next_sequence_id(),
            Some(request.sequence_id),
        )?;
        self.inner.enqueue(message)
    }

    /// Receive every unsolicited message of type `M`.
    ///
    /// The receiver ends when the channel closes.
    #[must_use]
    pub fn subscribe<M: IpcMessage>(&self) -> mpsc::UnboundedReceiver<FxMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if !self.inner.cancel.is_cancelled() {
            self.inner
                .lock_subscribers()
                .entry(M::TYPE.to_string())
                .or_default()
                .push(sender);
        }
        receiver
    }

    /// Close the channel; pending requests fail with [`IpcError::Closed`].
    pub fn close(&self) {
        trace!("channel is being closed by client");
        self.inner.cancel.cancel();
    }

    /// Whether the channel has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Future resolving once the channel is closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.inner.cancel.cancelled()
    }
}

/// Forgets the waiter of a request once its caller stops awaiting the reply.
struct PendingReply<'a> {
    inner: &'a Inner,
    sequence_id: u32,
}

impl Drop for PendingReply<'_> {
    fn drop(&mut self) {
        self.inner.lock_pending().remove(&self.sequence_id);
    }
}

impl Inner {
    fn next_sequence_id(&self) -> u32 {
        self.sequence_id.fetch_add(1, Ordering::Relaxed)
    }

    fn enqueue(&self, message: FxMessage) -> IpcResult<()> {
        if self.cancel.is_cancelled() {
            return Err(IpcError::Closed);
        }
        self.outgoing.send(message).map_err(|_| IpcError::Closed)
    }

    fn dispatch(&self, message: FxMessage) {
        if let Some(reply_to) = message.reply_to {
            match self.lock_pending().remove(&reply_to) {
                Some(waiter) => {
                    let _ = waiter.send(message);
                }
                None => debug!(reply_to, "dropping reply without pending request"),
            }
            return;
        }

        let mut subscribers = self.lock_subscribers();
        match subscribers.get_mut(&message.message_type) {
            Some(senders) => {
                senders.retain(|sender| sender.send(message.clone()).is_ok());
            }
            None => debug!(
                message_type = %message.message_type,
                "dropping message without subscribers"
            ),
        }
    }

    fn shutdown(&self) {
        self.cancel.cancel();
        // dropping the senders fails the waiters and ends the subscriptions
        self.lock_pending().clear();
        self.lock_subscribers().clear();
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<u32, oneshot::Sender<FxMessage>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(
        &self,
    ) -> MutexGuard<'_, HashMap<String, Vec<mpsc::UnboundedSender<FxMessage>>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_io<T>(
    inner: Arc<Inner>,
    framed: Framed<T, LengthDelimitedCodec>,
    mut outgoing: mpsc::UnboundedReceiver<FxMessage>,
) where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut sink, mut stream) = framed.split();

    loop {
        tokio::select! {
            () = inner.cancel.cancelled() => break,
            Some(message) = outgoing.recv() => {
                let frame = match serde_json::to_vec(&message) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(error = %err, message_type = %message.message_type, "failed to encode frame");
                        continue;
                    }
                };
                trace!(message_type = %message.message_type, sequence_id = message.sequence_id, "sending frame");
                if let Err(err) = sink.send(Bytes::from(frame)).await {
                    warn!(error = %err, "failed to write frame");
                    break;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(frame)) => match serde_json::from_slice::<FxMessage>(&frame) {
                    Ok(message) => {
                        trace!(message_type = %message.message_type, sequence_id = message.sequence_id, "received frame");
                        inner.dispatch(message);
                    }
                    Err(err) => warn!(error = %err, "discarding malformed frame"),
                },
                Some(Err(err)) => {
                    log_read_error(&err);
                    break;
                }
                None => {
                    debug!("backend closed the channel");
                    break;
                }
            },
        }
    }

    inner.shutdown();
    debug!("channel io loop ended");
}

fn log_read_error(err: &io::Error) {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        debug!("backend closed the channel mid-frame");
    } else {
        warn!(error = %err, "failed to read frame");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Ack, ErrorKind, SessionStateChanged, SessionStateRequest, SessionStateResponse};
    use popcorn_core::SessionState;
    use tokio::io::{DuplexStream, duplex};

    type Peer = Framed<DuplexStream, LengthDelimitedCodec>;

    fn channel_pair(timeout: Duration) -> (FxChannel, Peer) {
        let (client, backend) = duplex(64 * 1024);
        (
            FxChannel::new(client, timeout),
            Framed::new(backend, LengthDelimitedCodec::new()),
        )
    }

    async fn read_message(peer: &mut Peer) -> anyhow::Result<FxMessage> {
        let frame = time::timeout(Duration::from_secs(1), peer.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("peer stream ended"))??;
        Ok(serde_json::from_slice(&frame)?)
    }

    async fn write_message(peer: &mut Peer, message: &FxMessage) -> anyhow::Result<()> {
        peer.send(Bytes::from(serde_json::to_vec(message)?)).await?;
        Ok(())
    }

    #[tokio::test]
    async fn get_matches_reply_on_sequence_id() -> anyhow::Result<()> {
        let (channel, mut peer) = channel_pair(DEFAULT_TIMEOUT);

        let request = tokio::spawn({
            let channel = channel.clone();
            async move {
                channel
                    .get::<_, SessionStateResponse>(&SessionStateRequest {})
                    .await
            }
        });

        let received = read_message(&mut peer).await?;
        assert!(received.is::<SessionStateRequest>());
        let reply = FxMessage::encode(
            &SessionStateResponse {
                state: SessionState::Running,
            },
            100,
            Some(received.sequence_id),
        )?;
        write_message(&mut peer, &reply).await?;

        let response = request.await??;
        assert_eq!(response.state, SessionState::Running);
        Ok(())
    }

    #[tokio::test]
    async fn error_replies_surface_as_remote_errors() -> anyhow::Result<()> {
        let (channel, mut peer) = channel_pair(DEFAULT_TIMEOUT);
        let request = tokio::spawn({
            let channel = channel.clone();
            async move { channel.get::<_, Ack>(&SessionStateRequest {}).await }
        });

        let received = read_message(&mut peer).await?;
        let reply = FxMessage::encode(
            &ErrorReply {
                kind: ErrorKind::PrepareFailed,
                reason: "no pieces".into(),
            },
            5,
            Some(received.sequence_id),
        )?;
        write_message(&mut peer, &reply).await?;

        let err = request.await?.expect_err("error reply");
        assert!(matches!(
            err,
            IpcError::Remote {
                kind: ErrorKind::PrepareFailed,
                ..
            }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn get_times_out_without_reply() {
        let (channel, _peer) = channel_pair(Duration::from_millis(50));
        let err = channel
            .get::<_, Ack>(&SessionStateRequest {})
            .await
            .expect_err("no reply");
        assert!(matches!(
            err,
            IpcError::Timeout {
                message_type: "SessionStateRequest",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn abandoned_requests_release_their_waiter() -> anyhow::Result<()> {
        let (channel, mut peer) = channel_pair(DEFAULT_TIMEOUT);
        let request = tokio::spawn({
            let channel = channel.clone();
            async move { channel.get::<_, Ack>(&SessionStateRequest {}).await }
        });

        let received = read_message(&mut peer).await?;
        assert_eq!(channel.inner.lock_pending().len(), 1);
        request.abort();
        assert!(request.await.is_err_and(|err| err.is_cancelled()));
        assert!(channel.inner.lock_pending().is_empty());

        // a late reply is dropped without disturbing the channel
        let reply = FxMessage::encode(&Ack {}, 7, Some(received.sequence_id))?;
        write_message(&mut peer, &reply).await?;
        assert!(!channel.is_closed());
        Ok(())
    }

    #[tokio::test]
    async fn push_messages_reach_subscribers() -> anyhow::Result<()> {
        let (channel, mut peer) = channel_pair(DEFAULT_TIMEOUT);
        let mut states = channel.subscribe::<SessionStateChanged>();

        let push = FxMessage::encode(
            &SessionStateChanged {
                state: SessionState::Initializing,
            },
            1,
            None,
        )?;
        write_message(&mut peer, &push).await?;

        let received = time::timeout(Duration::from_secs(1), states.recv())
            .await?
            .ok_or_else(|| anyhow::anyhow!("subscription ended"))?;
        assert_eq!(
            received.decode::<SessionStateChanged>()?.state,
            SessionState::Initializing
        );
        Ok(())
    }

    #[tokio::test]
    async fn send_reply_links_the_request() -> anyhow::Result<()> {
        let (channel, mut peer) = channel_pair(DEFAULT_TIMEOUT);
        let request = FxMessage::encode(&SessionStateRequest {}, 41, None)?;

        channel.send_reply(&request, &Ack {})?;

        let received = read_message(&mut peer).await?;
        assert_eq!(received.reply_to, Some(41));
        assert!(received.is::<Ack>());
        Ok(())
    }

    #[tokio::test]
    async fn backend_disconnect_closes_the_channel() -> anyhow::Result<()> {
        let (channel, peer) = channel_pair(DEFAULT_TIMEOUT);
        let mut states = channel.subscribe::<SessionStateChanged>();
        drop(peer);

        time::timeout(Duration::from_secs(1), channel.closed()).await?;
        assert!(channel.is_closed());
        assert!(states.recv().await.is_none());
        assert!(matches!(channel.send(&Ack {}), Err(IpcError::Closed)));
        Ok(())
    }
}
