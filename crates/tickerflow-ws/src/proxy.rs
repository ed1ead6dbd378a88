//! WebSocket proxy.
//!
//! One proxy owns one connection to one exchange. It forwards complete
//! text frames in both directions over channels, redials once on an
//! unexpected close, and replays the subscription log on the fresh
//! connection before resuming normal traffic.

use crate::error::{WsError, WsResult};
use crate::subscription_log::SubscriptionLog;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// Proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// WebSocket URL.
    pub url: String,
    /// Exchange label used in log lines (e.g. "Bitfinex").
    pub label: String,
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Disconnected,
    Connecting,
    Ready,
    Reconnecting,
    Terminated,
}

/// How a session loop ended.
enum SessionEnd {
    /// Interrupt requested; a normal close frame was sent.
    Interrupted,
    /// Peer closed cleanly (normal closure, going away, or no status).
    ClosedClean,
    /// Unexpected close or transport error.
    Failed(WsError),
}

/// WebSocket connection manager owned by one adapter.
pub struct Proxy {
    config: ProxyConfig,
    state: Arc<RwLock<ProxyState>>,
    /// Connection established eagerly by [`Proxy::connect`], consumed by
    /// the first session of [`Proxy::start`].
    stream: TokioMutex<Option<WsStream>>,
    inbox_tx: mpsc::Sender<String>,
    inbox_rx: TokioMutex<mpsc::Receiver<String>>,
    response_tx: mpsc::Sender<String>,
    subscriptions: SubscriptionLog,
    shutdown: CancellationToken,
}

/// Cloneable handle for the adapter side of a proxy.
#[derive(Clone)]
pub struct ProxyHandle {
    label: String,
    inbox_tx: mpsc::Sender<String>,
    state: Arc<RwLock<ProxyState>>,
    subscriptions: SubscriptionLog,
    shutdown: CancellationToken,
}

impl Proxy {
    /// Dial the exchange and return a ready proxy.
    ///
    /// Fails with [`WsError::Connect`] when the dial fails. On success the
    /// proxy is in the `Ready` state with an open connection, empty
    /// channels, and an empty replay log.
    pub async fn connect(config: ProxyConfig, response_tx: mpsc::Sender<String>) -> WsResult<Self> {
        info!(label = %config.label, url = %config.url, "Connecting proxy");

        let (stream, _response) =
            connect_async_tls_with_config(config.url.as_str(), None, true, None)
                .await
                .map_err(|e| WsError::Connect(e.to_string()))?;

        let (inbox_tx, inbox_rx) = mpsc::channel(256);

        Ok(Self {
            config,
            state: Arc::new(RwLock::new(ProxyState::Ready)),
            stream: TokioMutex::new(Some(stream)),
            inbox_tx,
            inbox_rx: TokioMutex::new(inbox_rx),
            response_tx,
            subscriptions: SubscriptionLog::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Get a handle for sending frames and controlling the proxy.
    pub fn handle(&self) -> ProxyHandle {
        ProxyHandle {
            label: self.config.label.clone(),
            inbox_tx: self.inbox_tx.clone(),
            state: self.state.clone(),
            subscriptions: self.subscriptions.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Ordered log of raw subscribe frames replayed after a reconnect.
    pub fn subscriptions(&self) -> &SubscriptionLog {
        &self.subscriptions
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProxyState {
        *self.state.read()
    }

    /// Run until interrupt or terminal failure.
    ///
    /// The loop writes inbox frames to the wire and forwards received text
    /// frames to the response channel. An unexpected close triggers exactly
    /// one immediate redial; the replay log is re-sent in original order on
    /// the fresh connection before any queued inbox frame. A clean close or
    /// an interrupt terminates the proxy.
    pub async fn start(&self) -> WsResult<()> {
        let mut stream = self
            .stream
            .lock()
            .await
            .take()
            .ok_or(WsError::NotConnected)?;
        let mut replay = false;

        loop {
            match self.run_session(stream, replay).await {
                SessionEnd::Interrupted => {
                    info!(label = %self.config.label, "Proxy interrupted");
                    *self.state.write() = ProxyState::Terminated;
                    return Ok(());
                }
                SessionEnd::ClosedClean => {
                    info!(label = %self.config.label, "Peer closed connection");
                    *self.state.write() = ProxyState::Terminated;
                    return Ok(());
                }
                SessionEnd::Failed(e) => {
                    warn!(label = %self.config.label, error = %e, "Connection lost, redialing");
                    *self.state.write() = ProxyState::Reconnecting;

                    stream = match connect_async_tls_with_config(
                        self.config.url.as_str(),
                        None,
                        true,
                        None,
                    )
                    .await
                    {
                        Ok((s, _)) => s,
                        Err(redial) => {
                            error!(label = %self.config.label, error = %redial, "Redial failed");
                            *self.state.write() = ProxyState::Terminated;
                            return Err(WsError::Reconnect(redial.to_string()));
                        }
                    };

                    *self.state.write() = ProxyState::Ready;
                    replay = true;
                }
            }
        }
    }

    /// One connection's worth of traffic.
    async fn run_session(&self, stream: WsStream, replay: bool) -> SessionEnd {
        let (mut write, mut read) = stream.split();

        if replay {
            if let Err(end) = self.replay_subscriptions(&mut write).await {
                return end;
            }
        }

        let mut inbox = self.inbox_rx.lock().await;

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    if let Err(e) = write.send(Message::Close(Some(close_normal()))).await {
                        warn!(label = %self.config.label, error = %e, "Failed to send close frame");
                    }
                    return SessionEnd::Interrupted;
                }

                frame = inbox.recv() => {
                    let Some(text) = frame else {
                        // Every handle dropped; nothing left to proxy.
                        let _ = write.send(Message::Close(Some(close_normal()))).await;
                        return SessionEnd::Interrupted;
                    };

                    debug!(label = %self.config.label, %text, "Sending frame");
                    if let Err(e) = write.send(Message::Text(text)).await {
                        return SessionEnd::Failed(e.into());
                    }
                }

                msg = read.next() => {
                    match self.handle_incoming(&mut write, msg).await {
                        Ok(()) => {}
                        Err(end) => return end,
                    }
                }
            }
        }
    }

    async fn handle_incoming(
        &self,
        write: &mut WsWrite,
        msg: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    ) -> Result<(), SessionEnd> {
        match msg {
            Some(Ok(Message::Text(text))) => {
                if self.response_tx.send(text).await.is_err() {
                    warn!(label = %self.config.label, "Response receiver dropped");
                    return Err(SessionEnd::Interrupted);
                }
                Ok(())
            }
            Some(Ok(Message::Ping(data))) => {
                if let Err(e) = write.send(Message::Pong(data)).await {
                    return Err(SessionEnd::Failed(e.into()));
                }
                Ok(())
            }
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = frame
                    .map(|f| (u16::from(f.code), f.reason.to_string()))
                    .unwrap_or((1005, String::new()));

                if is_clean_close(code) {
                    debug!(label = %self.config.label, code, "Clean close from peer");
                    Err(SessionEnd::ClosedClean)
                } else {
                    Err(SessionEnd::Failed(WsError::ConnectionClosed {
                        code,
                        reason,
                    }))
                }
            }
            Some(Ok(_)) => Ok(()),
            Some(Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)) => {
                Err(SessionEnd::ClosedClean)
            }
            Some(Err(e)) => Err(SessionEnd::Failed(e.into())),
            None => Err(SessionEnd::ClosedClean),
        }
    }

    /// Re-send every logged subscribe frame in original order.
    async fn replay_subscriptions(&self, write: &mut WsWrite) -> Result<(), SessionEnd> {
        let frames = self.subscriptions.snapshot();
        info!(
            label = %self.config.label,
            count = frames.len(),
            "Replaying subscriptions"
        );

        for frame in frames {
            if let Err(e) = write.send(Message::Text(frame)).await {
                return Err(SessionEnd::Failed(e.into()));
            }
        }

        Ok(())
    }
}

impl ProxyHandle {
    /// Enqueue a complete text frame for delivery to the wire.
    pub async fn send(&self, frame: String) -> WsResult<()> {
        self.inbox_tx
            .send(frame)
            .await
            .map_err(|_| WsError::SendFailed(format!("{} proxy inbox closed", self.label)))
    }

    /// The replay log shared with the owning proxy.
    pub fn subscriptions(&self) -> &SubscriptionLog {
        &self.subscriptions
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProxyState {
        *self.state.read()
    }

    /// Cancelled when the proxy is interrupted.
    pub fn cancelled_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Send a normal close frame to the peer and terminate the start loop.
    pub fn interrupt(&self) {
        info!(label = %self.label, "Interrupt requested");
        self.shutdown.cancel();
    }
}

/// Codes treated as clean shutdown: normal closure, going away, and
/// no-status-received.
fn is_clean_close(code: u16) -> bool {
    matches!(code, 1000 | 1001 | 1005)
}

fn close_normal() -> CloseFrame<'static> {
    CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_close_codes() {
        assert!(is_clean_close(1000));
        assert!(is_clean_close(1001));
        assert!(is_clean_close(1005));
        assert!(!is_clean_close(1006));
        assert!(!is_clean_close(1011));
    }
}
