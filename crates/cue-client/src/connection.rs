//! Supervised controller connection.
//!
//! One manager task owns the socket for its whole life:
//!
//! 1. Resolve the endpoint and connect (`Connecting`)
//! 2. Send the readiness handshake, then read frames (`Open`)
//! 3. Spawn one dispatch task per text frame; responses go through the writer task
//! 4. On close or error tear down (`Closing` → `Closed`) and sleep `retry_delay`
//! 5. A manual reconnect skips the pending sleep, or closes the open socket first.
//!    Requests made before a socket opens are superseded by that socket.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cue_dispatch::Dispatcher;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::endpoint::EndpointSource;
use crate::errors::ConnectionError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound queue depth per connection.
const OUTBOUND_BUFFER: usize = 256;

/// How long teardown waits for the writer to flush the close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection tuning.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Prefix of the readiness handshake (`"{client_name} client ready"`).
    pub client_name: String,
    /// Fixed delay between a close and the next attempt.
    pub retry_delay: Duration,
}

impl ConnectionConfig {
    pub fn handshake(&self) -> String {
        format!("{} client ready", self.client_name)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            client_name: "cue".into(),
            retry_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Identifier of one physical connection (UUID v7, time-ordered).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn_{}", self.0.simple())
    }
}

/// Published lifecycle snapshot.
#[derive(Clone, Debug)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Connect attempts since the manager started.
    pub attempts: u64,
    /// Set while a socket is (or was last) open.
    pub connection_id: Option<ConnectionId>,
    /// When `state` was entered.
    pub since: DateTime<Utc>,
}

impl ConnectionStatus {
    fn initial() -> Self {
        Self {
            state: ConnectionState::Closed,
            attempts: 0,
            connection_id: None,
            since: Utc::now(),
        }
    }
}

/// Why a served connection ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Ended {
    /// Peer closed or the transport failed.
    Dropped,
    /// Operator asked for a fresh connection.
    Reconnect,
    Shutdown,
}

/// Owns the reconnect loop. Created through [`ConnectionManager::spawn`].
pub struct ConnectionManager {
    config: ConnectionConfig,
    endpoint: Arc<dyn EndpointSource>,
    dispatcher: Arc<Dispatcher>,
    status: watch::Sender<ConnectionStatus>,
    /// Reconnect generation; each manual request bumps it.
    reconnect: watch::Receiver<u64>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    /// Start connecting in the background.
    pub fn spawn(
        config: ConnectionConfig,
        endpoint: Arc<dyn EndpointSource>,
        dispatcher: Arc<Dispatcher>,
    ) -> BridgeHandle {
        let (status, status_rx) = watch::channel(ConnectionStatus::initial());
        let (reconnect, reconnect_rx) = watch::channel(0u64);
        let cancel = CancellationToken::new();

        let manager = Self {
            config,
            endpoint,
            dispatcher,
            status,
            reconnect: reconnect_rx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(manager.run());

        BridgeHandle {
            status: status_rx,
            reconnect,
            cancel,
            task,
        }
    }

    async fn run(mut self) {
        let mut attempts = 0u64;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            attempts += 1;
            self.publish(ConnectionState::Connecting, attempts, None);

            let ended = match self.connect().await {
                Ok(Some(ws)) => {
                    let _ = self.reconnect.borrow_and_update();
                    let id = ConnectionId::new();
                    self.publish(ConnectionState::Open, attempts, Some(id));
                    let ended = self.serve(ws, id).await;
                    self.publish(ConnectionState::Closed, attempts, Some(id));
                    ended
                }
                Ok(None) => Ended::Shutdown,
                Err(e) => {
                    warn!(attempt = attempts, error_kind = e.error_kind(), error = %e, "bridge connection failed");
                    self.publish(ConnectionState::Closed, attempts, None);
                    Ended::Dropped
                }
            };

            match ended {
                Ended::Shutdown => break,
                Ended::Reconnect => continue,
                Ended::Dropped => {}
            }

            debug!(delay_ms = self.config.retry_delay.as_millis(), "scheduling reconnect");
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = reconnect_requested(&mut self.reconnect) => {
                    info!("manual reconnect, pending retry cancelled");
                }
                () = tokio::time::sleep(self.config.retry_delay) => {}
            }
        }
        let last = self.status.borrow().clone();
        self.publish(ConnectionState::Closed, last.attempts, last.connection_id);
        info!("bridge stopped");
    }

    /// One connect attempt. `Ok(None)` means shutdown won the race.
    async fn connect(&self) -> Result<Option<WsStream>, ConnectionError> {
        let endpoint = self.endpoint.endpoint();
        let url = endpoint.url()?;
        debug!(host = %endpoint.host, "connecting to bridge");

        tokio::select! {
            () = self.cancel.cancelled() => Ok(None),
            result = connect_async(url.as_str()) => {
                let (ws, _response) = result.map_err(ConnectionError::Connect)?;
                info!(host = %endpoint.host, "bridge connected");
                Ok(Some(ws))
            }
        }
    }

    #[instrument(skip_all, fields(connection_id = %id))]
    async fn serve(&mut self, ws: WsStream, id: ConnectionId) -> Ended {
        let (mut sink, mut stream) = ws.split();

        if let Err(e) = sink.send(Message::Text(self.config.handshake().into())).await {
            let e = ConnectionError::Send(e);
            warn!(error_kind = e.error_kind(), error = %e, "handshake failed");
            return Ended::Dropped;
        }

        let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);
        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    debug!(error = %e, "writer stopped");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let tasks = TaskTracker::new();
        let ended = loop {
            tokio::select! {
                () = self.cancel.cancelled() => break Ended::Shutdown,
                () = reconnect_requested(&mut self.reconnect) => {
                    info!("manual reconnect, closing open connection");
                    break Ended::Reconnect;
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let dispatcher = Arc::clone(&self.dispatcher);
                        let out_tx = out_tx.clone();
                        let text = text.to_string();
                        let _ = tasks.spawn(async move {
                            let Some(response) = dispatcher.dispatch(&text).await else {
                                return;
                            };
                            match response.to_json() {
                                Ok(json) => {
                                    if out_tx.send(Message::Text(json.into())).await.is_err() {
                                        debug!("connection gone, response discarded");
                                    }
                                }
                                Err(e) => error!(error = %e, "failed to serialize response"),
                            }
                        });
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "bridge closed by peer");
                        break Ended::Dropped;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "bridge transport error");
                        break Ended::Dropped;
                    }
                    None => {
                        info!("bridge stream ended");
                        break Ended::Dropped;
                    }
                },
            }
        };

        let attempts = self.status.borrow().attempts;
        self.publish(ConnectionState::Closing, attempts, Some(id));
        tasks.close();
        if !tasks.is_empty() {
            debug!(in_flight = tasks.len(), "discarding in-flight dispatches");
        }
        let _ = out_tx.send(Message::Close(None)).await;
        drop(out_tx);
        if tokio::time::timeout(CLOSE_TIMEOUT, writer).await.is_err() {
            warn!("writer did not finish within close timeout");
        }
        ended
    }

    fn publish(&self, state: ConnectionState, attempts: u64, connection_id: Option<ConnectionId>) {
        let _ = self.status.send_replace(ConnectionStatus {
            state,
            attempts,
            connection_id,
            since: Utc::now(),
        });
    }
}

/// Resolves on the next reconnect request the manager has not seen yet. Never
/// resolves once the handle is gone.
async fn reconnect_requested(generation: &mut watch::Receiver<u64>) {
    if generation.changed().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Control surface for a running bridge.
pub struct BridgeHandle {
    status: watch::Receiver<ConnectionStatus>,
    reconnect: watch::Sender<u64>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl BridgeHandle {
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Reconnect immediately: cancels a pending retry, or closes the open
    /// connection and dials again without waiting. While a connect attempt is
    /// in flight the request is satisfied by that attempt if it succeeds.
    pub fn reconnect_now(&self) {
        info!("manual reconnect requested");
        self.reconnect.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// Close the connection, stop retrying, and wait for the manager to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "bridge task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_text() {
        let config = ConnectionConfig {
            client_name: "stagehand".into(),
            retry_delay: Duration::from_millis(10),
        };
        assert_eq!(config.handshake(), "stagehand client ready");
        assert_eq!(ConnectionConfig::default().handshake(), "cue client ready");
    }

    #[test]
    fn connection_ids_are_unique_and_prefixed() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("conn_"));
    }

    #[test]
    fn initial_status_is_closed() {
        let status = ConnectionStatus::initial();
        assert_eq!(status.state, ConnectionState::Closed);
        assert_eq!(status.attempts, 0);
        assert!(status.connection_id.is_none());
    }
}
