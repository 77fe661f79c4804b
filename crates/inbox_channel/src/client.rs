use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::{Mutex, mpsc, oneshot, watch},
    task::JoinHandle,
    time::{Instant, interval_at, sleep, sleep_until, timeout},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMsg,
};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::{
    message::{ConnectionState, HubMethod, InboxMessage, UnreadCount, UnreadCountChanged},
    protocol::{HandshakeRequest, HubFrame, ProtocolError, decode_frames, decode_handshake},
    reconnect::ReconnectPolicy,
    subscription::{HandlerRegistry, Subscription},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("invalid hub url: {0}")]
    InvalidUrl(String),
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("hub handshake timed out")]
    HandshakeTimeout,
    #[error("hub connection is closed")]
    Closed,
    #[error("invocation `{target}` failed: {message}")]
    Invocation { target: String, message: String },
    #[error("invocation `{0}` timed out")]
    Timeout(String),
    #[error("bad payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Connection settings for the inbox hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub url: Url,
    pub access_token: Option<String>,
    pub reconnect: ReconnectPolicy,
    pub keep_alive_interval: Duration,
    pub server_timeout: Duration,
    pub handshake_timeout: Duration,
    pub invocation_timeout: Duration,
}

impl HubConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            access_token: None,
            reconnect: ReconnectPolicy::default(),
            keep_alive_interval: Duration::from_secs(15),
            server_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(15),
            invocation_timeout: Duration::from_secs(30),
        }
    }

    pub fn parse(url: &str) -> Result<Self, HubError> {
        let url = Url::parse(url).map_err(|e| HubError::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::new(url))
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// The WebSocket url: http(s) is mapped to ws(s) and the bearer token
    /// travels as `access_token`, since browsers cannot set headers on
    /// WebSocket upgrades and the hub expects it there.
    pub fn connect_url(&self) -> Result<Url, HubError> {
        let mut url = self.url.clone();
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(HubError::InvalidUrl(format!("unsupported scheme `{other}`"))),
        };
        if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
            return Err(HubError::InvalidUrl(url.to_string()));
        }
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        Ok(url)
    }
}

struct Pending {
    target: String,
    tx: oneshot::Sender<Result<Option<Value>, HubError>>,
}

struct Shared {
    registry: Arc<HandlerRegistry>,
    pending: DashMap<String, Pending>,
    state_tx: watch::Sender<ConnectionState>,
    outgoing: mpsc::UnboundedSender<HubFrame>,
    next_invocation: AtomicU64,
    invocation_timeout: Duration,
    shutdown: CancellationToken,
}

struct CloseRequest {
    reason: Option<String>,
    allow_reconnect: bool,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            info!(from = %previous, to = %state, "hub connection state changed");
        }
    }

    fn fail_pending(&self) {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                let _ = pending.tx.send(Err(HubError::Closed));
            }
        }
    }

    /// Handles one transport message; returns the close request if the hub
    /// asked us to close.
    fn handle_text(&self, text: &str) -> Option<CloseRequest> {
        for frame in decode_frames(text) {
            match frame {
                Ok(HubFrame::Invocation {
                    target, arguments, ..
                }) => {
                    let ran = self.registry.dispatch(&target, &arguments);
                    if ran == 0 {
                        debug!(%target, "no handler registered for hub invocation");
                    }
                }
                Ok(HubFrame::Completion {
                    invocation_id,
                    result,
                    error,
                }) => match self.pending.remove(&invocation_id) {
                    Some((_, pending)) => {
                        let outcome = match error {
                            Some(message) => Err(HubError::Invocation {
                                target: pending.target,
                                message,
                            }),
                            None => Ok(result),
                        };
                        let _ = pending.tx.send(outcome);
                    }
                    None => debug!(%invocation_id, "completion for unknown invocation"),
                },
                Ok(HubFrame::Ping) => trace!("hub ping"),
                Ok(HubFrame::Close {
                    error,
                    allow_reconnect,
                }) => {
                    return Some(CloseRequest {
                        reason: error,
                        allow_reconnect,
                    });
                }
                Ok(HubFrame::Unsupported(kind)) => debug!(kind, "ignoring unsupported hub frame"),
                Err(err) => warn!(error = %err, "dropping malformed hub frame"),
            }
        }
        None
    }
}

struct ClientHandle {
    task: Mutex<Option<JoinHandle<()>>>,
    _guard: DropGuard,
}

/// A connected inbox hub. Cloning is cheap; the connection is torn down by
/// [`HubClient::close`] or when the last clone is dropped.
#[derive(Clone)]
pub struct HubClient {
    shared: Arc<Shared>,
    handle: Arc<ClientHandle>,
}

impl std::fmt::Debug for HubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubClient")
            .field("state", &self.state())
            .field("registry", &self.shared.registry)
            .finish()
    }
}

impl HubClient {
    /// Opens the WebSocket and completes the hub handshake. The returned
    /// client is ready for handler registration.
    pub async fn connect(config: HubConfig) -> Result<Self, HubError> {
        let (ws, leftover) = open(&config).await?;
        let (outgoing, out_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Connected);
        let shutdown = CancellationToken::new();

        let shared = Arc::new(Shared {
            registry: HandlerRegistry::new(),
            pending: DashMap::new(),
            state_tx,
            outgoing,
            next_invocation: AtomicU64::new(0),
            invocation_timeout: config.invocation_timeout,
            shutdown: shutdown.clone(),
        });
        info!(url = %config.url, "hub connected");

        let task = tokio::spawn(run(shared.clone(), config, ws, leftover, out_rx));
        Ok(Self {
            shared,
            handle: Arc::new(ClientHandle {
                task: Mutex::new(Some(task)),
                _guard: shutdown.drop_guard(),
            }),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn registry(&self) -> Arc<HandlerRegistry> {
        self.shared.registry.clone()
    }

    /// Registers a raw handler for a hub target.
    pub fn on<F>(&self, target: &str, handler: F) -> Subscription
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.shared.registry.register(target, Arc::new(handler))
    }

    pub fn on_inbox_message<F>(&self, handler: F) -> Subscription
    where
        F: Fn(InboxMessage) + Send + Sync + 'static,
    {
        self.on(HubMethod::ReceiveInboxMessage.as_ref(), move |args| {
            match first_argument::<InboxMessage>(args) {
                Ok(msg) => handler(msg),
                Err(err) => warn!(error = %err, "rejected ReceiveInboxMessage payload"),
            }
        })
    }

    pub fn on_unread_count_changed<F>(&self, handler: F) -> Subscription
    where
        F: Fn(UnreadCountChanged) + Send + Sync + 'static,
    {
        self.on(HubMethod::UnreadCountChanged.as_ref(), move |args| match args.first() {
            None | Some(Value::Null) => handler(UnreadCountChanged::RefreshAll),
            Some(_) => match first_argument::<UnreadCount>(args) {
                Ok(count) => handler(UnreadCountChanged::Contact(count)),
                Err(err) => warn!(error = %err, "rejected UnreadCountChanged payload"),
            },
        })
    }

    fn ensure_open(&self) -> Result<(), HubError> {
        if self.state() == ConnectionState::Disconnected || self.shared.shutdown.is_cancelled() {
            return Err(HubError::Closed);
        }
        Ok(())
    }

    /// Fire-and-forget invocation.
    pub fn send(&self, target: &str, arguments: Vec<Value>) -> Result<(), HubError> {
        self.ensure_open()?;
        self.shared
            .outgoing
            .send(HubFrame::invocation(target, arguments))
            .map_err(|_| HubError::Closed)
    }

    /// Invocation that waits for the hub's completion.
    pub async fn invoke(&self, target: &str, arguments: Vec<Value>) -> Result<Option<Value>, HubError> {
        self.ensure_open()?;
        let id = self
            .shared
            .next_invocation
            .fetch_add(1, Ordering::Relaxed)
            .to_string();
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(
            id.clone(),
            Pending {
                target: target.to_string(),
                tx,
            },
        );
        let frame = HubFrame::Invocation {
            invocation_id: Some(id.clone()),
            target: target.to_string(),
            arguments,
        };
        if self.shared.outgoing.send(frame).is_err() {
            self.shared.pending.remove(&id);
            return Err(HubError::Closed);
        }
        match timeout(self.shared.invocation_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(HubError::Closed),
            Err(_) => {
                self.shared.pending.remove(&id);
                Err(HubError::Timeout(target.to_string()))
            }
        }
    }

    pub async fn send_message_to_contact(
        &self,
        contact_id: &str,
        text: &str,
    ) -> Result<Option<Value>, HubError> {
        self.invoke(
            HubMethod::SendMessageToContact.as_ref(),
            vec![json!(contact_id), json!(text)],
        )
        .await
    }

    /// Not awaited: the caller updates its own unread state optimistically.
    pub fn mark_as_read(&self, contact_id: &str) -> Result<(), HubError> {
        self.send(HubMethod::MarkAsRead.as_ref(), vec![json!(contact_id)])
    }

    /// Closes the connection, waits for the background task and drops every
    /// registered handler.
    pub async fn close(&self) {
        self.shared.shutdown.cancel();
        let task = self.handle.task.lock().await.take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                error!(error = %err, "hub task ended abnormally");
            }
        }
        self.shared.registry.clear();
        self.shared.set_state(ConnectionState::Disconnected);
    }
}

fn first_argument<T: DeserializeOwned>(args: &[Value]) -> Result<T, HubError> {
    let value = args.first().cloned().unwrap_or(Value::Null);
    Ok(serde_json::from_value(value)?)
}

async fn open(config: &HubConfig) -> Result<(WsStream, String), HubError> {
    let url = config.connect_url()?;
    let (mut ws, _response) = connect_async(url.as_str()).await?;
    ws.send(WsMsg::Text(HandshakeRequest::default().encode().into()))
        .await?;
    let reply = timeout(config.handshake_timeout, next_text(&mut ws))
        .await
        .map_err(|_| HubError::HandshakeTimeout)??;
    let leftover = decode_handshake(&reply)?.to_string();
    Ok((ws, leftover))
}

async fn next_text(ws: &mut WsStream) -> Result<String, HubError> {
    while let Some(msg) = ws.next().await {
        match msg? {
            WsMsg::Text(text) => return Ok(text.as_str().to_owned()),
            WsMsg::Binary(bytes) => return Ok(String::from_utf8_lossy(&bytes).into_owned()),
            WsMsg::Close(_) => return Err(HubError::Closed),
            _ => continue,
        }
    }
    Err(HubError::Closed)
}

enum Drive {
    Shutdown,
    Lost {
        reason: String,
        allow_reconnect: bool,
    },
}

async fn run(
    shared: Arc<Shared>,
    config: HubConfig,
    ws: WsStream,
    leftover: String,
    mut out_rx: mpsc::UnboundedReceiver<HubFrame>,
) {
    let mut ws = ws;
    let mut leftover = leftover;
    loop {
        match drive(&shared, &config, ws, &leftover, &mut out_rx).await {
            Drive::Shutdown => {
                debug!("hub task shutting down");
                break;
            }
            Drive::Lost {
                reason,
                allow_reconnect,
            } => {
                warn!(%reason, "hub connection lost");
                shared.fail_pending();
                if !allow_reconnect {
                    break;
                }
                shared.set_state(ConnectionState::Reconnecting);
                match reconnect(&shared, &config).await {
                    Some((next_ws, next_leftover)) => {
                        ws = next_ws;
                        leftover = next_leftover;
                        shared.set_state(ConnectionState::Connected);
                    }
                    None => break,
                }
            }
        }
    }
    shared.fail_pending();
    shared.set_state(ConnectionState::Disconnected);
}

async fn drive(
    shared: &Shared,
    config: &HubConfig,
    ws: WsStream,
    leftover: &str,
    out_rx: &mut mpsc::UnboundedReceiver<HubFrame>,
) -> Drive {
    if let Some(close) = shared.handle_text(leftover) {
        return lost_by_request(close);
    }
    let (mut sink, mut stream) = ws.split();
    let mut keep_alive = interval_at(
        Instant::now() + config.keep_alive_interval,
        config.keep_alive_interval,
    );
    let mut last_seen = Instant::now();

    loop {
        let deadline = last_seen + config.server_timeout;
        tokio::select! {
            _ = shared.shutdown.cancelled() => {
                let close = HubFrame::Close { error: None, allow_reconnect: false };
                let _ = sink.send(WsMsg::Text(close.encode().into())).await;
                let _ = sink.close().await;
                return Drive::Shutdown;
            }
            _ = sleep_until(deadline) => {
                return Drive::Lost { reason: "server timeout elapsed".into(), allow_reconnect: true };
            }
            _ = keep_alive.tick() => {
                if let Err(err) = sink.send(WsMsg::Text(HubFrame::Ping.encode().into())).await {
                    return Drive::Lost { reason: err.to_string(), allow_reconnect: true };
                }
            }
            frame = out_rx.recv() => match frame {
                Some(frame) => {
                    if let Err(err) = sink.send(WsMsg::Text(frame.encode().into())).await {
                        return Drive::Lost { reason: err.to_string(), allow_reconnect: true };
                    }
                }
                None => return Drive::Shutdown,
            },
            msg = stream.next() => {
                last_seen = Instant::now();
                let close = match msg {
                    Some(Ok(WsMsg::Text(text))) => shared.handle_text(text.as_str()),
                    Some(Ok(WsMsg::Binary(bytes))) => shared.handle_text(&String::from_utf8_lossy(&bytes)),
                    Some(Ok(WsMsg::Close(_))) => {
                        return Drive::Lost { reason: "closed by server".into(), allow_reconnect: true };
                    }
                    Some(Ok(_)) => None,
                    Some(Err(err)) => {
                        return Drive::Lost { reason: err.to_string(), allow_reconnect: true };
                    }
                    None => {
                        return Drive::Lost { reason: "stream ended".into(), allow_reconnect: true };
                    }
                };
                if let Some(close) = close {
                    return lost_by_request(close);
                }
            }
        }
    }
}

fn lost_by_request(close: CloseRequest) -> Drive {
    Drive::Lost {
        reason: close
            .reason
            .unwrap_or_else(|| "hub requested close".to_string()),
        allow_reconnect: close.allow_reconnect,
    }
}

async fn reconnect(shared: &Shared, config: &HubConfig) -> Option<(WsStream, String)> {
    let mut attempt = 0;
    while let Some(delay) = config.reconnect.delay_for(attempt) {
        tokio::select! {
            _ = shared.shutdown.cancelled() => return None,
            _ = sleep(delay) => {}
        }
        match open(config).await {
            Ok(pair) => {
                info!(attempt, "hub reconnected");
                return Some(pair);
            }
            Err(err) => warn!(attempt, error = %err, "hub reconnect attempt failed"),
        }
        attempt += 1;
    }
    error!(attempts = attempt, "giving up on hub reconnect");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_url_maps_scheme_and_token() {
        let config = HubConfig::parse("https://api.example.com/chatHub")
            .unwrap()
            .with_token(Some("abc 123".into()));
        let url = config.connect_url().unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.query(), Some("access_token=abc+123"));
    }

    #[test]
    fn test_connect_url_keeps_ws_without_token() {
        let config = HubConfig::parse("ws://localhost:7113/chatHub").unwrap();
        assert_eq!(
            config.connect_url().unwrap().as_str(),
            "ws://localhost:7113/chatHub"
        );
    }

    #[test]
    fn test_connect_url_rejects_other_schemes() {
        let config = HubConfig::parse("ftp://localhost/chatHub").unwrap();
        assert!(matches!(config.connect_url(), Err(HubError::InvalidUrl(_))));
    }

    #[test]
    fn test_first_argument_rejects_missing_payload() {
        assert!(first_argument::<InboxMessage>(&[]).is_err());
    }
}
