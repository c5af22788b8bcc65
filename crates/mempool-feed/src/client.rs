use {
    crate::{
        config::FeedConfig,
        error::FeedError,
        events::{EventBus, FeedEvent, HandlerId},
        frames::{self, Frame},
        health::{ConnectionState, FeedHealth, Stats},
    },
    futures::{SinkExt, StreamExt},
    std::{
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, AtomicU64, Ordering},
        },
        time::Instant,
    },
    tokio::{net::TcpStream, sync::mpsc},
    tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Push-feed client. Cheap to clone; all clones share one connection.
///
/// The websocket is owned by a single reader task; the client only talks to
/// it through a command channel, so no lock is ever held across network IO.
#[derive(Clone)]
pub struct FeedClient(Arc<Inner>);

struct Inner {
    config: FeedConfig,
    state: Mutex<ConnectionState>,
    bus: EventBus,
    stats: Mutex<Stats>,
    /// Bumped by `disconnect()`. Reader tasks and reconnect timers belonging
    /// to an older generation stop themselves instead of acting.
    generation: AtomicU64,
    connection: Mutex<Option<Connection>>,
    subscribed: AtomicBool,
}

struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
    reader: tokio::task::JoinHandle<()>,
}

impl FeedClient {
    pub fn new(config: FeedConfig) -> Self {
        Self(Arc::new(Inner {
            config,
            state: Mutex::new(ConnectionState::Disconnected),
            bus: EventBus::default(),
            stats: Mutex::new(Stats::default()),
            generation: AtomicU64::new(0),
            connection: Mutex::new(None),
            subscribed: AtomicBool::new(false),
        }))
    }

    /// Registers an event handler. Handlers may unsubscribe themselves (or
    /// others) while an event is being dispatched.
    pub fn subscribe_events(
        &self,
        handler: impl Fn(&FeedEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        self.0.bus.subscribe(handler)
    }

    pub fn unsubscribe_events(&self, id: HandlerId) {
        self.0.bus.unsubscribe(id);
    }

    /// Establishes the connection. Calling while already connected or
    /// connecting is a no-op.
    pub async fn connect(&self) -> Result<(), FeedError> {
        {
            let mut state = self.0.state.lock().unwrap();
            match *state {
                ConnectionState::Connected | ConnectionState::Connecting => return Ok(()),
                _ => *state = ConnectionState::Connecting,
            }
        }
        let generation = self.0.generation.load(Ordering::SeqCst);
        match self.open_socket().await {
            Ok(stream) => {
                if self.0.generation.load(Ordering::SeqCst) != generation {
                    // disconnect() raced the handshake; stay disconnected.
                    return Ok(());
                }
                self.install(stream, generation);
                Ok(())
            }
            Err(err) => {
                *self.0.state.lock().unwrap() = ConnectionState::Disconnected;
                Err(err)
            }
        }
    }

    /// Tears the connection down and cancels any scheduled reconnect. Never
    /// fails; repeated calls are no-ops.
    pub fn disconnect(&self) {
        {
            let mut state = self.0.state.lock().unwrap();
            if *state == ConnectionState::Disconnected {
                return;
            }
            *state = ConnectionState::Disconnected;
        }
        self.0.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(connection) = self.0.connection.lock().unwrap().take() {
            connection.reader.abort();
        }
        self.0.stats.lock().unwrap().connected_at = None;
        self.0.bus.emit(&FeedEvent::Disconnected {
            reason: "disconnect requested".to_owned(),
        });
    }

    /// Sends the pending-transaction subscription frame. Requires an
    /// established connection; the subscription is renewed automatically
    /// after a reconnect.
    pub fn subscribe_pending_txs(&self) -> Result<(), FeedError> {
        if *self.0.state.lock().unwrap() != ConnectionState::Connected {
            return Err(FeedError::NotConnected);
        }
        self.0.subscribed.store(true, Ordering::SeqCst);
        self.send_subscription()
    }

    pub fn health(&self) -> FeedHealth {
        let state = *self.0.state.lock().unwrap();
        let stats = self.0.stats.lock().unwrap();
        FeedHealth {
            state,
            last_message_age: stats.last_message_at.map(|at| at.elapsed()),
            messages_received: stats.messages_received,
            transactions_emitted: stats.transactions_emitted,
            parse_errors: stats.parse_errors,
            reconnect_count: stats.reconnect_count,
            average_message_gap_ms: stats.message_gap.average(),
            uptime: stats.connected_at.map(|at| at.elapsed()),
            subscription_id: stats.subscription_id.clone(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.0.state.lock().unwrap()
    }

    async fn open_socket(&self) -> Result<WsStream, FeedError> {
        let connect = connect_async(self.0.config.url.as_str());
        match tokio::time::timeout(self.0.config.connect_timeout(), connect).await {
            Ok(Ok((stream, _response))) => Ok(stream),
            Ok(Err(err)) => Err(FeedError::ConnectFailed(err.to_string())),
            Err(_) => Err(FeedError::ConnectFailed("connect timed out".to_owned())),
        }
    }

    fn install(&self, stream: WsStream, generation: u64) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(run_connection(self.0.clone(), stream, outbound_rx, generation));
        *self.0.connection.lock().unwrap() = Some(Connection { outbound, reader });
        self.0.stats.lock().unwrap().connected_at = Some(Instant::now());
        *self.0.state.lock().unwrap() = ConnectionState::Connected;
        self.0.bus.emit(&FeedEvent::Connected);
        if self.0.subscribed.load(Ordering::SeqCst)
            && let Err(err) = self.send_subscription()
        {
            tracing::warn!(?err, "failed to renew subscription after reconnect");
        }
    }

    fn send_subscription(&self) -> Result<(), FeedError> {
        let config = &self.0.config;
        let mut params = serde_json::json!({
            "authorization": config.auth_token,
            "chains": config
                .chains
                .iter()
                .map(|id| format!("0x{id:x}"))
                .collect::<Vec<_>>(),
        });
        if let Some(routers) = &config.router_allowlist {
            params["routers"] = serde_json::to_value(routers).unwrap_or_default();
        }
        let frame = serde_json::json!({
            "id": 1,
            "method": "subscribe",
            "params": params,
        });
        let connection = self.0.connection.lock().unwrap();
        let Some(connection) = connection.as_ref() else {
            return Err(FeedError::NotConnected);
        };
        connection
            .outbound
            .send(Message::Text(frame.to_string()))
            .map_err(|_| FeedError::NotConnected)
    }
}

/// Reader task owning the websocket. Exits on close or error; connection
/// loss of the current generation schedules reconnection.
async fn run_connection(
    inner: Arc<Inner>,
    stream: WsStream,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    generation: u64,
) {
    let (mut write, mut read) = stream.split();
    let reason = loop {
        tokio::select! {
            command = outbound_rx.recv() => match command {
                Some(message) => {
                    if let Err(err) = write.send(message).await {
                        break format!("write failed: {err}");
                    }
                }
                None => break "connection handle dropped".to_owned(),
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_text(&inner, &text),
                Some(Ok(Message::Close(_))) => break "server closed the connection".to_owned(),
                Some(Ok(_)) => {}
                Some(Err(err)) => break format!("receive failed: {err}"),
                None => break "stream ended".to_owned(),
            },
        }
    };
    on_connection_lost(inner, generation, reason);
}

fn handle_text(inner: &Arc<Inner>, text: &str) {
    inner.stats.lock().unwrap().on_message(Instant::now());
    match frames::parse(text) {
        Ok(Frame::PendingTx(tx)) => {
            if let Some(allowlist) = &inner.config.router_allowlist
                && !tx.to.is_some_and(|to| allowlist.contains(&to))
            {
                return;
            }
            inner.stats.lock().unwrap().transactions_emitted += 1;
            inner.bus.emit(&FeedEvent::PendingTx(Arc::new(tx)));
        }
        Ok(Frame::Confirmation { subscription_id }) => {
            tracing::info!(subscription_id = %subscription_id, "subscription confirmed");
            inner.stats.lock().unwrap().subscription_id = Some(subscription_id);
        }
        Ok(Frame::Error { code, message }) => {
            let error = frames::classify_error(code, &message);
            match &error {
                FeedError::RateLimited(_) => {
                    tracing::warn!(code, message = %message, "feed rate limited");
                }
                _ => tracing::error!(code, message = %message, "feed error frame"),
            }
            inner.bus.emit(&FeedEvent::Error(error));
        }
        Err(err) => {
            inner.stats.lock().unwrap().parse_errors += 1;
            tracing::debug!(?err, "dropping malformed frame");
        }
    }
}

fn on_connection_lost(inner: Arc<Inner>, generation: u64, reason: String) {
    if inner.generation.load(Ordering::SeqCst) != generation {
        // Explicit disconnect; nothing to do.
        return;
    }
    *inner.state.lock().unwrap() = ConnectionState::Reconnecting;
    inner.stats.lock().unwrap().connected_at = None;
    inner.connection.lock().unwrap().take();
    tracing::warn!(reason = %reason, "feed connection lost, scheduling reconnect");
    inner.bus.emit(&FeedEvent::Disconnected { reason });
    tokio::spawn(reconnect_loop(FeedClient(inner), generation));
}

async fn reconnect_loop(client: FeedClient, generation: u64) {
    let config = client.0.config.reconnect.clone();
    for attempt in 1..=config.max_attempts {
        tokio::time::sleep(config.delay(attempt)).await;
        // A timer scheduled before disconnect() must not act after it.
        if client.0.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        *client.0.state.lock().unwrap() = ConnectionState::Connecting;
        match client.open_socket().await {
            Ok(stream) => {
                if client.0.generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                client.0.stats.lock().unwrap().reconnect_count += 1;
                tracing::info!(attempt, "feed reconnected");
                client.install(stream, generation);
                return;
            }
            Err(err) => {
                tracing::warn!(attempt, ?err, "reconnect attempt failed");
                *client.0.state.lock().unwrap() = ConnectionState::Reconnecting;
            }
        }
    }
    tracing::error!(
        attempts = config.max_attempts,
        "exhausted reconnection attempts"
    );
    client
        .0
        .bus
        .emit(&FeedEvent::Error(FeedError::MaxReconnects(config.max_attempts)));
    // The client stays in `Reconnecting` until connect() is invoked again.
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> FeedConfig {
        serde_json::from_value(serde_json::json!({
            "url": url,
            "auth-token": "token",
            "chains": [1],
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn connect_failure_returns_to_disconnected() {
        let client = FeedClient::new(config("ws://127.0.0.1:9/"));
        let result = client.connect().await;
        assert!(matches!(result, Err(FeedError::ConnectFailed(_))));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let client = FeedClient::new(config("ws://127.0.0.1:9/"));
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn subscribing_while_disconnected_fails() {
        let client = FeedClient::new(config("ws://127.0.0.1:9/"));
        assert!(matches!(
            client.subscribe_pending_txs(),
            Err(FeedError::NotConnected)
        ));
    }
}
