use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use common::config::{MAX_RECONNECT_ATTEMPTS, RECONNECT_INTERVAL};
use common::models::ConnectionState;

pub mod listeners;
pub mod policy;

pub use listeners::{Listener, ListenerId, Listeners};
pub use policy::ReconnectPolicy;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub max_reconnect_attempts: u32,
    pub reconnect_interval: Duration,
    /// Capacity of the broadcast channel behind [`SignalStream::subscribe`].
    pub frame_buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            reconnect_interval: RECONNECT_INTERVAL,
            frame_buffer: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub reconnects: u64,
}

#[derive(Debug, Default)]
struct Counters {
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    reconnects: AtomicU64,
}

struct Shared {
    listeners: Listeners,
    frames_tx: broadcast::Sender<Arc<Value>>,
    state_tx: watch::Sender<ConnectionState>,
    /// Every transition in order; the watch channel only keeps the latest value.
    transitions_tx: broadcast::Sender<ConnectionState>,
    /// Bumped on every connect/close. A connection task only writes the state
    /// while its own generation is current.
    generation: AtomicU64,
    counters: Counters,
}

impl Shared {
    fn set_state(&self, generation: u64, state: ConnectionState) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            debug!("Connection state: {} -> {}", current, state);
            *current = state;
            let _ = self.transitions_tx.send(state);
            true
        });
    }

    fn dispatch(&self, frame: Value) {
        let frame = Arc::new(frame);
        self.listeners.dispatch(&frame);
        // No subscribers is fine, listeners may be the only consumers.
        let _ = self.frames_tx.send(frame);
    }
}

/// One logical streaming connection to the backend.
///
/// The connection runs on its own task: it reconnects on close with a bounded
/// number of fixed-interval attempts, parses every text frame as JSON and fans
/// it out to the registered listeners and to broadcast subscribers. Dropping
/// the handle closes the connection.
pub struct SignalStream {
    url: String,
    config: StreamConfig,
    shared: Arc<Shared>,
    outbound_tx: mpsc::UnboundedSender<Message>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SignalStream {
    /// Starts connecting to `url`. Must be called from within a tokio runtime.
    pub fn connect(url: impl Into<String>, config: StreamConfig) -> Self {
        let (frames_tx, _) = broadcast::channel(config.frame_buffer.max(1));
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let (transitions_tx, _) = broadcast::channel(64);

        let shared = Arc::new(Shared {
            listeners: Listeners::default(),
            frames_tx,
            state_tx,
            transitions_tx,
            generation: AtomicU64::new(0),
            counters: Counters::default(),
        });

        let url = url.into();
        let (outbound_tx, shutdown_tx, task) = spawn_connection(&url, &config, &shared);

        Self {
            url,
            config,
            shared,
            outbound_tx,
            shutdown_tx,
            task,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Every state transition, including short-lived ones such as `Errored`
    /// right before `Disconnected`.
    pub fn transitions(&self) -> broadcast::Receiver<ConnectionState> {
        self.shared.transitions_tx.subscribe()
    }

    /// Async alternative to [`SignalStream::on_event`]. Slow receivers lag and lose frames.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Value>> {
        self.shared.frames_tx.subscribe()
    }

    /// Registers `handler` to be called once for every parsed inbound frame.
    /// Listeners survive reconnects.
    pub fn on_event<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.shared.listeners.register(Arc::new(handler))
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    pub fn stats(&self) -> StreamStats {
        let counters = &self.shared.counters;
        StreamStats {
            frames_received: counters.frames_received.load(Ordering::Relaxed),
            frames_dropped: counters.frames_dropped.load(Ordering::Relaxed),
            reconnects: counters.reconnects.load(Ordering::Relaxed),
        }
    }

    /// Fire-and-forget. Nothing is sent or queued while the stream is not connected.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) {
        let state = self.state();
        if !state.is_connected() {
            warn!("WebSocket is not open, dropping outbound message. State: {}", state);
            return;
        }

        let text = match serde_json::to_string(payload) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize outbound message: {}", e);
                return;
            }
        };

        if self.outbound_tx.send(Message::text(text)).is_err() {
            warn!("Connection task is gone, dropping outbound message");
        }
    }

    /// Closes the connection and cancels any pending reconnect.
    pub fn close(&mut self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shutdown_tx.send_replace(true);
        let previous = self.shared.state_tx.send_replace(ConnectionState::Disconnected);
        if previous != ConnectionState::Disconnected {
            let _ = self.shared.transitions_tx.send(ConnectionState::Disconnected);
        }
        info!("Stream to {} closed", self.url);
    }

    /// Starts a fresh connection to the same url with a full reconnect budget.
    /// Listeners and subscribers are kept.
    pub fn reconnect(&mut self) {
        self.shutdown_tx.send_replace(true);
        let (outbound_tx, shutdown_tx, task) = spawn_connection(&self.url, &self.config, &self.shared);
        self.outbound_tx = outbound_tx;
        self.shutdown_tx = shutdown_tx;
        self.task = task;
    }

    /// Whether the connection task has stopped (closed or out of reconnect attempts).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SignalStream {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

fn spawn_connection(
    url: &str,
    config: &StreamConfig,
    shared: &Arc<Shared>,
) -> (mpsc::UnboundedSender<Message>, watch::Sender<bool>, JoinHandle<()>) {
    let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let connection = Connection {
        url: url.to_string(),
        generation,
        policy: ReconnectPolicy::new(config.max_reconnect_attempts, config.reconnect_interval),
        shared: shared.clone(),
        outbound_rx,
        shutdown_rx,
    };

    (outbound_tx, shutdown_tx, tokio::spawn(connection.run()))
}

enum PumpExit {
    Dropped,
    Shutdown,
}

struct Connection {
    url: String,
    generation: u64,
    policy: ReconnectPolicy,
    shared: Arc<Shared>,
    outbound_rx: mpsc::UnboundedReceiver<Message>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Connection {
    async fn run(mut self) {
        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            info!("Connecting to: {}", self.url);

            let connected = tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => break,
                result = tokio_tungstenite::connect_async(self.url.as_str()) => result,
            };

            match connected {
                Ok((ws_stream, _)) => {
                    // Sends accepted from here on belong to this connection.
                    self.discard_stale_outbound();
                    self.policy.on_open();
                    self.set_state(ConnectionState::Connected);
                    info!("WebSocket connected: {}", self.url);

                    if let PumpExit::Shutdown = self.pump(ws_stream).await {
                        break;
                    }
                }
                Err(e) => {
                    error!("Connection to {} failed: {}", self.url, e);
                    self.set_state(ConnectionState::Errored);
                }
            }

            self.set_state(ConnectionState::Disconnected);

            match self.policy.next_attempt() {
                Some((attempt, delay)) => {
                    info!(
                        "Attempting to reconnect in {:?}... ({}/{})",
                        delay,
                        attempt,
                        self.policy.max_attempts()
                    );
                    tokio::select! {
                        biased;
                        _ = self.shutdown_rx.changed() => break,
                        _ = time::sleep(delay) => {}
                    }
                    self.shared.counters.reconnects.fetch_add(1, Ordering::Relaxed);
                }
                None => {
                    warn!(
                        "Giving up on {} after {} reconnect attempts",
                        self.url,
                        self.policy.max_attempts()
                    );
                    break;
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        debug!("Connection task for {} finished", self.url);
    }

    async fn pump(&mut self, ws_stream: WsStream) -> PumpExit {
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return PumpExit::Shutdown;
                }
                Some(outbound) = self.outbound_rx.recv() => {
                    if let Err(e) = write.send(outbound).await {
                        error!("WebSocket write failed: {}", e);
                        self.set_state(ConnectionState::Errored);
                        return PumpExit::Dropped;
                    }
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => self.handle_text(text),
                        Err(_) => {
                            let counters = &self.shared.counters;
                            counters.frames_received.fetch_add(1, Ordering::Relaxed);
                            counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                            warn!("Dropping non UTF-8 binary frame ({} bytes)", bytes.len());
                        }
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = write.send(Message::Pong(payload)).await;
                        debug!("Ping - Pong message sent to websocket.");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Close message received: {:?}", frame);
                        return PumpExit::Dropped;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        self.set_state(ConnectionState::Errored);
                        return PumpExit::Dropped;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        return PumpExit::Dropped;
                    }
                },
            }
        }
    }

    /// Whatever was queued for a previous connection is not replayed.
    fn discard_stale_outbound(&mut self) {
        while self.outbound_rx.try_recv().is_ok() {
            debug!("Discarding outbound message queued before reconnect");
        }
    }

    fn handle_text(&self, text: &str) {
        let counters = &self.shared.counters;
        counters.frames_received.fetch_add(1, Ordering::Relaxed);

        match serde_json::from_str::<Value>(text) {
            Ok(frame) => self.shared.dispatch(frame),
            Err(e) => {
                counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Error parsing WebSocket message, dropping frame: {}", e);
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.shared.set_state(self.generation, state);
    }
}
