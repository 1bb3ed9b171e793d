//! Connection lifecycle
//!
//! Owns the single active connection per symbol. Each connection runs in its
//! own task and reports back through `LifecycleEvent`s tagged with a
//! connection id; events whose id is no longer current are stale and must be
//! ignored by the caller.
//!
//! States: Idle -> Connecting -> Open -> Closing -> Idle. A transport error
//! is only logged; the close that follows it is the single reconnect trigger.

use crate::core::Symbol;
use crate::infrastructure::config::StreamConfig;
use crate::infrastructure::metrics::MetricsCollector;
use crate::log_ws;
use crate::ws::connection::{Connector, Frame, Transport, TransportError};
use crate::ws::ping::KeepAliveMonitor;
use crate::ws::stream_name::StreamNameBuilder;
use crate::ws::subscription::Subscription;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::Level;

/// Observable state of a symbol's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Subscribed, no connection and no timer
    Idle,
    /// Handshake in progress
    Connecting,
    /// Connected, frames flowing
    Open,
    /// Local close in progress
    Closing,
    /// Waiting for a reconnect timer
    ReconnectPending,
    /// Reconnect attempts exhausted; needs a fresh subscribe
    Abandoned,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::ReconnectPending => "reconnect_pending",
            ConnectionState::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events delivered to the manager task
#[derive(Debug)]
pub enum LifecycleEvent {
    Opened { symbol: Symbol, conn_id: u64 },
    Frame { symbol: Symbol, conn_id: u64, text: String },
    TransportError { symbol: Symbol, conn_id: u64, error: TransportError },
    Closed { symbol: Symbol, conn_id: u64 },
    ReconnectDue { symbol: Symbol, timer_id: u64 },
}

struct ConnectionRecord {
    id: u64,
    state: ConnectionState,
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Drop for ConnectionRecord {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Per-symbol connection owner
pub struct ConnectionLifecycle<C: Connector> {
    connector: Arc<C>,
    events: UnboundedSender<LifecycleEvent>,
    connections: HashMap<Symbol, ConnectionRecord>,
    next_id: u64,
    config: StreamConfig,
    metrics: Arc<MetricsCollector>,
}

impl<C: Connector> ConnectionLifecycle<C> {
    pub fn new(
        connector: Arc<C>,
        config: &StreamConfig,
        events: UnboundedSender<LifecycleEvent>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            connector,
            events,
            connections: HashMap::new(),
            next_id: 0,
            config: config.clone(),
            metrics,
        }
    }

    /// Build the URL and start connecting. Replaces nothing: the caller
    /// must have closed any previous connection for the symbol.
    pub fn open_for(&mut self, subscription: &Subscription) -> u64 {
        let url = StreamNameBuilder::connection_url(
            self.config.endpoint(subscription.market),
            &subscription.symbol,
            subscription.market,
            &subscription.streams,
        );

        let id = self.next_id;
        self.next_id += 1;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_connection(
            self.connector.clone(),
            url.clone(),
            subscription.symbol.clone(),
            id,
            self.config.keepalive_interval(),
            self.events.clone(),
            shutdown_rx,
            self.metrics.clone(),
        ));

        log_ws!(
            Level::INFO,
            symbol = %subscription.symbol,
            conn_id = id,
            attempt = subscription.reconnect_attempts,
            "connecting to {}", url
        );

        let record = ConnectionRecord {
            id,
            state: ConnectionState::Connecting,
            url,
            shutdown: Some(shutdown_tx),
            task,
        };
        if self.connections.insert(subscription.symbol.clone(), record).is_some() {
            log_ws!(Level::WARN, symbol = %subscription.symbol, "replaced a live connection record");
        }

        id
    }

    /// Whether `conn_id` is the symbol's current connection
    ///
    /// A connection being closed locally is no longer current.
    #[inline]
    pub fn is_current(&self, symbol: &Symbol, conn_id: u64) -> bool {
        self.connections
            .get(symbol)
            .map(|record| record.id == conn_id && record.state != ConnectionState::Closing)
            .unwrap_or(false)
    }

    /// Connecting -> Open. Returns false for stale ids.
    pub fn mark_open(&mut self, symbol: &Symbol, conn_id: u64) -> bool {
        if !self.is_current(symbol, conn_id) {
            return false;
        }
        match self.connections.get_mut(symbol) {
            Some(record) => {
                record.state = ConnectionState::Open;
                self.metrics.record_connection_opened();
                log_ws!(Level::INFO, symbol = %symbol, conn_id, "connection open: {}", record.url);
                true
            }
            _ => false,
        }
    }

    /// Forget the connection after its task reported close. Returns false
    /// for stale ids.
    pub fn remove_closed(&mut self, symbol: &Symbol, conn_id: u64) -> bool {
        if !self.is_current(symbol, conn_id) {
            return false;
        }
        self.connections.remove(symbol);
        log_ws!(Level::INFO, symbol = %symbol, conn_id, "connection closed");
        true
    }

    /// Close the symbol's connection and wait for its task to finish
    ///
    /// Same as [`begin_close`](Self::begin_close) followed by
    /// [`finish_close`](Self::finish_close).
    pub async fn close(&mut self, symbol: &Symbol) -> bool {
        self.begin_close(symbol) && self.finish_close(symbol).await
    }

    /// Open/Connecting -> Closing: tell the connection task to close
    ///
    /// The record stays until `finish_close`; events from the closing
    /// connection are stale from here on. Returns false if there is no
    /// connection.
    pub fn begin_close(&mut self, symbol: &Symbol) -> bool {
        let Some(record) = self.connections.get_mut(symbol) else {
            return false;
        };
        if let Some(shutdown) = record.shutdown.take() {
            record.state = ConnectionState::Closing;
            log_ws!(Level::INFO, symbol = %symbol, conn_id = record.id, "closing connection");
            // Err means the task already ended
            let _ = shutdown.send(());
        }
        true
    }

    /// Closing -> gone: wait for the task and forget the connection
    ///
    /// The task gets `close_timeout` to close gracefully before it is aborted.
    pub async fn finish_close(&mut self, symbol: &Symbol) -> bool {
        let Some(mut record) = self.connections.remove(symbol) else {
            return false;
        };
        if let Some(shutdown) = record.shutdown.take() {
            let _ = shutdown.send(());
        }
        if timeout(self.config.close_timeout(), &mut record.task).await.is_err() {
            log_ws!(Level::WARN, symbol = %symbol, conn_id = record.id, "graceful close timed out, aborting");
            record.task.abort();
        }
        true
    }

    /// Close every connection
    pub async fn close_all(&mut self) {
        let symbols: Vec<Symbol> = self.connections.keys().cloned().collect();
        for symbol in symbols {
            self.close(&symbol).await;
        }
    }

    pub fn state(&self, symbol: &Symbol) -> Option<ConnectionState> {
        self.connections.get(symbol).map(|record| record.state)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Drive one connection: connect, forward frames, probe, report close
#[allow(clippy::too_many_arguments)]
async fn run_connection<C: Connector>(
    connector: Arc<C>,
    url: String,
    symbol: Symbol,
    conn_id: u64,
    keepalive_interval: Duration,
    events: UnboundedSender<LifecycleEvent>,
    mut shutdown: oneshot::Receiver<()>,
    metrics: Arc<MetricsCollector>,
) {
    let connected = tokio::select! {
        result = connector.connect(&url) => result,
        _ = &mut shutdown => return,
    };

    let mut transport = match connected {
        Ok(transport) => transport,
        Err(error) => {
            let _ = events.send(LifecycleEvent::TransportError {
                symbol: symbol.clone(),
                conn_id,
                error,
            });
            let _ = events.send(LifecycleEvent::Closed { symbol, conn_id });
            return;
        }
    };

    let _ = events.send(LifecycleEvent::Opened {
        symbol: symbol.clone(),
        conn_id,
    });

    let mut monitor = KeepAliveMonitor::start(symbol.clone(), keepalive_interval, metrics.clone());

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Err(e) = transport.close().await {
                    log_ws!(Level::DEBUG, symbol = %symbol, conn_id, "close failed: {}", e);
                }
                break;
            }
            _ = monitor.tick() => {
                monitor.probe(&mut transport).await;
            }
            frame = transport.recv() => match frame {
                Some(Ok(Frame::Text(text))) => {
                    metrics.record_frame();
                    let _ = events.send(LifecycleEvent::Frame {
                        symbol: symbol.clone(),
                        conn_id,
                        text,
                    });
                }
                Some(Ok(Frame::Pong)) => monitor.record_pong(),
                Some(Err(error)) => {
                    let _ = events.send(LifecycleEvent::TransportError {
                        symbol: symbol.clone(),
                        conn_id,
                        error,
                    });
                }
                None => break,
            },
        }
    }

    let _ = events.send(LifecycleEvent::Closed { symbol, conn_id });
}
