//! Subscription manager
//!
//! Public façade over the stream core. A single task owns every piece of
//! mutable state (subscriptions, connections, handlers) and processes
//! commands and connection events one at a time. `SubscriptionManager` is a
//! cheap cloneable handle that talks to that task.
//!
//! `unsubscribe` and `close` are cancellation points: when they return, the
//! symbol's reconnect timer is cancelled and its connection is closed, and any
//! event still in flight for it is discarded by id.

use crate::core::{MarketType, StreamKind, Symbol};
use crate::hot_path::{HandlerRegistry, HandlerResult, MessageRouter, StreamHandler, StreamMessage};
use crate::infrastructure::config::StreamConfig;
use crate::infrastructure::metrics::MetricsCollector;
use crate::log_ws;
use crate::ws::connection::{Connector, TungsteniteConnector};
use crate::ws::lifecycle::{ConnectionLifecycle, ConnectionState, LifecycleEvent};
use crate::ws::reconnect::{PendingReconnect, ReconnectDecision, ReconnectScheduler};
use crate::{Result, StreamError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::Level;

/// Subscription entry for a single symbol
#[derive(Debug)]
pub struct Subscription {
    pub symbol: Symbol,
    pub market: MarketType,
    /// Requested kinds, deduplicated, in request order
    pub streams: Vec<StreamKind>,
    /// Reconnect attempts since the last successful open
    pub reconnect_attempts: u32,
    /// Set once attempts are exhausted
    pub abandoned: bool,
    pending_reconnect: Option<PendingReconnect>,
}

impl Subscription {
    pub fn new(symbol: Symbol, market: MarketType, streams: Vec<StreamKind>) -> Self {
        Self {
            symbol,
            market,
            streams,
            reconnect_attempts: 0,
            abandoned: false,
            pending_reconnect: None,
        }
    }

    pub fn includes(&self, kind: StreamKind) -> bool {
        self.streams.contains(&kind)
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.pending_reconnect.is_some()
    }

    /// Cancel the pending reconnect timer, if any
    pub fn cancel_reconnect(&mut self) -> bool {
        self.pending_reconnect.take().is_some()
    }
}

enum Command {
    Subscribe {
        symbol: Symbol,
        market: MarketType,
        streams: Vec<StreamKind>,
        reply: oneshot::Sender<()>,
    },
    Unsubscribe {
        symbol: Symbol,
        reply: oneshot::Sender<bool>,
    },
    Register {
        symbol: Symbol,
        kind: StreamKind,
        handler: StreamHandler,
        reply: oneshot::Sender<Result<()>>,
    },
    State {
        symbol: Symbol,
        reply: oneshot::Sender<Option<ConnectionState>>,
    },
    IsSubscribed {
        symbol: Symbol,
        kind: StreamKind,
        reply: oneshot::Sender<bool>,
    },
    Symbols {
        reply: oneshot::Sender<Vec<Symbol>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the stream manager task
///
/// Clones share the same task. `close()` from any clone is terminal for all.
#[derive(Clone)]
pub struct SubscriptionManager {
    commands: UnboundedSender<Command>,
    metrics: Arc<MetricsCollector>,
}

impl SubscriptionManager {
    /// Create a manager using tokio-tungstenite connections
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// `Config` if `config` fails validation.
    pub fn new(config: StreamConfig) -> Result<Self> {
        let connector = TungsteniteConnector::new(config.connect_timeout());
        Self::with_connector(config, connector)
    }

    /// Create a manager with a custom transport
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// `Config` if `config` fails validation.
    pub fn with_connector<C: Connector>(config: StreamConfig, connector: C) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(MetricsCollector::new());
        let (command_tx, command_rx) = unbounded_channel();
        let (event_tx, event_rx) = unbounded_channel();

        let task = ManagerTask {
            subscriptions: HashMap::new(),
            registry: HandlerRegistry::new(),
            router: MessageRouter::new(metrics.clone()),
            scheduler: ReconnectScheduler::from_config(&config),
            lifecycle: ConnectionLifecycle::new(
                Arc::new(connector),
                &config,
                event_tx.clone(),
                metrics.clone(),
            ),
            events: event_tx,
            metrics: metrics.clone(),
        };
        tokio::spawn(task.run(command_rx, event_rx));

        Ok(Self {
            commands: command_tx,
            metrics,
        })
    }

    /// Subscribe `symbol` to `streams`, replacing any existing subscription
    ///
    /// # Errors
    /// - `InvalidSymbol` for an empty or non-alphanumeric symbol
    /// - `InvalidStreamKind` if any requested kind is unsupported
    /// - `EmptyStreamSet` if no kinds are requested
    /// - `ManagerClosed` after `close()`
    pub async fn subscribe<I, S>(&self, symbol: &str, market: MarketType, streams: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbol = Symbol::parse(symbol)?;

        let mut kinds: Vec<StreamKind> = Vec::new();
        for raw in streams {
            let raw = raw.as_ref();
            let kind: StreamKind = raw
                .parse()
                .map_err(|_| StreamError::InvalidStreamKind(raw.to_string()))?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if kinds.is_empty() {
            return Err(StreamError::EmptyStreamSet(symbol.to_string()));
        }

        self.request(|reply| Command::Subscribe {
            symbol,
            market,
            streams: kinds,
            reply,
        })
        .await
        .ok_or(StreamError::ManagerClosed)
    }

    /// Remove a subscription, its connection, timer and handlers
    ///
    /// Returns false if the symbol was not subscribed.
    pub async fn unsubscribe(&self, symbol: &str) -> bool {
        let Ok(symbol) = Symbol::parse(symbol) else {
            return false;
        };
        self.request(|reply| Command::Unsubscribe { symbol, reply })
            .await
            .unwrap_or(false)
    }

    /// Register a consumer for (symbol, kind)
    ///
    /// Handlers run in registration order on the manager task and must not
    /// block. An error or panic in one handler does not affect the others.
    ///
    /// # Errors
    /// `UnknownSubscription` if `symbol` was never subscribed.
    pub async fn on_stream_data<F>(&self, symbol: &str, kind: StreamKind, handler: F) -> Result<()>
    where
        F: Fn(&StreamMessage) -> HandlerResult + Send + Sync + 'static,
    {
        let symbol = Symbol::parse(symbol)
            .map_err(|_| StreamError::UnknownSubscription(symbol.to_string()))?;
        let handler: StreamHandler = Arc::new(handler);

        self.request(|reply| Command::Register {
            symbol,
            kind,
            handler,
            reply,
        })
        .await
        .unwrap_or(Err(StreamError::ManagerClosed))
    }

    /// Current connection state, `None` if the symbol is not subscribed
    pub async fn connection_state(&self, symbol: &str) -> Option<ConnectionState> {
        let symbol = Symbol::parse(symbol).ok()?;
        self.request(|reply| Command::State { symbol, reply })
            .await
            .flatten()
    }

    /// Whether an active subscription for `symbol` lists `kind`
    pub async fn is_subscribed(&self, symbol: &str, kind: StreamKind) -> bool {
        let Ok(symbol) = Symbol::parse(symbol) else {
            return false;
        };
        self.request(|reply| Command::IsSubscribed { symbol, kind, reply })
            .await
            .unwrap_or(false)
    }

    /// Subscribed symbols, sorted
    pub async fn symbols(&self) -> Vec<Symbol> {
        self.request(|reply| Command::Symbols { reply })
            .await
            .unwrap_or_default()
    }

    /// Tear down every symbol and stop the manager. Idempotent.
    pub async fn close(&self) {
        let _ = self.request(|reply| Command::Close { reply }).await;
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Send a command and wait for its reply; `None` once the task is gone
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands.send(build(reply_tx)).ok()?;
        reply_rx.await.ok()
    }
}

/// Owner of all manager state
struct ManagerTask<C: Connector> {
    subscriptions: HashMap<Symbol, Subscription>,
    registry: HandlerRegistry,
    router: MessageRouter,
    scheduler: ReconnectScheduler,
    lifecycle: ConnectionLifecycle<C>,
    events: UnboundedSender<LifecycleEvent>,
    metrics: Arc<MetricsCollector>,
}

impl<C: Connector> ManagerTask<C> {
    async fn run(
        mut self,
        mut commands: UnboundedReceiver<Command>,
        mut events: UnboundedReceiver<LifecycleEvent>,
    ) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Close { reply }) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        // Every handle dropped
                        self.shutdown().await;
                        break;
                    }
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
        }
        log_ws!(Level::INFO, "subscription manager stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe {
                symbol,
                market,
                streams,
                reply,
            } => {
                self.subscribe(symbol, market, streams).await;
                let _ = reply.send(());
            }
            Command::Unsubscribe { symbol, reply } => {
                let removed = self.unsubscribe(&symbol).await;
                let _ = reply.send(removed);
            }
            Command::Register {
                symbol,
                kind,
                handler,
                reply,
            } => {
                let result = if self.subscriptions.contains_key(&symbol) {
                    self.registry.register(symbol, kind, handler);
                    Ok(())
                } else {
                    Err(StreamError::UnknownSubscription(symbol.to_string()))
                };
                let _ = reply.send(result);
            }
            Command::State { symbol, reply } => {
                let _ = reply.send(self.state_of(&symbol));
            }
            Command::IsSubscribed { symbol, kind, reply } => {
                let subscribed = self
                    .subscriptions
                    .get(&symbol)
                    .map(|sub| sub.includes(kind))
                    .unwrap_or(false);
                let _ = reply.send(subscribed);
            }
            Command::Symbols { reply } => {
                let mut symbols: Vec<Symbol> = self.subscriptions.keys().cloned().collect();
                symbols.sort();
                let _ = reply.send(symbols);
            }
            Command::Close { reply } => {
                // Handled in run(); kept total for the match
                self.shutdown().await;
                let _ = reply.send(());
            }
        }
    }

    fn handle_event(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Opened { symbol, conn_id } => {
                if self.lifecycle.mark_open(&symbol, conn_id) {
                    if let Some(sub) = self.subscriptions.get_mut(&symbol) {
                        sub.reconnect_attempts = 0;
                        sub.abandoned = false;
                    }
                }
            }
            LifecycleEvent::Frame {
                symbol,
                conn_id,
                text,
            } => {
                if self.lifecycle.is_current(&symbol, conn_id) {
                    self.router.route(&symbol, &text, &self.registry);
                }
            }
            LifecycleEvent::TransportError {
                symbol,
                conn_id,
                error,
            } => {
                if self.lifecycle.is_current(&symbol, conn_id) {
                    self.metrics.record_transport_error();
                    log_ws!(Level::WARN, symbol = %symbol, conn_id, "transport error: {}", error);
                }
            }
            LifecycleEvent::Closed { symbol, conn_id } => {
                if !self.lifecycle.remove_closed(&symbol, conn_id) {
                    return;
                }
                // Removed subscriptions are never rescheduled
                let Some(sub) = self.subscriptions.get_mut(&symbol) else {
                    return;
                };
                sub.cancel_reconnect();
                schedule_reconnect(&mut self.scheduler, sub, &self.events, &self.metrics);
            }
            LifecycleEvent::ReconnectDue { symbol, timer_id } => {
                let Some(sub) = self.subscriptions.get_mut(&symbol) else {
                    return;
                };
                let current = sub
                    .pending_reconnect
                    .as_ref()
                    .map(|pending| pending.id() == timer_id)
                    .unwrap_or(false);
                if !current {
                    return;
                }
                sub.pending_reconnect = None;
                if self.lifecycle.state(&symbol).is_none() {
                    self.lifecycle.open_for(sub);
                }
            }
        }
    }

    async fn subscribe(&mut self, symbol: Symbol, market: MarketType, streams: Vec<StreamKind>) {
        if let Some(mut previous) = self.subscriptions.remove(&symbol) {
            previous.cancel_reconnect();
            self.lifecycle.close(&symbol).await;
            log_ws!(Level::INFO, symbol = %symbol, "replacing existing subscription");
        }

        let sub = Subscription::new(symbol.clone(), market, streams);
        log_ws!(
            Level::INFO,
            symbol = %symbol,
            market = %market,
            streams = sub.streams.len(),
            "subscribed"
        );
        self.lifecycle.open_for(&sub);
        self.subscriptions.insert(symbol, sub);
    }

    async fn unsubscribe(&mut self, symbol: &Symbol) -> bool {
        let Some(mut sub) = self.subscriptions.remove(symbol) else {
            return false;
        };
        sub.cancel_reconnect();
        self.lifecycle.close(symbol).await;
        let handlers = self.registry.remove_symbol(symbol);
        log_ws!(Level::INFO, symbol = %symbol, handlers, "unsubscribed");
        true
    }

    async fn shutdown(&mut self) {
        for sub in self.subscriptions.values_mut() {
            sub.cancel_reconnect();
        }
        self.lifecycle.close_all().await;
        self.subscriptions.clear();
        self.registry.clear();
    }

    fn state_of(&self, symbol: &Symbol) -> Option<ConnectionState> {
        let sub = self.subscriptions.get(symbol)?;
        if let Some(state) = self.lifecycle.state(symbol) {
            return Some(state);
        }
        Some(if sub.has_pending_reconnect() {
            ConnectionState::ReconnectPending
        } else if sub.abandoned {
            ConnectionState::Abandoned
        } else {
            ConnectionState::Idle
        })
    }
}

/// Arm the next reconnect for `sub`, or mark it abandoned
fn schedule_reconnect(
    scheduler: &mut ReconnectScheduler,
    sub: &mut Subscription,
    events: &UnboundedSender<LifecycleEvent>,
    metrics: &MetricsCollector,
) {
    match scheduler.next(sub.reconnect_attempts) {
        ReconnectDecision::Retry { attempt, delay } => {
            sub.reconnect_attempts = attempt;
            sub.pending_reconnect = Some(scheduler.arm(sub.symbol.clone(), delay, events));
            metrics.record_reconnect_scheduled();
            log_ws!(
                Level::INFO,
                symbol = %sub.symbol,
                attempt,
                max = scheduler.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                "reconnect scheduled"
            );
        }
        ReconnectDecision::Exhausted { attempts } => {
            sub.abandoned = true;
            metrics.record_abandoned();
            log_ws!(
                Level::ERROR,
                symbol = %sub.symbol,
                attempts,
                "reconnect attempts exhausted, giving up until resubscribed"
            );
        }
    }
}
