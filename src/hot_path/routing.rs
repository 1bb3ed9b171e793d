//! Message router
//!
//! Parses the combined-stream envelope `{"stream": ..., "data": ...}`,
//! recovers the stream kind from the wire name and dispatches to every handler
//! registered for (symbol, kind). Each handler is isolated: an error or panic
//! in one is logged and the rest still run.

use crate::core::{StreamKind, Symbol};
use crate::hot_path::registry::HandlerRegistry;
use crate::infrastructure::metrics::MetricsCollector;
use crate::log_ws;
use crate::ws::stream_name::STREAM_DELIMITER;
use crate::StreamError;
use serde::Deserialize;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::Level;

/// Payload delivered to consumers
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    pub symbol: Symbol,
    pub kind: StreamKind,
    /// Wire stream name, e.g. `ethusdt@markPrice@1s`
    pub stream: String,
    pub data: Value,
}

impl StreamMessage {
    pub fn new(symbol: Symbol, kind: StreamKind, stream: impl Into<String>, data: Value) -> Self {
        Self {
            symbol,
            kind,
            stream: stream.into(),
            data,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    stream: String,
    data: Value,
}

/// What happened to one inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handlers ran; `failed` of them returned an error or panicked
    Delivered { handlers: usize, failed: usize },
    /// Valid message nobody listens for
    NoHandlers,
    /// Stream name did not resolve to a known kind
    UnknownStream,
    /// Not a `{stream, data}` envelope
    Malformed,
}

pub struct MessageRouter {
    metrics: Arc<MetricsCollector>,
}

impl MessageRouter {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self { metrics }
    }

    /// Stream kind from a wire stream name
    ///
    /// `btcusdt@trade` -> Trade, `ethusdt@markPrice@1s` -> MarkPrice.
    /// Compound suffixes after the kind token are ignored.
    #[inline]
    pub fn resolve_kind(stream: &str) -> Option<StreamKind> {
        let mut segments = stream.split(STREAM_DELIMITER);
        let _symbol = segments.next()?;
        segments.next()?.parse().ok()
    }

    /// Route one raw frame for the connection owned by `symbol`
    pub fn route(&self, symbol: &Symbol, raw: &str, registry: &HandlerRegistry) -> RouteOutcome {
        let envelope: Envelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.metrics.record_parse_error();
                let err = StreamError::Parse(e.to_string());
                log_ws!(Level::WARN, symbol = %symbol, "dropping frame: {}", err);
                return RouteOutcome::Malformed;
            }
        };

        let Some(kind) = Self::resolve_kind(&envelope.stream) else {
            self.metrics.record_unhandled();
            log_ws!(Level::DEBUG, symbol = %symbol, stream = %envelope.stream, "unknown stream kind");
            return RouteOutcome::UnknownStream;
        };

        let handlers = registry.handlers_for(symbol, kind);
        if handlers.is_empty() {
            self.metrics.record_unhandled();
            return RouteOutcome::NoHandlers;
        }

        let message = StreamMessage::new(symbol.clone(), kind, envelope.stream, envelope.data);
        let mut failed = 0;

        for (index, handler) in handlers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handler(&message))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    self.metrics.record_handler_failure();
                    log_ws!(Level::WARN, symbol = %symbol, kind = %kind, handler = index, "handler failed: {}", e);
                }
                Err(_) => {
                    failed += 1;
                    self.metrics.record_handler_failure();
                    log_ws!(Level::ERROR, symbol = %symbol, kind = %kind, handler = index, "handler panicked");
                }
            }
        }

        self.metrics.record_delivered();
        RouteOutcome::Delivered {
            handlers: handlers.len(),
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hot_path::registry::{HandlerResult, StreamHandler};
    use parking_lot::Mutex;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Collects the target of every event
    struct TargetRecorder(Arc<Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> Layer<S> for TargetRecorder {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            self.0.lock().push(event.metadata().target().to_string());
        }
    }

    fn eth() -> Symbol {
        Symbol::parse("ETHUSDT").unwrap()
    }

    fn router() -> (MessageRouter, Arc<MetricsCollector>) {
        let metrics = Arc::new(MetricsCollector::new());
        (MessageRouter::new(metrics.clone()), metrics)
    }

    fn recording(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> StreamHandler {
        let log = log.clone();
        Arc::new(move |msg: &StreamMessage| -> HandlerResult {
            log.lock().push(format!("{}:{}", tag, msg.data["p"]));
            Ok(())
        })
    }

    #[test]
    fn test_resolve_kind() {
        assert_eq!(MessageRouter::resolve_kind("btcusdt@trade"), Some(StreamKind::Trade));
        assert_eq!(
            MessageRouter::resolve_kind("ethusdt@markPrice@1s"),
            Some(StreamKind::MarkPrice)
        );
        assert_eq!(
            MessageRouter::resolve_kind("ethusdt@openInterest@1s"),
            Some(StreamKind::OpenInterest)
        );
        assert_eq!(MessageRouter::resolve_kind("btcusdt@aggTrade"), None);
        assert_eq!(MessageRouter::resolve_kind("btcusdt"), None);
        assert_eq!(MessageRouter::resolve_kind(""), None);
    }

    #[test]
    fn test_compound_name_reaches_base_kind() {
        let (router, _) = router();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();
        registry.register(eth(), StreamKind::MarkPrice, recording(&log, "mark"));

        let outcome = router.route(
            &eth(),
            r#"{"stream":"ethusdt@markPrice@1s","data":{"p":"3000.1"}}"#,
            &registry,
        );

        assert_eq!(outcome, RouteOutcome::Delivered { handlers: 1, failed: 0 });
        assert_eq!(log.lock().as_slice(), ["mark:\"3000.1\""]);
    }

    #[test]
    fn test_handlers_run_in_order_despite_failures() {
        let (router, metrics) = router();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();

        let failing_log = log.clone();
        registry.register(
            eth(),
            StreamKind::Trade,
            Arc::new(move |_: &StreamMessage| -> HandlerResult {
                failing_log.lock().push("first".to_string());
                Err("consumer rejected".into())
            }),
        );
        registry.register(
            eth(),
            StreamKind::Trade,
            Arc::new(|_: &StreamMessage| -> HandlerResult { panic!("consumer bug") }),
        );
        registry.register(eth(), StreamKind::Trade, recording(&log, "third"));

        let raw = r#"{"stream":"ethusdt@trade","data":{"p":"1"}}"#;
        let outcome = router.route(&eth(), raw, &registry);
        assert_eq!(outcome, RouteOutcome::Delivered { handlers: 3, failed: 2 });

        // Next event still reaches everyone
        router.route(&eth(), raw, &registry);
        assert_eq!(
            log.lock().as_slice(),
            ["first", "third:\"1\"", "first", "third:\"1\""]
        );
        assert_eq!(metrics.snapshot().handler_failures, 4);
        assert_eq!(metrics.snapshot().messages_delivered, 2);
    }

    #[test]
    fn test_no_handlers_is_silent_drop() {
        let (router, metrics) = router();
        let registry = HandlerRegistry::new();

        let outcome = router.route(&eth(), r#"{"stream":"ethusdt@depth","data":{}}"#, &registry);
        assert_eq!(outcome, RouteOutcome::NoHandlers);
        assert_eq!(metrics.snapshot().messages_unhandled, 1);
        assert_eq!(metrics.snapshot().parse_errors, 0);
    }

    #[test]
    fn test_other_kind_not_delivered() {
        let (router, _) = router();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();
        registry.register(eth(), StreamKind::Ticker, recording(&log, "ticker"));

        let outcome = router.route(&eth(), r#"{"stream":"ethusdt@bookTicker","data":{}}"#, &registry);
        assert_eq!(outcome, RouteOutcome::NoHandlers);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_malformed_frames() {
        let (router, metrics) = router();
        let registry = HandlerRegistry::new();

        assert_eq!(router.route(&eth(), "not json", &registry), RouteOutcome::Malformed);
        assert_eq!(router.route(&eth(), r#"{"result":null,"id":1}"#, &registry), RouteOutcome::Malformed);
        assert_eq!(router.route(&eth(), r#"{"stream":"ethusdt@trade"}"#, &registry), RouteOutcome::Malformed);
        assert_eq!(metrics.snapshot().parse_errors, 3);
    }

    #[test]
    fn test_unknown_stream() {
        let (router, _) = router();
        let registry = HandlerRegistry::new();
        let outcome = router.route(&eth(), r#"{"stream":"ethusdt@aggTrade","data":{}}"#, &registry);
        assert_eq!(outcome, RouteOutcome::UnknownStream);
    }

    #[test]
    fn test_drop_and_failure_events_use_ws_target() {
        let (router, _) = router();
        let mut registry = HandlerRegistry::new();
        registry.register(
            eth(),
            StreamKind::Trade,
            Arc::new(|_: &StreamMessage| -> HandlerResult { Err("rejected".into()) }),
        );

        let targets = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(TargetRecorder(targets.clone()));
        tracing::subscriber::with_default(subscriber, || {
            router.route(&eth(), "not json", &registry);
            router.route(&eth(), r#"{"stream":"ethusdt@aggTrade","data":{}}"#, &registry);
            router.route(&eth(), r#"{"stream":"ethusdt@trade","data":{}}"#, &registry);
        });

        let targets = targets.lock();
        assert_eq!(targets.len(), 3);
        assert!(targets.iter().all(|target| target == "ws"), "targets: {:?}", targets);
    }
}
