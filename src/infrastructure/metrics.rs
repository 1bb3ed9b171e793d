//! Metrics collection for stream monitoring
//!
//! Lock-free counters using atomic operations.
//! Updated from the manager task and connection tasks, read via snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

/// Stream metrics collector
///
/// Thread-safe counters shared by the router, the lifecycle and every
/// connection task. Snapshots are taken for export.
pub struct MetricsCollector {
    /// Text frames received from any connection
    frames_received: AtomicU64,
    /// Messages handed to at least one handler
    messages_delivered: AtomicU64,
    /// Messages dropped because nobody listens for that (symbol, kind)
    messages_unhandled: AtomicU64,
    /// Frames that were not a valid `{stream, data}` envelope
    parse_errors: AtomicU64,
    /// Handler invocations that returned an error or panicked
    handler_failures: AtomicU64,
    /// Successful opens
    connections_opened: AtomicU64,
    /// Connect/send/receive failures
    transport_errors: AtomicU64,
    /// Reconnect timers armed
    reconnects_scheduled: AtomicU64,
    /// Subscriptions that ran out of reconnect attempts
    subscriptions_abandoned: AtomicU64,
    /// Keep-alive pings sent
    keepalive_probes: AtomicU64,
    /// Keep-alive pings that failed to send
    probe_failures: AtomicU64,
    /// Last frame timestamp (Unix millis)
    last_frame_time: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

/// Metrics snapshot for export
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub messages_delivered: u64,
    pub messages_unhandled: u64,
    pub parse_errors: u64,
    pub handler_failures: u64,
    pub connections_opened: u64,
    pub transport_errors: u64,
    pub reconnects_scheduled: u64,
    pub subscriptions_abandoned: u64,
    pub keepalive_probes: u64,
    pub probe_failures: u64,
    pub frame_rate: f64, // frames per second
    pub uptime_seconds: u64,
}

impl MetricsCollector {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            messages_unhandled: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
            connections_opened: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            reconnects_scheduled: AtomicU64::new(0),
            subscriptions_abandoned: AtomicU64::new(0),
            keepalive_probes: AtomicU64::new(0),
            probe_failures: AtomicU64::new(0),
            last_frame_time: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.last_frame_time.store(now, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unhandled(&self) {
        self.messages_unhandled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect_scheduled(&self) {
        self.reconnects_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self) {
        self.subscriptions_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_probe(&self, ok: bool) {
        self.keepalive_probes.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.probe_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let frames = self.frames_received.load(Ordering::Relaxed);

        let uptime = self.start_time.elapsed().as_secs();
        let rate = if uptime > 0 {
            frames as f64 / uptime as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            frames_received: frames,
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            messages_unhandled: self.messages_unhandled.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            reconnects_scheduled: self.reconnects_scheduled.load(Ordering::Relaxed),
            subscriptions_abandoned: self.subscriptions_abandoned.load(Ordering::Relaxed),
            keepalive_probes: self.keepalive_probes.load(Ordering::Relaxed),
            probe_failures: self.probe_failures.load(Ordering::Relaxed),
            frame_rate: rate,
            uptime_seconds: uptime,
        }
    }

    /// Milliseconds since the last frame, capped at 10000ms
    pub fn staleness_ms(&self) -> u64 {
        let last = self.last_frame_time.load(Ordering::Relaxed);
        if last == 0 {
            return 10000; // No frames yet
        }

        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        now.saturating_sub(last).min(10000)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new();
        let snapshot = collector.snapshot();

        assert_eq!(snapshot.frames_received, 0);
        assert_eq!(snapshot.messages_delivered, 0);
        assert_eq!(snapshot.reconnects_scheduled, 0);
        assert_eq!(snapshot.subscriptions_abandoned, 0);
    }

    #[test]
    fn test_record_counters() {
        let collector = MetricsCollector::new();

        collector.record_frame();
        collector.record_frame();
        collector.record_delivered();
        collector.record_unhandled();
        collector.record_handler_failure();
        collector.record_reconnect_scheduled();

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.frames_received, 2);
        assert_eq!(snapshot.messages_delivered, 1);
        assert_eq!(snapshot.messages_unhandled, 1);
        assert_eq!(snapshot.handler_failures, 1);
        assert_eq!(snapshot.reconnects_scheduled, 1);
    }

    #[test]
    fn test_probe_failures_counted_separately() {
        let collector = MetricsCollector::new();

        collector.record_probe(true);
        collector.record_probe(false);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.keepalive_probes, 2);
        assert_eq!(snapshot.probe_failures, 1);
    }

    #[test]
    fn test_staleness_no_frames() {
        let collector = MetricsCollector::new();
        assert_eq!(collector.staleness_ms(), 10000);
    }

    #[test]
    fn test_staleness_after_frame() {
        let collector = MetricsCollector::new();
        collector.record_frame();
        assert!(collector.staleness_ms() < 10000);
    }
}
