//! Keep-alive probing for open connections
//!
//! Sends a ping on a fixed interval while a connection is open.
//! Probe failures are logged and counted; they never close the connection
//! or touch reconnect bookkeeping. Liveness comes from transport close/error
//! signaling only, so a half-open socket that stops answering pings is not
//! detected here.

use crate::core::Symbol;
use crate::infrastructure::metrics::MetricsCollector;
use crate::log_ws;
use crate::ws::connection::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::Level;

/// Periodic liveness probe for one connection
pub struct KeepAliveMonitor {
    symbol: Symbol,
    ticker: Interval,
    probes_sent: u64,
    probe_failures: u64,
    last_pong: Option<Instant>,
    metrics: Arc<MetricsCollector>,
}

impl KeepAliveMonitor {
    /// Start a monitor; the first probe fires one full `period` from now
    pub fn start(symbol: Symbol, period: Duration, metrics: Arc<MetricsCollector>) -> Self {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            symbol,
            ticker,
            probes_sent: 0,
            probe_failures: 0,
            last_pong: None,
            metrics,
        }
    }

    /// Wait for the next probe slot. Cancel safe.
    pub async fn tick(&mut self) {
        self.ticker.tick().await;
    }

    /// Send one probe. Failure is reported, not propagated.
    pub async fn probe<T: Transport>(&mut self, transport: &mut T) {
        self.probes_sent += 1;
        match transport.ping().await {
            Ok(()) => {
                self.metrics.record_probe(true);
                log_ws!(Level::TRACE, symbol = %self.symbol, "keep-alive probe sent");
            }
            Err(e) => {
                self.probe_failures += 1;
                self.metrics.record_probe(false);
                log_ws!(
                    Level::WARN,
                    symbol = %self.symbol,
                    failures = self.probe_failures,
                    "keep-alive probe failed: {}", e
                );
            }
        }
    }

    /// Record a pong (informational only)
    #[inline]
    pub fn record_pong(&mut self) {
        self.last_pong = Some(Instant::now());
    }

    pub fn probes_sent(&self) -> u64 {
        self.probes_sent
    }

    pub fn probe_failures(&self) -> u64 {
        self.probe_failures
    }

    pub fn last_pong(&self) -> Option<Instant> {
        self.last_pong
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::connection::{Frame, Result as TransportResult, TransportError};

    /// Transport whose ping outcome is fixed
    struct PingOnly {
        fail: bool,
        pings: usize,
    }

    impl Transport for PingOnly {
        async fn recv(&mut self) -> Option<TransportResult<Frame>> {
            None
        }

        async fn ping(&mut self) -> TransportResult<()> {
            self.pings += 1;
            if self.fail {
                Err(TransportError::SendFailed("broken pipe".into()))
            } else {
                Ok(())
            }
        }

        async fn close(&mut self) -> TransportResult<()> {
            Ok(())
        }
    }

    fn btc() -> Symbol {
        Symbol::parse("BTCUSDT").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_full_period() {
        let metrics = Arc::new(MetricsCollector::new());
        let mut monitor = KeepAliveMonitor::start(btc(), Duration::from_secs(180), metrics);

        let started = Instant::now();
        monitor.tick().await;
        assert!(started.elapsed() >= Duration::from_secs(180));

        monitor.tick().await;
        assert!(started.elapsed() >= Duration::from_secs(360));
    }

    #[tokio::test]
    async fn test_probe_success() {
        let metrics = Arc::new(MetricsCollector::new());
        let mut monitor = KeepAliveMonitor::start(btc(), Duration::from_secs(180), metrics.clone());
        let mut transport = PingOnly { fail: false, pings: 0 };

        monitor.probe(&mut transport).await;
        monitor.probe(&mut transport).await;

        assert_eq!(transport.pings, 2);
        assert_eq!(monitor.probes_sent(), 2);
        assert_eq!(monitor.probe_failures(), 0);
        assert_eq!(metrics.snapshot().keepalive_probes, 2);
    }

    #[tokio::test]
    async fn test_probe_failure_is_counted_not_raised() {
        let metrics = Arc::new(MetricsCollector::new());
        let mut monitor = KeepAliveMonitor::start(btc(), Duration::from_secs(180), metrics.clone());
        let mut transport = PingOnly { fail: true, pings: 0 };

        monitor.probe(&mut transport).await;

        assert_eq!(monitor.probe_failures(), 1);
        assert_eq!(metrics.snapshot().probe_failures, 1);
    }

    #[tokio::test]
    async fn test_record_pong() {
        let metrics = Arc::new(MetricsCollector::new());
        let mut monitor = KeepAliveMonitor::start(btc(), Duration::from_secs(180), metrics);
        assert!(monitor.last_pong().is_none());

        monitor.record_pong();
        assert!(monitor.last_pong().is_some());
    }
}
