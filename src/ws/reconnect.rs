//! Reconnect backoff and timers
//!
//! Delay for attempt n (1-based) is `base * 2^(n-1)`. Once the attempt
//! counter reaches the maximum no further timer is armed. Each armed timer
//! carries an id so a firing that raced with cancellation is ignored.

use crate::core::Symbol;
use crate::infrastructure::config::StreamConfig;
use crate::ws::lifecycle::LifecycleEvent;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Outcome of asking for the next reconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Arm a timer; `attempt` is the new counter value
    Retry { attempt: u32, delay: Duration },
    /// Counter is at the maximum
    Exhausted { attempts: u32 },
}

/// A pending reconnect timer. Dropping it cancels the timer.
#[derive(Debug)]
pub struct PendingReconnect {
    id: u64,
    delay: Duration,
    handle: JoinHandle<()>,
}

impl PendingReconnect {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for PendingReconnect {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Computes backoff and arms per-symbol reconnect timers
#[derive(Debug)]
pub struct ReconnectScheduler {
    base_delay: Duration,
    max_attempts: u32,
    next_timer_id: u64,
}

impl ReconnectScheduler {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
            next_timer_id: 0,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(config.base_reconnect_delay(), config.max_reconnect_attempts)
    }

    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt given `attempts` already made
    #[inline]
    pub fn delay_for(&self, attempts: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempts))
    }

    /// Decide the next step for a subscription with `attempts` made so far
    pub fn next(&self, attempts: u32) -> ReconnectDecision {
        if attempts >= self.max_attempts {
            return ReconnectDecision::Exhausted { attempts };
        }
        ReconnectDecision::Retry {
            attempt: attempts + 1,
            delay: self.delay_for(attempts),
        }
    }

    /// Arm a timer that emits `ReconnectDue` for `symbol` after `delay`
    pub fn arm(
        &mut self,
        symbol: Symbol,
        delay: Duration,
        events: &UnboundedSender<LifecycleEvent>,
    ) -> PendingReconnect {
        let id = self.next_timer_id;
        self.next_timer_id += 1;

        let events = events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the manager shut down
            let _ = events.send(LifecycleEvent::ReconnectDue { symbol, timer_id: id });
        });

        PendingReconnect { id, delay, handle }
    }
}
