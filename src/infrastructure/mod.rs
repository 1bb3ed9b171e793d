//! Infrastructure - cold path only
//!
//! This module contains code outside the per-message path:
//! - Logging and metrics
//! - Configuration management

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{Config, ConfigError, RestConfig, StreamConfig, SubscriptionConfig};
pub use logging::init_logging;
pub use metrics::{MetricsCollector, MetricsSnapshot};
