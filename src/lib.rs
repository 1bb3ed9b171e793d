//! Real-time Binance market data over per-symbol combined streams
//!
//! Core library: stream naming, connection lifecycle with bounded reconnects,
//! keep-alive probing and handler dispatch.

pub mod core;
pub mod hot_path;
pub mod infrastructure;
pub mod rest;
pub mod ws;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use crate::core::{MarketType, StreamKind, Symbol};
pub use hot_path::{HandlerError, HandlerResult, StreamMessage};
pub use infrastructure::config::{Config, RestConfig, StreamConfig};
pub use rest::{MarketDataSource, RestClient, UpstreamRequestError};
pub use ws::{ConnectionState, SubscriptionManager, TransportError};

use thiserror::Error;

/// Main error type for the stream manager
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Unsupported stream kind: {0}")]
    UnsupportedStreamKind(String),

    #[error("Invalid stream kind: {0}")]
    InvalidStreamKind(String),

    #[error("Invalid market type: {0}")]
    InvalidMarketType(String),

    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("No stream kinds requested for {0}")]
    EmptyStreamSet(String),

    #[error("Unknown subscription: {0}")]
    UnknownSubscription(String),

    #[error("Subscription manager is closed")]
    ManagerClosed,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamRequestError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StreamError>;
