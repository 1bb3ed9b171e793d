//! REST clients for market data snapshots

pub mod client;

pub use client::{MarketDataSource, RestClient, UpstreamRequestError};
