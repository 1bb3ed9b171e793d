//! Market types and stream kinds
//!
//! `StreamKind` covers every feed the manager knows how to name and route.
//! `forceOrder`, `markPrice` and `openInterest` only make sense on futures, but
//! nothing here rejects them for spot.

use crate::{Result, StreamError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Market selecting the streaming endpoint and stream-name suffixes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Spot,
    Futures,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Spot => "spot",
            MarketType::Futures => "futures",
        }
    }
}

impl FromStr for MarketType {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spot" => Ok(MarketType::Spot),
            "futures" => Ok(MarketType::Futures),
            _ => Err(StreamError::InvalidMarketType(s.to_string())),
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical data feed carried on a combined stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamKind {
    Trade,
    Ticker,
    BookTicker,
    Kline,
    Depth,
    ForceOrder,
    MarkPrice,
    OpenInterest,
}

impl StreamKind {
    pub const ALL: [StreamKind; 8] = [
        StreamKind::Trade,
        StreamKind::Ticker,
        StreamKind::BookTicker,
        StreamKind::Kline,
        StreamKind::Depth,
        StreamKind::ForceOrder,
        StreamKind::MarkPrice,
        StreamKind::OpenInterest,
    ];

    /// Wire token without any market suffix
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Trade => "trade",
            StreamKind::Ticker => "ticker",
            StreamKind::BookTicker => "bookTicker",
            StreamKind::Kline => "kline",
            StreamKind::Depth => "depth",
            StreamKind::ForceOrder => "forceOrder",
            StreamKind::MarkPrice => "markPrice",
            StreamKind::OpenInterest => "openInterest",
        }
    }

    pub fn is_futures_only(&self) -> bool {
        matches!(
            self,
            StreamKind::ForceOrder | StreamKind::MarkPrice | StreamKind::OpenInterest
        )
    }
}

impl FromStr for StreamKind {
    type Err = StreamError;

    /// Exact, case-sensitive match against the wire tokens
    fn from_str(s: &str) -> Result<Self> {
        StreamKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| StreamError::UnsupportedStreamKind(s.to_string()))
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
