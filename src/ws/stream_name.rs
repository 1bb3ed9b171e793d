//! Stream name construction
//!
//! Maps (symbol, market, kind) to the wire stream identifier and joins a
//! subscription's streams into a combined-stream path. Pure, no state.

use crate::core::{MarketType, StreamKind, Symbol};
use crate::Result;

/// Separator between the symbol and the kind token, and inside compound tokens
pub const STREAM_DELIMITER: char = '@';

/// Separator between streams in a combined-stream path
pub const PATH_SEPARATOR: char = '/';

/// Builds wire stream names and connection targets
pub struct StreamNameBuilder;

impl StreamNameBuilder {
    /// Kind token as sent on the wire for a market
    ///
    /// Futures `markPrice` and `openInterest` use the fixed 1s cadence.
    /// `forceOrder` and every other kind are unmodified.
    #[inline]
    pub fn kind_token(market: MarketType, kind: StreamKind) -> &'static str {
        match (market, kind) {
            (MarketType::Futures, StreamKind::MarkPrice) => "markPrice@1s",
            (MarketType::Futures, StreamKind::OpenInterest) => "openInterest@1s",
            _ => kind.as_str(),
        }
    }

    /// `<lowercased-symbol>@<token>`, e.g. `ethusdt@markPrice@1s`
    pub fn stream_name(symbol: &Symbol, market: MarketType, kind: StreamKind) -> String {
        let token = Self::kind_token(market, kind);
        let mut name = String::with_capacity(symbol.wire().len() + 1 + token.len());
        name.push_str(symbol.wire());
        name.push(STREAM_DELIMITER);
        name.push_str(token);
        name
    }

    /// Same as [`stream_name`](Self::stream_name) for a kind given as text
    ///
    /// # Errors
    /// `UnsupportedStreamKind` if `kind` is not one of the known tokens.
    pub fn stream_name_for(symbol: &Symbol, market: MarketType, kind: &str) -> Result<String> {
        let kind: StreamKind = kind.parse()?;
        Ok(Self::stream_name(symbol, market, kind))
    }

    /// Streams joined by `/`, e.g. `btcusdt@trade/btcusdt@ticker`
    pub fn combined_path(symbol: &Symbol, market: MarketType, kinds: &[StreamKind]) -> String {
        let mut path = String::new();
        for (i, kind) in kinds.iter().enumerate() {
            if i > 0 {
                path.push(PATH_SEPARATOR);
            }
            path.push_str(&Self::stream_name(symbol, market, *kind));
        }
        path
    }

    /// Full connection target: market endpoint followed by the combined path
    pub fn connection_url(
        endpoint: &str,
        symbol: &Symbol,
        market: MarketType,
        kinds: &[StreamKind],
    ) -> String {
        let mut url = endpoint.to_string();
        url.push_str(&Self::combined_path(symbol, market, kinds));
        url
    }
}
