//! Normalized trading pair symbols
//!
//! Symbols are case-insensitive on input. The upper-case form is used for
//! display and as the map key; the lower-case form is what goes on the wire.

use crate::{Result, StreamError};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol {
    display: Box<str>,
    wire: Box<str>,
}

impl Symbol {
    /// Parse and normalize a raw symbol such as `btcusdt` or ` BTCUSDT `
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(StreamError::InvalidSymbol(raw.to_string()));
        }

        Ok(Self {
            display: trimmed.to_ascii_uppercase().into_boxed_str(),
            wire: trimmed.to_ascii_lowercase().into_boxed_str(),
        })
    }

    /// Upper-case form, e.g. `BTCUSDT`
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Lower-case form used in stream names, e.g. `btcusdt`
    #[inline]
    pub fn wire(&self) -> &str {
        &self.wire
    }
}

impl FromStr for Symbol {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive() {
        let a = Symbol::parse("btcusdt").unwrap();
        let b = Symbol::parse("BTCUSDT").unwrap();
        let c = Symbol::parse("BtcUsdt").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_display_and_wire_forms() {
        let sym = Symbol::parse(" ethUSDT ").unwrap();
        assert_eq!(sym.as_str(), "ETHUSDT");
        assert_eq!(sym.wire(), "ethusdt");
        assert_eq!(sym.to_string(), "ETHUSDT");
    }

    #[test]
    fn test_invalid_symbol() {
        assert!(matches!(Symbol::parse(""), Err(StreamError::InvalidSymbol(_))));
        assert!(matches!(Symbol::parse("   "), Err(StreamError::InvalidSymbol(_))));
        assert!(matches!(Symbol::parse("btc@usdt"), Err(StreamError::InvalidSymbol(_))));
        assert!(matches!(Symbol::parse("btc/usdt"), Err(StreamError::InvalidSymbol(_))));
    }

    #[test]
    fn test_from_str() {
        let sym: Symbol = "1000pepeusdt".parse().unwrap();
        assert_eq!(sym.as_str(), "1000PEPEUSDT");
    }
}
