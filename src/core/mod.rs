//! Core domain values
//!
//! This module contains the fundamental types used throughout the system:
//! - Symbol: normalized trading pair (upper-case display, lower-case wire)
//! - MarketType: spot or futures, selects endpoint and stream suffixes
//! - StreamKind: the supported logical feeds

pub mod market;
pub mod symbol;

pub use market::{MarketType, StreamKind};
pub use symbol::Symbol;
