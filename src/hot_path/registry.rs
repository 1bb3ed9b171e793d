//! Handler registry
//!
//! symbol -> stream kind -> ordered handlers. Append-only per kind; entries
//! survive reconnects and are removed only when the symbol is unsubscribed.

use crate::core::{StreamKind, Symbol};
use crate::hot_path::routing::StreamMessage;
use std::collections::HashMap;
use std::sync::Arc;

/// Error a consumer callback may return
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of a consumer callback
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Registered consumer callback
pub type StreamHandler = Arc<dyn Fn(&StreamMessage) -> HandlerResult + Send + Sync>;

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Symbol, HashMap<StreamKind, Vec<StreamHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for (symbol, kind)
    pub fn register(&mut self, symbol: Symbol, kind: StreamKind, handler: StreamHandler) {
        self.handlers
            .entry(symbol)
            .or_default()
            .entry(kind)
            .or_default()
            .push(handler);
    }

    /// Handlers for (symbol, kind) in registration order
    #[inline]
    pub fn handlers_for(&self, symbol: &Symbol, kind: StreamKind) -> &[StreamHandler] {
        self.handlers
            .get(symbol)
            .and_then(|by_kind| by_kind.get(&kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Drop every handler for a symbol, returns how many were removed
    pub fn remove_symbol(&mut self, symbol: &Symbol) -> usize {
        self.handlers
            .remove(symbol)
            .map(|by_kind| by_kind.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn handler_count(&self, symbol: &Symbol) -> usize {
        self.handlers
            .get(symbol)
            .map(|by_kind| by_kind.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
