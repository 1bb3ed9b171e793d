//! Per-message path: handler lookup and dispatch

pub mod registry;
pub mod routing;

pub use registry::{HandlerError, HandlerRegistry, HandlerResult, StreamHandler};
pub use routing::{MessageRouter, RouteOutcome, StreamMessage};
