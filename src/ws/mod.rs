//! WebSocket streams for real-time market data

pub mod connection;
pub mod lifecycle;
pub mod ping;
pub mod reconnect;
pub mod stream_name;
pub mod subscription;

pub use connection::{Connector, Frame, Transport, TransportError, TungsteniteConnector, WebSocketConnection};
pub use lifecycle::{ConnectionLifecycle, ConnectionState, LifecycleEvent};
pub use ping::KeepAliveMonitor;
pub use reconnect::{PendingReconnect, ReconnectDecision, ReconnectScheduler};
pub use stream_name::StreamNameBuilder;
pub use subscription::{Subscription, SubscriptionManager};
