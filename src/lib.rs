//! Resilient realtime chat client.
//!
//! ARCHITECTURE
//! ============
//! Two layers, consumer on top of transport:
//!
//! - [`TransportClient`] owns one physical WebSocket, its lifecycle,
//!   reconnection with exponential backoff, keep-alive pings and the bounded
//!   outbound queue that is replayed after every reconnect.
//! - [`ChatAdapter`] wraps the transport for application code: it builds the
//!   handler set, connects on construction, mirrors the connection status on
//!   a short poll and remembers the most recent error.
//!
//! The protocol rules live in [`session::Session`], a synchronous state
//! machine that returns [`session::Action`]s. The transport's driver task is
//! the only place that performs I/O or arms timers.

pub mod adapter;
pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod queue;
pub mod session;
pub mod status;

pub use adapter::ChatAdapter;
pub use client::TransportClient;
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use handlers::EventHandlers;
pub use status::ConnectionStatus;

pub use frames::{
    ChatMessage, Inbound, InboundKind, MessageAck, Outbound, PresenceEvent, PresenceStatus, ReadReceipt,
    ServerError, SessionInfo, SyncBatch, Timestamp, TypingEvent,
};
