//! Errors surfaced through the error callback.
//!
//! None of these are ever returned from a public transport operation; they
//! are delivered asynchronously to [`crate::EventHandlers`] and recorded by
//! the adapter as its last error.

use frames::ServerError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The physical connection failed to open, broke, or could not send.
    #[error("transport error: {0}")]
    Transport(String),
    /// The server sent an `error` frame. The connection stays open.
    #[error("server error [{code}]: {message}")]
    Server { message: String, code: String },
    /// Automatic reconnection stopped after the configured number of attempts.
    #[error("gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
    /// Keep-alive pings went unanswered and the connection was dropped.
    #[error("keep-alive timed out after {missed} unanswered pings")]
    KeepAliveTimeout { missed: u32 },
}

impl From<ServerError> for ClientError {
    fn from(err: ServerError) -> Self {
        Self::Server { message: err.error, code: err.code }
    }
}
