//! Per-kind event callbacks.
//!
//! The handler set is built once, handed to the transport, and never changed
//! afterwards. Every slot is optional: a frame whose kind has no handler is
//! dropped after a debug log.

use std::sync::Arc;

use frames::{
    ChatMessage, Inbound, InboundKind, MessageAck, PresenceEvent, ReadReceipt, SessionInfo, SyncBatch, Timestamp,
    TypingEvent,
};
use tracing::debug;

use crate::error::ClientError;
use crate::status::ConnectionStatus;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Immutable dispatch table from event kind to callback.
#[derive(Clone, Default)]
pub struct EventHandlers {
    connected: Option<Callback<SessionInfo>>,
    message: Option<Callback<ChatMessage>>,
    message_sent: Option<Callback<MessageAck>>,
    typing: Option<Callback<TypingEvent>>,
    read: Option<Callback<ReadReceipt>>,
    presence: Option<Callback<PresenceEvent>>,
    sync_data: Option<Callback<SyncBatch>>,
    pong: Option<Callback<Timestamp>>,
    error: Option<Callback<ClientError>>,
    status: Option<Callback<ConnectionStatus>>,
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlers")
            .field("connected", &self.connected.is_some())
            .field("message", &self.message.is_some())
            .field("message_sent", &self.message_sent.is_some())
            .field("typing", &self.typing.is_some())
            .field("read", &self.read.is_some())
            .field("presence", &self.presence.is_some())
            .field("sync_data", &self.sync_data.is_some())
            .field("pong", &self.pong.is_some())
            .field("error", &self.error.is_some())
            .field("status", &self.status.is_some())
            .finish()
    }
}

impl EventHandlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Server welcome (`connected` frame).
    #[must_use]
    pub fn on_connected(mut self, f: impl Fn(&SessionInfo) + Send + Sync + 'static) -> Self {
        self.connected = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_message(mut self, f: impl Fn(&ChatMessage) + Send + Sync + 'static) -> Self {
        self.message = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_message_sent(mut self, f: impl Fn(&MessageAck) + Send + Sync + 'static) -> Self {
        self.message_sent = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_typing(mut self, f: impl Fn(&TypingEvent) + Send + Sync + 'static) -> Self {
        self.typing = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_read(mut self, f: impl Fn(&ReadReceipt) + Send + Sync + 'static) -> Self {
        self.read = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_presence(mut self, f: impl Fn(&PresenceEvent) + Send + Sync + 'static) -> Self {
        self.presence = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_sync_data(mut self, f: impl Fn(&SyncBatch) + Send + Sync + 'static) -> Self {
        self.sync_data = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_pong(mut self, f: impl Fn(&Timestamp) + Send + Sync + 'static) -> Self {
        self.pong = Some(Arc::new(f));
        self
    }

    /// Transport failures, server `error` frames, and reconnect exhaustion.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&ClientError) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    /// Every lifecycle transition, pushed as it happens.
    #[must_use]
    pub fn on_status(mut self, f: impl Fn(&ConnectionStatus) + Send + Sync + 'static) -> Self {
        self.status = Some(Arc::new(f));
        self
    }

    /// Chain `f` in front of whatever error handler is already registered.
    #[must_use]
    pub(crate) fn observe_errors(mut self, f: impl Fn(&ClientError) + Send + Sync + 'static) -> Self {
        let user = self.error.take();
        self.error = Some(Arc::new(move |err: &ClientError| {
            f(err);
            if let Some(user) = &user {
                user(err);
            }
        }));
        self
    }

    /// Chain `f` in front of whatever status handler is already registered.
    #[must_use]
    pub(crate) fn observe_status(mut self, f: impl Fn(&ConnectionStatus) + Send + Sync + 'static) -> Self {
        let user = self.status.take();
        self.status = Some(Arc::new(move |status: &ConnectionStatus| {
            f(status);
            if let Some(user) = &user {
                user(status);
            }
        }));
        self
    }

    /// Whether a callback is registered for inbound frames of `kind`.
    #[must_use]
    pub fn handles(&self, kind: InboundKind) -> bool {
        match kind {
            InboundKind::Connected => self.connected.is_some(),
            InboundKind::Message => self.message.is_some(),
            InboundKind::MessageSent => self.message_sent.is_some(),
            InboundKind::Typing => self.typing.is_some(),
            InboundKind::Read => self.read.is_some(),
            InboundKind::Presence => self.presence.is_some(),
            InboundKind::SyncData => self.sync_data.is_some(),
            InboundKind::Pong => self.pong.is_some(),
            InboundKind::Error => self.error.is_some(),
        }
    }

    /// Invoke the callback matching `frame`'s kind.
    ///
    /// Returns `false` when no callback is registered for that kind.
    pub fn dispatch(&self, frame: &Inbound) -> bool {
        let handled = match frame {
            Inbound::Connected(info) => call(self.connected.as_ref(), info),
            Inbound::Message(envelope) => call(self.message.as_ref(), &envelope.message),
            Inbound::MessageSent(ack) => call(self.message_sent.as_ref(), ack),
            Inbound::Typing(event) => call(self.typing.as_ref(), event),
            Inbound::Read(receipt) => call(self.read.as_ref(), receipt),
            Inbound::Presence(event) => call(self.presence.as_ref(), event),
            Inbound::SyncData(batch) => call(self.sync_data.as_ref(), batch),
            Inbound::Pong(pong) => call(self.pong.as_ref(), &pong.timestamp),
            Inbound::Error(err) => call(self.error.as_ref(), &ClientError::from(err.clone())),
        };
        if !handled {
            debug!(kind = frame.kind().as_str(), "ws: no handler registered; frame dropped");
        }
        handled
    }

    pub fn error(&self, err: &ClientError) {
        call(self.error.as_ref(), err);
    }

    pub fn status(&self, status: ConnectionStatus) {
        call(self.status.as_ref(), &status);
    }
}

fn call<T>(callback: Option<&Callback<T>>, value: &T) -> bool {
    let Some(callback) = callback else {
        return false;
    };
    callback(value);
    true
}

#[cfg(test)]
#[path = "handlers_test.rs"]
mod tests;
