//! Consumer adapter over [`TransportClient`].
//!
//! Application code talks to this type rather than to the transport. The
//! adapter owns exactly one client for its lifetime, connects it on
//! construction (unless `auto_connect` is off), mirrors the connection
//! status on a fixed poll, and remembers the most recent error message so a
//! UI can show it without registering an error callback of its own.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use frames::{Outbound, PresenceStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::client::TransportClient;
use crate::config::{ClientConfig, ConfigError};
use crate::handlers::EventHandlers;
use crate::status::ConnectionStatus;

type LastError = Arc<Mutex<Option<String>>>;

#[derive(Debug)]
pub struct ChatAdapter {
    client: Option<TransportClient>,
    mirror: Arc<watch::Sender<ConnectionStatus>>,
    status: watch::Receiver<ConnectionStatus>,
    last_error: LastError,
    poller: JoinHandle<()>,
}

impl ChatAdapter {
    /// Build the transport around `handlers` and connect unless
    /// `config.auto_connect` is false.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` fails [`ClientConfig::validate`].
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(config: ClientConfig, handlers: EventHandlers) -> Result<Self, ConfigError> {
        let last_error: LastError = Arc::new(Mutex::new(None));
        let recorder = Arc::clone(&last_error);
        let clearer = Arc::clone(&last_error);
        let handlers = handlers
            .observe_errors(move |err| {
                *recorder.lock().unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
            })
            .observe_status(move |status| {
                if *status == ConnectionStatus::Connected {
                    *clearer.lock().unwrap_or_else(PoisonError::into_inner) = None;
                }
            });

        let poll_every = config.status_poll_interval;
        let auto_connect = config.auto_connect;
        let client = TransportClient::new(config, handlers)?;
        if auto_connect {
            client.connect();
        }

        let (mirror, status) = watch::channel(client.status());
        let mirror = Arc::new(mirror);
        let poller = tokio::spawn(poll_status(client.subscribe(), Arc::clone(&mirror), poll_every));
        Ok(Self { client: Some(client), mirror, status, last_error, poller })
    }

    /// Status as of the most recent poll.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Receiver updated on every poll that observes a different status.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Most recent error message, cleared whenever the transport reaches
    /// `connected`, even between two polls.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn connect(&self) {
        if let Some(client) = &self.client {
            client.connect();
        }
    }

    pub fn disconnect(&self) {
        if let Some(client) = &self.client {
            client.disconnect();
        }
    }

    pub fn send(&self, message: Outbound) {
        if let Some(client) = &self.client {
            client.send(message);
        }
    }

    pub fn send_message(&self, conversation_id: impl Into<String>, content: impl Into<String>) {
        if let Some(client) = &self.client {
            client.send_message(conversation_id, content);
        }
    }

    pub fn send_typing(&self, conversation_id: impl Into<String>, is_typing: bool) {
        if let Some(client) = &self.client {
            client.send_typing(conversation_id, is_typing);
        }
    }

    pub fn mark_as_read(&self, conversation_id: impl Into<String>, message_id: impl Into<String>) {
        if let Some(client) = &self.client {
            client.mark_as_read(conversation_id, message_id);
        }
    }

    pub fn request_sync(&self, conversation_id: impl Into<String>, last_message_id: Option<String>) {
        if let Some(client) = &self.client {
            client.request_sync(conversation_id, last_message_id);
        }
    }

    pub fn update_presence(&self, status: PresenceStatus) {
        if let Some(client) = &self.client {
            client.update_presence(status);
        }
    }

    pub fn join_conversation(&self, conversation_id: impl Into<String>) {
        if let Some(client) = &self.client {
            client.join_conversation(conversation_id);
        }
    }

    pub fn leave_conversation(&self, conversation_id: impl Into<String>) {
        if let Some(client) = &self.client {
            client.leave_conversation(conversation_id);
        }
    }

    /// Disconnect and release the transport. Later calls do nothing.
    pub fn close(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        client.disconnect();
        self.poller.abort();
        self.mirror.send_replace(ConnectionStatus::Disconnected);
        info!("adapter: transport released");
    }

    /// Like [`ChatAdapter::close`], but waits for the transport to finish
    /// writing and exit.
    pub async fn shutdown(mut self) {
        self.poller.abort();
        self.mirror.send_replace(ConnectionStatus::Disconnected);
        if let Some(client) = self.client.take() {
            client.shutdown().await;
            info!("adapter: transport shut down");
        }
    }
}

impl Drop for ChatAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

async fn poll_status(
    source: watch::Receiver<ConnectionStatus>,
    mirror: Arc<watch::Sender<ConnectionStatus>>,
    every: Duration,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let current = *source.borrow();
        let previous = *mirror.borrow();
        if previous != current {
            debug!(from = %previous, to = %current, "adapter: status polled");
            mirror.send_replace(current);
        }
    }
}

#[cfg(test)]
#[path = "adapter_test.rs"]
mod tests;
