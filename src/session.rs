//! Connection protocol state machine.
//!
//! DESIGN
//! ======
//! `Session` holds every rule of the transport: lifecycle transitions, the
//! reconnect counter, keep-alive accounting and the outbound queue. It never
//! touches a socket or a clock. Each event method returns the [`Action`]s the
//! driver must perform, in order, and the driver feeds the outcome of I/O
//! back in as further events.
//!
//! TRANSITIONS
//! ===========
//! ```text
//! disconnected --connect--------------------> connecting
//! connecting   --open-----------------------> connected     (counter reset, keep-alive, flush)
//! connecting   --open failed----------------> reconnecting  (or error once exhausted)
//! connected    --close, not intentional-----> reconnecting  (or error once exhausted)
//! connected    --keep-alive timeout---------> reconnecting  (same as close)
//! reconnecting --timer fired----------------> connecting    (counter incremented first)
//! reconnecting --timer fired, counter = max-> error
//! any          --disconnect-----------------> disconnected
//! ```
//!
//! Only one reconnect timer is ever pending. It is cancelled before an
//! explicit connect and before a disconnect.

use std::time::Duration;

use frames::{FrameError, Inbound, Outbound};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::queue::{OutboundQueue, QueuedMessage};
use crate::status::ConnectionStatus;

/// Side effect requested by the session. The driver performs these in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open a new physical connection to `url`.
    Open { url: String },
    /// Close the physical connection, if any.
    Close,
    /// Write one frame to the open connection.
    Transmit(QueuedMessage),
    /// Arm the reconnect timer.
    ScheduleReconnect { delay: Duration },
    CancelReconnect,
    /// Start the periodic keep-alive timer.
    StartKeepAlive { every: Duration },
    StopKeepAlive,
    /// Publish a status transition.
    Status(ConnectionStatus),
    /// Deliver an error to the error callback.
    Report(ClientError),
}

#[derive(Debug)]
pub struct Session {
    config: ClientConfig,
    status: ConnectionStatus,
    attempts: u32,
    queue: OutboundQueue,
    intentional_close: bool,
    unanswered_pings: u32,
    reconnect_pending: bool,
}

impl Session {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let queue = OutboundQueue::new(config.queue_capacity);
        Self {
            config,
            status: ConnectionStatus::Disconnected,
            attempts: 0,
            queue,
            intentional_close: false,
            unanswered_pings: 0,
            reconnect_pending: false,
        }
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Reconnect attempts since the last successful open.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // =========================================================================
    // Caller commands
    // =========================================================================

    /// Open a connection unless one is open or already being opened.
    pub fn connect(&mut self) -> Vec<Action> {
        if matches!(self.status, ConnectionStatus::Connected | ConnectionStatus::Connecting) {
            debug!(status = %self.status, "ws: connect ignored");
            return Vec::new();
        }
        self.intentional_close = false;
        let mut actions = Vec::new();
        self.cancel_reconnect(&mut actions);
        self.transition(ConnectionStatus::Connecting, &mut actions);
        actions.push(Action::Open { url: self.config.connection_url() });
        actions
    }

    /// Close intentionally and stop every timer. No-op when already idle.
    pub fn disconnect(&mut self) -> Vec<Action> {
        self.intentional_close = true;
        if self.status == ConnectionStatus::Disconnected && !self.reconnect_pending {
            return Vec::new();
        }
        let mut actions = Vec::new();
        self.cancel_reconnect(&mut actions);
        actions.push(Action::StopKeepAlive);
        actions.push(Action::Close);
        self.unanswered_pings = 0;
        self.transition(ConnectionStatus::Disconnected, &mut actions);
        actions
    }

    /// Transmit `message` now if connected, otherwise queue it for the next open.
    pub fn send(&mut self, message: Outbound) -> Vec<Action> {
        if self.status == ConnectionStatus::Connected {
            return vec![Action::Transmit(QueuedMessage::new(message))];
        }
        if message.is_keep_alive() {
            debug!(status = %self.status, "ws: ping dropped while not connected");
            return Vec::new();
        }
        self.enqueue(QueuedMessage::new(message));
        Vec::new()
    }

    // =========================================================================
    // Connection events
    // =========================================================================

    pub fn on_open(&mut self) -> Vec<Action> {
        if self.status != ConnectionStatus::Connecting {
            return Vec::new();
        }
        let mut actions = Vec::new();
        self.attempts = 0;
        self.unanswered_pings = 0;
        self.transition(ConnectionStatus::Connected, &mut actions);
        if !self.config.ping_interval.is_zero() {
            actions.push(Action::StartKeepAlive { every: self.config.ping_interval });
        }
        let pending = self.queue.drain();
        if !pending.is_empty() {
            info!(count = pending.len(), "ws: flushing queued messages");
        }
        actions.extend(pending.into_iter().map(Action::Transmit));
        actions
    }

    /// The connection could not be established.
    pub fn on_open_failed(&mut self, reason: &str) -> Vec<Action> {
        if self.status != ConnectionStatus::Connecting {
            return Vec::new();
        }
        warn!(%reason, attempts = self.attempts, "ws: open failed");
        let mut actions = vec![Action::Report(ClientError::Transport(reason.to_owned()))];
        self.connection_lost(&mut actions);
        actions
    }

    /// The open connection closed without being asked to.
    pub fn on_close(&mut self) -> Vec<Action> {
        if self.intentional_close || self.status != ConnectionStatus::Connected {
            return Vec::new();
        }
        info!("ws: connection closed by peer");
        let mut actions = vec![Action::StopKeepAlive];
        self.unanswered_pings = 0;
        self.connection_lost(&mut actions);
        actions
    }

    pub fn on_reconnect_timer(&mut self) -> Vec<Action> {
        if !self.reconnect_pending {
            return Vec::new();
        }
        self.reconnect_pending = false;
        self.attempts = self.attempts.saturating_add(1);

        let mut actions = Vec::new();
        if self.attempts >= self.config.max_reconnect_attempts {
            self.give_up(&mut actions);
            return actions;
        }
        info!(attempt = self.attempts, "ws: reconnecting");
        self.transition(ConnectionStatus::Connecting, &mut actions);
        actions.push(Action::Open { url: self.config.connection_url() });
        actions
    }

    /// Keep-alive period elapsed: ping, or drop a connection that stopped answering.
    pub fn on_keepalive_tick(&mut self) -> Vec<Action> {
        if self.status != ConnectionStatus::Connected {
            return Vec::new();
        }
        let limit = self.config.max_missed_pongs;
        if limit > 0 && self.unanswered_pings >= limit {
            warn!(missed = self.unanswered_pings, "ws: keep-alive timed out");
            let mut actions = vec![
                Action::Report(ClientError::KeepAliveTimeout { missed: self.unanswered_pings }),
                Action::StopKeepAlive,
                Action::Close,
            ];
            self.unanswered_pings = 0;
            self.connection_lost(&mut actions);
            return actions;
        }
        self.unanswered_pings += 1;
        vec![Action::Transmit(QueuedMessage::new(Outbound::Ping))]
    }

    /// Writing a [`Action::Transmit`] to the socket failed. Counts against the
    /// entry's retry cap.
    pub fn on_transmit_failed(&mut self, mut entry: QueuedMessage, reason: &str) -> Vec<Action> {
        if entry.message.is_keep_alive() {
            debug!(%reason, "ws: ping not sent");
            return Vec::new();
        }
        entry.attempts += 1;
        if entry.attempts > self.config.max_send_retries {
            warn!(
                id = %entry.id,
                kind = entry.message.kind(),
                attempts = entry.attempts,
                %reason,
                "ws: send retries exhausted; message dropped"
            );
            return Vec::new();
        }
        debug!(id = %entry.id, attempts = entry.attempts, %reason, "ws: send failed; requeued");
        self.enqueue(entry);
        Vec::new()
    }

    /// A [`Action::Transmit`] reached the driver after the connection was
    /// already gone, so nothing was written. The entry goes back to the queue
    /// with its retry count untouched.
    pub fn on_transmit_skipped(&mut self, entry: QueuedMessage) -> Vec<Action> {
        if entry.message.is_keep_alive() {
            return Vec::new();
        }
        debug!(id = %entry.id, attempts = entry.attempts, "ws: connection gone before send; requeued");
        self.enqueue(entry);
        Vec::new()
    }

    /// Decode one inbound text frame.
    ///
    /// Returns `None` for frames that must not be dispatched: unknown kinds
    /// and malformed payloads are logged and dropped.
    pub fn on_frame(&mut self, text: &str) -> Option<Inbound> {
        match frames::decode_inbound(text) {
            Ok(frame) => {
                if matches!(frame, Inbound::Pong(_)) {
                    self.unanswered_pings = 0;
                }
                debug!(kind = frame.kind().as_str(), "ws: frame received");
                Some(frame)
            }
            Err(FrameError::UnknownKind(kind)) => {
                warn!(%kind, "ws: unknown frame kind ignored");
                None
            }
            Err(err) => {
                warn!(error = %err, "ws: malformed frame dropped");
                None
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn connection_lost(&mut self, actions: &mut Vec<Action>) {
        if self.attempts >= self.config.max_reconnect_attempts {
            self.give_up(actions);
            return;
        }
        let delay = self.config.reconnect_delay(self.attempts);
        self.transition(ConnectionStatus::Reconnecting, actions);
        self.reconnect_pending = true;
        info!(attempt = self.attempts, delay_ms = delay.as_millis(), "ws: reconnect scheduled");
        actions.push(Action::ScheduleReconnect { delay });
    }

    fn give_up(&mut self, actions: &mut Vec<Action>) {
        warn!(attempts = self.attempts, "ws: reconnect attempts exhausted");
        actions.push(Action::Report(ClientError::ReconnectExhausted { attempts: self.attempts }));
        self.transition(ConnectionStatus::Error, actions);
    }

    fn cancel_reconnect(&mut self, actions: &mut Vec<Action>) {
        if self.reconnect_pending {
            self.reconnect_pending = false;
            actions.push(Action::CancelReconnect);
        }
    }

    fn enqueue(&mut self, entry: QueuedMessage) {
        if let Some(evicted) = self.queue.push(entry) {
            warn!(
                id = %evicted.id,
                kind = evicted.message.kind(),
                capacity = self.queue.capacity(),
                "ws: outbound queue full; oldest message evicted"
            );
        }
    }

    fn transition(&mut self, next: ConnectionStatus, actions: &mut Vec<Action>) {
        if self.status == next {
            return;
        }
        info!(from = %self.status, to = %next, "ws: status changed");
        self.status = next;
        actions.push(Action::Status(next));
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
