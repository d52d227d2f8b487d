//! Transport client: one resilient WebSocket connection.
//!
//! ARCHITECTURE
//! ============
//! [`TransportClient`] is a cheap handle. Every operation posts a command to
//! a driver task over an unbounded channel and returns immediately, so no
//! public operation can fail or block. The driver owns the socket, the
//! reconnect timer and the keep-alive interval, and runs a `select!` loop
//! over:
//!
//! - caller commands
//! - the in-flight connection attempt
//! - inbound socket messages
//! - the reconnect timer
//! - the keep-alive interval
//!
//! Each event is handed to the [`Session`] state machine and the resulting
//! actions are applied in order. Handlers run inside the driver task, so
//! inbound frames are dispatched strictly in delivery order.
//!
//! Dropping the handle disconnects and stops the driver.

use std::collections::VecDeque;
use std::future::{Future, pending};
use std::pin::Pin;
use std::time::Duration;

use frames::{Outbound, PresenceStatus};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, ConfigError};
use crate::error::ClientError;
use crate::handlers::EventHandlers;
use crate::queue::QueuedMessage;
use crate::session::{Action, Session};
use crate::status::ConnectionStatus;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type OpenFuture = Pin<Box<dyn Future<Output = Result<WsStream, tungstenite::Error>> + Send>>;

/// Upper bound on the close handshake before the socket is simply dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
enum Command {
    Connect,
    Disconnect,
    Send(Outbound),
}

// =============================================================================
// HANDLE
// =============================================================================

/// Handle to a transport connection driven by a background task.
#[derive(Debug)]
pub struct TransportClient {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    driver: JoinHandle<()>,
}

impl TransportClient {
    /// Spawn the driver task. The client starts `disconnected`; call
    /// [`TransportClient::connect`] to open the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` fails [`ClientConfig::validate`].
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(config: ClientConfig, handlers: EventHandlers) -> Result<Self, ConfigError> {
        config.validate()?;
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let driver = Driver {
            session: Session::new(config),
            handlers,
            status: status_tx,
            commands: commands_rx,
            socket: None,
            opening: None,
            reconnect: None,
            keep_alive: None,
        };
        let driver = tokio::spawn(driver.run());
        Ok(Self { commands: commands_tx, status: status_rx, driver })
    }

    /// Open the connection. No-op while connected or connecting.
    pub fn connect(&self) {
        self.post(Command::Connect);
    }

    /// Close the connection and cancel every timer. No-op when disconnected.
    pub fn disconnect(&self) {
        self.post(Command::Disconnect);
    }

    /// Send `message` now if connected, otherwise queue it for the next open.
    pub fn send(&self, message: Outbound) {
        self.post(Command::Send(message));
    }

    pub fn send_message(&self, conversation_id: impl Into<String>, content: impl Into<String>) {
        self.send(Outbound::Message { conversation_id: conversation_id.into(), content: content.into() });
    }

    pub fn send_typing(&self, conversation_id: impl Into<String>, is_typing: bool) {
        self.send(Outbound::Typing { conversation_id: conversation_id.into(), is_typing });
    }

    pub fn mark_as_read(&self, conversation_id: impl Into<String>, message_id: impl Into<String>) {
        self.send(Outbound::Read { conversation_id: conversation_id.into(), message_id: message_id.into() });
    }

    /// Ask for the backlog after `last_message_id`, or the whole backlog when `None`.
    pub fn request_sync(&self, conversation_id: impl Into<String>, last_message_id: Option<String>) {
        self.send(Outbound::Sync { conversation_id: conversation_id.into(), last_message_id });
    }

    pub fn update_presence(&self, status: PresenceStatus) {
        self.send(Outbound::Presence { status });
    }

    pub fn join_conversation(&self, conversation_id: impl Into<String>) {
        self.send(Outbound::Join { conversation_id: conversation_id.into() });
    }

    pub fn leave_conversation(&self, conversation_id: impl Into<String>) {
        self.send(Outbound::Leave { conversation_id: conversation_id.into() });
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Receiver that observes every status transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Disconnect, then wait until the driver has flushed its last writes and
    /// exited.
    pub async fn shutdown(self) {
        let Self { commands, driver, .. } = self;
        if commands.send(Command::Disconnect).is_ok() {
            drop(commands);
            if let Err(err) = driver.await {
                warn!(error = %err, "ws: transport driver failed");
            }
        }
    }

    fn post(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("ws: transport driver stopped; command dropped");
        }
    }
}

// =============================================================================
// DRIVER
// =============================================================================

struct Driver {
    session: Session,
    handlers: EventHandlers,
    status: watch::Sender<ConnectionStatus>,
    commands: mpsc::UnboundedReceiver<Command>,
    socket: Option<WsStream>,
    opening: Option<OpenFuture>,
    reconnect: Option<Pin<Box<Sleep>>>,
    keep_alive: Option<Interval>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    let actions = match command {
                        Command::Connect => self.session.connect(),
                        Command::Disconnect => self.session.disconnect(),
                        Command::Send(message) => self.session.send(message),
                    };
                    self.apply(actions).await;
                }
                result = opened(&mut self.opening) => {
                    self.opening = None;
                    let actions = match result {
                        Ok(socket) => {
                            info!(url = %self.session.config().url, "ws: connected");
                            self.socket = Some(socket);
                            self.session.on_open()
                        }
                        Err(err) => self.session.on_open_failed(&err.to_string()),
                    };
                    self.apply(actions).await;
                }
                incoming = next_message(&mut self.socket) => self.on_incoming(incoming).await,
                () = elapsed(&mut self.reconnect) => {
                    self.reconnect = None;
                    let actions = self.session.on_reconnect_timer();
                    self.apply(actions).await;
                }
                () = ticked(&mut self.keep_alive) => {
                    let actions = self.session.on_keepalive_tick();
                    self.apply(actions).await;
                }
            }
        }

        let actions = self.session.disconnect();
        self.apply(actions).await;
        debug!("ws: transport driver stopped");
    }

    async fn on_incoming(&mut self, incoming: Option<Result<Message, tungstenite::Error>>) {
        match incoming {
            Some(Ok(Message::Text(text))) => {
                if let Some(frame) = self.session.on_frame(text.as_str()) {
                    self.handlers.dispatch(&frame);
                }
            }
            Some(Ok(Message::Binary(bytes))) => {
                debug!(len = bytes.len(), "ws: binary message ignored");
            }
            Some(Ok(Message::Close(frame))) => {
                info!(?frame, "ws: close frame received");
                self.connection_closed().await;
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                warn!(error = %err, "ws: read failed");
                self.handlers.error(&ClientError::Transport(err.to_string()));
                self.connection_closed().await;
            }
            None => self.connection_closed().await,
        }
    }

    async fn connection_closed(&mut self) {
        self.socket = None;
        let actions = self.session.on_close();
        self.apply(actions).await;
    }

    async fn apply(&mut self, actions: Vec<Action>) {
        let mut pending = VecDeque::from(actions);
        while let Some(action) = pending.pop_front() {
            match action {
                Action::Open { url } => self.open(url),
                Action::Close => self.close().await,
                Action::Transmit(entry) => pending.extend(self.transmit(entry).await),
                Action::ScheduleReconnect { delay } => {
                    self.reconnect = Some(Box::pin(tokio::time::sleep(delay)));
                }
                Action::CancelReconnect => self.reconnect = None,
                Action::StartKeepAlive { every } => {
                    let mut interval = tokio::time::interval_at(Instant::now() + every, every);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    self.keep_alive = Some(interval);
                }
                Action::StopKeepAlive => self.keep_alive = None,
                Action::Status(status) => {
                    self.handlers.status(status);
                    self.status.send_replace(status);
                }
                Action::Report(err) => self.handlers.error(&err),
            }
        }
    }

    fn open(&mut self, url: String) {
        self.socket = None;
        debug!(url = %self.session.config().url, "ws: opening connection");
        self.opening = Some(Box::pin(async move { connect_async(url).await.map(|(socket, _)| socket) }));
    }

    async fn close(&mut self) {
        self.opening = None;
        let Some(mut socket) = self.socket.take() else {
            return;
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, socket.close(None)).await {
            Ok(Ok(())) => debug!("ws: connection closed"),
            Ok(Err(err)) => debug!(error = %err, "ws: close handshake failed"),
            Err(_) => debug!("ws: close handshake timed out"),
        }
    }

    /// Write one frame. Returns the follow-up actions of a failed write.
    async fn transmit(&mut self, entry: QueuedMessage) -> Vec<Action> {
        let text = match frames::encode(&entry.message) {
            Ok(text) => text,
            Err(err) => {
                warn!(id = %entry.id, error = %err, "ws: frame encode failed; message dropped");
                return Vec::new();
            }
        };
        let Some(socket) = self.socket.as_mut() else {
            return self.session.on_transmit_skipped(entry);
        };
        if let Err(err) = socket.send(Message::Text(text.into())).await {
            let reason = err.to_string();
            warn!(id = %entry.id, error = %reason, "ws: write failed");
            self.socket = None;
            let mut actions = self.session.on_transmit_failed(entry, &reason);
            self.handlers.error(&ClientError::Transport(reason));
            actions.extend(self.session.on_close());
            return actions;
        }
        debug!(id = %entry.id, kind = entry.message.kind(), "ws: frame sent");
        Vec::new()
    }
}

async fn opened(opening: &mut Option<OpenFuture>) -> Result<WsStream, tungstenite::Error> {
    match opening {
        Some(fut) => fut.as_mut().await,
        None => pending().await,
    }
}

async fn next_message(socket: &mut Option<WsStream>) -> Option<Result<Message, tungstenite::Error>> {
    match socket {
        Some(socket) => socket.next().await,
        None => pending().await,
    }
}

async fn elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

async fn ticked(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
