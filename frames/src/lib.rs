//! Shared frame model and JSON codec for the realtime chat transport.
//!
//! This crate owns the wire representation exchanged with the chat server.
//! Every frame is one JSON text message carrying a `type` discriminant;
//! outbound and inbound frames are separate enums because the two directions
//! share only a handful of kind names and never the same payload.
//!
//! DECODING
//! ========
//! Inbound decoding happens in two steps so callers can tell an unknown kind
//! (newer server, safe to ignore) from a malformed frame (bug, worth a warning):
//! the text is parsed as a JSON value, the discriminant is checked against
//! [`InboundKind`], and only then is the typed payload deserialized.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error returned by [`encode`] and [`decode_inbound`].
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The text is not valid JSON or the payload does not match its kind.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame is a JSON value without a string `type` field.
    #[error("frame has no `type` discriminant")]
    MissingKind,
    /// The `type` discriminant names a kind this client does not understand.
    #[error("unknown frame kind: {0}")]
    UnknownKind(String),
}

// =============================================================================
// SHARED TYPES
// =============================================================================

/// Presence status a user can publish or be reported in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Away,
    Offline,
}

impl PresenceStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Offline => "offline",
        }
    }
}

impl std::str::FromStr for PresenceStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "online" => Ok(Self::Online),
            "away" => Ok(Self::Away),
            "offline" => Ok(Self::Offline),
            other => Err(format!("invalid presence status `{other}` (expected online, away or offline)")),
        }
    }
}

/// Server timestamp. Servers send either an ISO-8601 string or epoch millis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Text(String),
}

/// A persisted chat message as relayed by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub content: String,
    /// Author role, e.g. `"user"`, `"agent"` or `"assistant"`.
    pub role: String,
    pub created_at: Timestamp,
}

// =============================================================================
// OUTBOUND (CLIENT → SERVER)
// =============================================================================

/// A frame sent from the client to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Post a chat message into a conversation.
    Message { conversation_id: String, content: String },
    /// Start or stop the typing indicator.
    Typing { conversation_id: String, is_typing: bool },
    /// Mark a message (and everything before it) as read.
    Read { conversation_id: String, message_id: String },
    /// Request the backlog after `last_message_id`, or the full backlog.
    Sync {
        conversation_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_message_id: Option<String>,
    },
    /// Keep-alive probe; the server answers with `pong`.
    Ping,
    /// Publish the local user's presence.
    Presence { status: PresenceStatus },
    /// Subscribe to a conversation room.
    Join { conversation_id: String },
    /// Unsubscribe from a conversation room.
    Leave { conversation_id: String },
}

impl Outbound {
    /// Wire discriminant of this frame.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Typing { .. } => "typing",
            Self::Read { .. } => "read",
            Self::Sync { .. } => "sync",
            Self::Ping => "ping",
            Self::Presence { .. } => "presence",
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
        }
    }

    /// Keep-alive frames are transient and never worth replaying.
    #[must_use]
    pub fn is_keep_alive(&self) -> bool {
        matches!(self, Self::Ping)
    }
}

// =============================================================================
// INBOUND (SERVER → CLIENT)
// =============================================================================

/// Session welcome sent by the server right after the upgrade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub user_id: String,
    pub timestamp: Timestamp,
}

/// Envelope of a `message` frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub message: ChatMessage,
}

/// Server acknowledgement that an outbound `message` was persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAck {
    pub message_id: String,
    pub timestamp: Timestamp,
}

/// Another participant started or stopped typing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingEvent {
    pub conversation_id: String,
    #[serde(default)]
    pub user_id: String,
    pub is_typing: bool,
}

/// Another participant read up to `message_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub conversation_id: String,
    #[serde(default)]
    pub user_id: String,
    pub message_id: String,
}

/// Presence change of a user, relayed as-is.
///
/// `status` stays a string so values this client does not model (`busy`,
/// `dnd`, ...) still reach the handler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
    #[serde(default)]
    pub user_id: String,
    pub status: String,
}

impl PresenceEvent {
    /// The reported status, when it is one of the published values.
    #[must_use]
    pub fn known_status(&self) -> Option<PresenceStatus> {
        self.status.parse().ok()
    }
}

/// Backlog returned for a `sync` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub count: u64,
}

/// Answer to a keep-alive `ping`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    pub timestamp: Timestamp,
}

/// Protocol-level error reported by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    pub error: String,
    #[serde(default)]
    pub code: String,
}

/// A frame received from the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    Connected(SessionInfo),
    Message(MessageEnvelope),
    MessageSent(MessageAck),
    Typing(TypingEvent),
    Read(ReadReceipt),
    Presence(PresenceEvent),
    SyncData(SyncBatch),
    Pong(Pong),
    Error(ServerError),
}

/// Discriminant of an [`Inbound`] frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InboundKind {
    Connected,
    Message,
    MessageSent,
    Typing,
    Read,
    Presence,
    SyncData,
    Pong,
    Error,
}

impl InboundKind {
    pub const ALL: [Self; 9] = [
        Self::Connected,
        Self::Message,
        Self::MessageSent,
        Self::Typing,
        Self::Read,
        Self::Presence,
        Self::SyncData,
        Self::Pong,
        Self::Error,
    ];

    /// Wire name of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Message => "message",
            Self::MessageSent => "message_sent",
            Self::Typing => "typing",
            Self::Read => "read",
            Self::Presence => "presence",
            Self::SyncData => "sync_data",
            Self::Pong => "pong",
            Self::Error => "error",
        }
    }

    /// Look up a kind by its wire name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }
}

impl Inbound {
    #[must_use]
    pub fn kind(&self) -> InboundKind {
        match self {
            Self::Connected(_) => InboundKind::Connected,
            Self::Message(_) => InboundKind::Message,
            Self::MessageSent(_) => InboundKind::MessageSent,
            Self::Typing(_) => InboundKind::Typing,
            Self::Read(_) => InboundKind::Read,
            Self::Presence(_) => InboundKind::Presence,
            Self::SyncData(_) => InboundKind::SyncData,
            Self::Pong(_) => InboundKind::Pong,
            Self::Error(_) => InboundKind::Error,
        }
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Encode an outbound frame as a JSON text message.
///
/// # Errors
///
/// Returns [`FrameError::Json`] if serialization fails, which cannot happen
/// for the plain data carried by [`Outbound`].
pub fn encode(frame: &Outbound) -> Result<String, FrameError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode one inbound JSON text message.
///
/// # Errors
///
/// Returns [`FrameError::MissingKind`] when there is no `type` string,
/// [`FrameError::UnknownKind`] for kinds outside [`InboundKind`], and
/// [`FrameError::Json`] for invalid JSON or payloads that do not match
/// their kind.
pub fn decode_inbound(text: &str) -> Result<Inbound, FrameError> {
    let value = serde_json::from_str::<Value>(text)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(FrameError::MissingKind)?;
    if InboundKind::parse(kind).is_none() {
        return Err(FrameError::UnknownKind(kind.to_owned()));
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
