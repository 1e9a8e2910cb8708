//! Wire protocol types shared by the server and its clients.
//!
//! Both flavors ride the same framing:
//! - **Classification**: `[u32 BE length][payload]` in, `[u32 BE length][UTF-8]` out
//! - **Generation**: `[u32 BE max length]` in (no payload), `[u32 BE length][UTF-8]` out

use serde::{Deserialize, Serialize};
use tokio_util::bytes::Bytes;

/// Unique identifier for one accepted connection.
///
/// Only used to correlate log lines; it never goes over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Protocol variant served on a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flavor {
    /// Length-prefixed opaque content in, keywords out. Every frame is answered.
    Classification,
    /// Length field is a max output length, no payload. Values <= 1 get no answer.
    Generation,
}

impl Flavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::Generation => "generation",
        }
    }

    /// Default socket file name, relative to the working directory.
    pub fn default_socket_name(&self) -> &'static str {
        match self {
            Self::Classification => "imclassif.sock",
            Self::Generation => "randtext.sock",
        }
    }
}

/// A decoded wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Length prefix followed by exactly that many bytes.
    Payload(Bytes),
    /// The length prefix is itself the value; nothing follows it.
    Control(u32),
}

impl Frame {
    pub fn payload(data: impl Into<Bytes>) -> Self {
        Self::Payload(data.into())
    }
}

/// Why a session left the Active state.
///
/// Every variant is terminal for the connection only; the server keeps
/// accepting after any of them.
#[derive(Debug)]
pub enum SessionEnd {
    /// Peer closed cleanly, or after 0-3 bytes of a length prefix.
    PeerClosed,
    /// Peer closed after announcing `expected` bytes but sending `received`.
    Truncated { expected: usize, received: usize },
    /// Announced length exceeds the configured maximum.
    Oversized { length: usize, max: usize },
    /// Read or write failed.
    Transport(std::io::Error),
    /// Generation engine gave up; no response was written.
    EngineGaveUp(crate::engine::EngineError),
}

impl SessionEnd {
    /// True for the ordinary end of a conversation.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::PeerClosed)
    }
}

impl std::fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed"),
            Self::Truncated { expected, received } => {
                write!(f, "payload truncated: expected {expected} bytes, got {received}")
            }
            Self::Oversized { length, max } => {
                write!(f, "frame of {length} bytes exceeds maximum {max}")
            }
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::EngineGaveUp(e) => write!(f, "engine gave up: {e}"),
        }
    }
}
