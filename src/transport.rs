//! Transport boundary.
//!
//! The transport frames a command, carries it to the server and decodes the
//! reply into a [`Reply`]. Framing and the wire encodings themselves live
//! outside this crate; a session only needs the [`Transport`] and
//! [`Connector`] traits. Under the binary encoding, decoded replies may carry
//! id-only entities (`Constant::from_id`, `Nart::from_id`, ...) that the
//! session completes before handing them to callers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::error::TransportError;
use crate::term::{FormulaList, Value};

/// Wire encoding selected at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Full textual entity descriptions.
    #[default]
    Textual,
    /// Compact encoding; entities may arrive as bare ids.
    Binary,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Textual => write!(f, "textual"),
            Encoding::Binary => write!(f, "binary"),
        }
    }
}

/// Diagnostic trace level of the messages exchanged with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    #[default]
    None,
    Messages,
    Detailed,
}

impl fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceLevel::None => write!(f, "none"),
            TraceLevel::Messages => write!(f, "messages"),
            TraceLevel::Detailed => write!(f, "detailed"),
        }
    }
}

/// A command: either pre-formatted text or a structured list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    Text(String),
    Formula(FormulaList),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Text(text) => f.write_str(text),
            Command::Formula(list) => write!(f, "{list}"),
        }
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Command::Text(text)
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Command::Text(text.to_string())
    }
}

impl From<FormulaList> for Command {
    fn from(list: FormulaList) -> Self {
        Command::Formula(list)
    }
}

/// The two-part result of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The server processed the request; the decoded value.
    Success(Value),
    /// The server reported a failure; its message.
    Failure(String),
}

impl Reply {
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }
}

/// An open connection to the server.
///
/// One request is outstanding at a time; the session serializes access.
pub trait Transport: Send {
    /// Send a command and wait for its reply.
    fn send(&mut self, command: &Command) -> Result<Reply, TransportError>;

    fn close(&mut self);

    fn set_trace_level(&mut self, level: TraceLevel);

    fn trace_level(&self) -> TraceLevel;

    /// Whether the connection is relayed by a remote proxy agent, which must
    /// be told when the session ends.
    fn is_remote_proxy(&self) -> bool {
        false
    }
}

/// Opens transports. Persistent sessions open one; transient sessions open one per call.
pub trait Connector: Send + Sync {
    fn open(&self, config: &SessionConfig) -> Result<Box<dyn Transport>, TransportError>;
}
