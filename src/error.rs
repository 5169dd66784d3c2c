//! Rich diagnostic error types for the knowledge-base access layer.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! so a failure carries an error code and help text all the way to the caller.
//! Absence (a constant that does not exist) is not an error here; lookups return
//! `Option` for that. Only the "known" lookups escalate absence to [`KbError::MissingConstant`].

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the access layer.
#[derive(Debug, Error, Diagnostic)]
pub enum AccessError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Kb(#[from] KbError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

impl AccessError {
    /// Whether the server explicitly reported a failure for a well-formed request.
    ///
    /// Callers branch on this for expected-absence cases; every other variant is
    /// a hard failure of the in-flight call.
    pub fn is_kb_failure(&self) -> bool {
        matches!(self, AccessError::Kb(KbError::Server { .. }))
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TransportError {
    #[error("connection refused by {host}:{port}")]
    #[diagnostic(
        code(cyc::transport::refused),
        help("Is the knowledge-base server running and listening on this port?")
    )]
    ConnectionRefused { host: String, port: u16 },

    #[error("unable to resolve host {host}")]
    #[diagnostic(
        code(cyc::transport::unresolved),
        help("Check the `host` field of the session configuration.")
    )]
    HostUnresolved { host: String },

    #[error("I/O error: {source}")]
    #[diagnostic(
        code(cyc::transport::io),
        help("The connection failed mid-request. The request is not retried by this layer.")
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("transport is closed")]
    #[diagnostic(
        code(cyc::transport::closed),
        help("The session was closed. Open a new session to continue.")
    )]
    Closed,
}

impl From<std::io::Error> for TransportError {
    fn from(source: std::io::Error) -> Self {
        TransportError::Io { source }
    }
}

// ---------------------------------------------------------------------------
// Knowledge-base errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum KbError {
    #[error("knowledge base reported failure: {message}")]
    #[diagnostic(
        code(cyc::kb::server),
        help("The server rejected a well-formed request. The message is reported verbatim.")
    )]
    Server { message: String },

    #[error("expected constant not found: {key}")]
    #[diagnostic(
        code(cyc::kb::missing_constant),
        help(
            "A constant assumed to exist could not be resolved. \
             Check that the server's knowledge base contains it."
        )
    )]
    MissingConstant { key: String },
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ProtocolError {
    #[error("expected {expected} but received {actual} in response to {command}")]
    #[diagnostic(
        code(cyc::protocol::shape),
        help(
            "The reply did not have the shape this call requires. \
             This is a client/server contract violation, not an absent value."
        )
    )]
    Shape {
        expected: &'static str,
        actual: String,
        command: String,
    },
}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("two canonical {kind} instances registered under {key}")]
    #[diagnostic(
        code(cyc::registry::consistency),
        help("The interning discipline was violated. Please file a bug report.")
    )]
    Consistency { kind: &'static str, key: String },

    #[error("cannot intern an incomplete {kind}")]
    #[diagnostic(
        code(cyc::registry::incomplete),
        help("Complete the entity through the session before interning it.")
    )]
    Incomplete { kind: &'static str },
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("no session registered for this thread and no shared session")]
    #[diagnostic(
        code(cyc::session::no_current),
        help("Register a session with `SessionDirectory::register` before calling `current()`.")
    )]
    NoCurrentSession,
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("unexpected {found} at offset {offset}")]
    #[diagnostic(
        code(cyc::parse::unexpected),
        help("Check for balanced parentheses and a single top-level list.")
    )]
    Unexpected { found: String, offset: usize },

    #[error("unexpected end of input")]
    #[diagnostic(code(cyc::parse::eof), help("The formula is missing a closing parenthesis."))]
    UnexpectedEof,

    #[error("unterminated string starting at offset {offset}")]
    #[diagnostic(code(cyc::parse::string), help("Close the string literal with a double quote."))]
    UnterminatedString { offset: usize },

    #[error("invalid GUID: {text}")]
    #[diagnostic(
        code(cyc::parse::guid),
        help("GUIDs are hyphenated hex strings such as bd588104-9c29-11b1-9dad-c379636f7270.")
    )]
    InvalidGuid { text: String },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(code(cyc::config::invalid), help("Check the SessionConfig fields. {message}"))]
    Invalid { message: String },

    #[error("failed to read configuration file {path}")]
    #[diagnostic(
        code(cyc::config::read),
        help("Ensure the file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed TOML configuration: {message}")]
    #[diagnostic(code(cyc::config::toml), help("Fix the TOML syntax or field types."))]
    Toml { message: String },
}

/// Convenience alias for functions returning access-layer results.
pub type AccessResult<T> = std::result::Result<T, AccessError>;
