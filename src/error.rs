//! Error types for registration, REST calls, payload parsing and configuration.
//!
//! Only programming mistakes surface as `Err` from the public API (handler registration,
//! configuration). Environmental failures of a REST call travel inside the
//! [`Response`](crate::rest::Response) envelope instead.
use crate::events::EventType;
use crate::handlers::{Expiry, Tag};
use http::StatusCode;

/// Raised synchronously by handler registration; the registry is left unchanged.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The callback cannot receive events of the requested type.
    #[error("callback accepting {accepts} cannot handle {event_type} events")]
    SignatureMismatch {
        /// Event type the caller tried to register for.
        event_type: EventType,
        /// Human-readable description of what the callback accepts.
        accepts: String,
    },
    /// The handler would be expired the moment it was registered.
    #[error("handler for {event_type} is already expired ({expiry})")]
    AlreadyExpired {
        /// Event type the caller tried to register for.
        event_type: EventType,
        /// The offending expiry.
        expiry: Expiry,
    },
    /// The tag belongs to the built-in cache handlers.
    #[error("tag {tag} is reserved for built-in handlers ({event_type})")]
    ReservedTag {
        /// Event type the caller tried to register for.
        event_type: EventType,
        /// The reserved tag.
        tag: Tag,
    },
}

/// Failure of the transport primitive itself (no response was obtained).
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// Could not reach the remote service.
    #[error("connection failed: {0}")]
    Connect(String),
    /// The transport gave up waiting for a response.
    #[error("transport timed out")]
    Timeout,
    /// Any other transport fault.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Why a REST call did not produce a value.
#[derive(thiserror::Error, Debug)]
pub enum RestError {
    /// The call itself faulted.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    /// The remote service answered with a non-success status.
    #[error("remote returned {status}")]
    Status {
        /// Status code of the final response.
        status: StatusCode,
    },
    /// A success response whose body did not decode into the expected type.
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RestError {
    /// Status code for `Status` errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RestError::Status { status } => Some(*status),
            _ => None,
        }
    }

    /// True when the call faulted rather than returning a response.
    pub fn is_transport(&self) -> bool {
        matches!(self, RestError::Transport(_))
    }
}

/// A gateway payload that failed to construct into its typed event.
#[derive(thiserror::Error, Debug)]
#[error("failed to parse {event} payload: {source}")]
pub struct ParseError {
    /// Wire name of the event (e.g. `MESSAGE_CREATE`).
    pub event: String,
    /// Underlying decode error.
    #[source]
    pub source: serde_json::Error,
}

/// Configuration rejected by [`ClientConfigBuilder::build`](crate::config::ClientConfigBuilder::build).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A bot token is required.
    #[error("token must not be empty")]
    EmptyToken,
    /// The API base must be an absolute http(s) URL.
    #[error("api_base must start with http:// or https:// (got {0:?})")]
    InvalidApiBase(String),
    /// The error log needs room for at least one entry.
    #[error("error_log_capacity must be > 0")]
    ZeroErrorLogCapacity,
}
