//! Shared message envelope for the extension and dashboard bridges.
//!
//! This crate owns the conventions every context agrees on: how a message is
//! addressed, what a session looks like on the wire, how long each kind of
//! request may stay outstanding, and how change notifications are
//! fingerprinted for dedup. Payloads stay flexible (`serde_json::Value`); each
//! bridge layers its own exhaustive tagged enums on top.
//!
//! DESIGN
//! ======
//! - Every message is a flat JSON object with a `type` discriminant.
//! - Host-to-companion deliveries carry `target`; a context ignores messages
//!   addressed to anyone else. Messages without `target` are broadcasts.
//! - `requestId` is optional. When a peer echoes it, replies correlate
//!   exactly; when it does not, first-reply-wins by discriminant.

pub mod deadline;
mod session;
mod signature;

pub use session::{Identity, Session};
pub use signature::{CollectionSummary, collections_signature};

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// FIELD CONSTANTS
// =============================================================================

/// Envelope key for the message discriminant.
pub const FIELD_TYPE: &str = "type";

/// Envelope key for the addressed recipient context.
pub const FIELD_TARGET: &str = "target";

/// Envelope key for the optional correlation id.
pub const FIELD_REQUEST_ID: &str = "requestId";

// =============================================================================
// ERRORS
// =============================================================================

/// Error returned when a raw message cannot be read as an envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// A string message did not contain JSON.
    #[error("message is not valid JSON: {0}")]
    NotJson(#[source] serde_json::Error),
    /// The message is JSON but not an object with a `type` discriminant.
    #[error("message has no `type` discriminant")]
    MissingType,
    /// The envelope decoded but its payload did not match the expected shape.
    #[error("invalid `{kind}` payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Grepable error code and retryable flag for structured error replies.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Wire shape of every `*_ERROR` message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default = "unknown_code")]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

fn unknown_code() -> String {
    "unknown".to_owned()
}

impl ErrorBody {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into(), retryable: false }
    }

    /// Build an error body from a typed error.
    #[must_use]
    pub fn from_error(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self { code: err.error_code().to_owned(), message: err.to_string(), retryable: err.retryable() }
    }
}

// =============================================================================
// ADDRESSING
// =============================================================================

/// Execution context a message is addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Extension background/service process.
    Background,
    /// Hidden helper document spawned by the background process.
    Offscreen,
    /// Main web-dashboard window.
    Dashboard,
}

/// A single message between contexts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message discriminant. Some senders spell it `kind`.
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    /// Intended recipient, for host-to-companion delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    /// Correlation id, when the sender tracks one.
    #[serde(default, rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
    /// Milliseconds since the Unix epoch when the message was created.
    #[serde(default)]
    pub ts: i64,
    /// Type-specific fields.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Envelope {
    /// Create an envelope stamped with the current time.
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), target: None, request_id: None, ts: now_ms(), payload: Map::new() }
    }

    #[must_use]
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: u64) -> Self {
        self.request_id = Some(request_id);
        self
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Whether a context playing `me` should handle this message.
    #[must_use]
    pub fn is_addressed_to(&self, me: Target) -> bool {
        self.target.is_none_or(|target| target == me)
    }

    /// Read an envelope out of a raw delivered message.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::NotJson`] for string messages that are not
    /// JSON and [`EnvelopeError::MissingType`] when no discriminant is present.
    pub fn decode(raw: &Value) -> Result<Self, EnvelopeError> {
        let object = normalize(raw)?;
        serde_json::from_value(object).map_err(|_| EnvelopeError::MissingType)
    }

    /// Deserialize the whole envelope into a typed message.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Payload`] when the fields do not match `T`.
    pub fn decode_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        let value = serde_json::to_value(self).map_err(|source| EnvelopeError::Payload {
            kind: self.kind.clone(),
            source,
        })?;
        serde_json::from_value(value).map_err(|source| EnvelopeError::Payload { kind: self.kind.clone(), source })
    }
}

/// Turn a delivered message into a JSON object.
///
/// Peers post either structured objects or JSON-encoded strings; both are
/// accepted. Anything without a string `type` is rejected.
///
/// # Errors
///
/// See [`Envelope::decode`].
pub fn normalize(raw: &Value) -> Result<Value, EnvelopeError> {
    let value = match raw {
        Value::String(text) => serde_json::from_str::<Value>(text).map_err(EnvelopeError::NotJson)?,
        other => other.clone(),
    };
    let has_type = value
        .get(FIELD_TYPE)
        .or_else(|| value.get("kind"))
        .is_some_and(Value::is_string);
    if !has_type {
        return Err(EnvelopeError::MissingType);
    }
    Ok(value)
}

/// Read the `requestId` a peer echoed back, if any.
#[must_use]
pub fn request_id_of(value: &Value) -> Option<u64> {
    value.get(FIELD_REQUEST_ID).and_then(Value::as_u64)
}

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
