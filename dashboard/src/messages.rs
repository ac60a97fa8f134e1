//! Broadcast vocabulary the dashboard shares with its companion contexts.

use envelope::{Envelope, EnvelopeError, ErrorBody, ErrorCode, Identity, Session, Target};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which side of the window produced a broadcast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Another context, e.g. the extension.
    #[serde(alias = "extension")]
    Companion,
    /// The dashboard's own host application.
    Host,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum Broadcast {
    AuthStateChanged {
        origin: Origin,
        #[serde(default)]
        session: Session,
        #[serde(default)]
        ts: i64,
    },
    CollectionsChanged {
        origin: Origin,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
        #[serde(default)]
        ts: i64,
    },
    /// Ask the dashboard to publish its session now.
    RequestCurrentSession,
}

impl Broadcast {
    /// Read a broadcast delivered to the dashboard window.
    ///
    /// Returns `Ok(None)` for messages addressed to another context.
    ///
    /// # Errors
    ///
    /// Fails for non-envelopes and for discriminants outside the vocabulary.
    pub fn decode(raw: &Value) -> Result<Option<Self>, EnvelopeError> {
        let envelope = Envelope::decode(raw)?;
        if !envelope.is_addressed_to(Target::Dashboard) {
            return Ok(None);
        }
        envelope.decode_as().map(Some)
    }
}

/// Reply to one fresh-token request, sent over that request's own channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenReply {
    Tokens {
        #[serde(rename = "idToken")]
        id_token: String,
        #[serde(rename = "refreshToken", default)]
        refresh_token: Option<String>,
        identity: Identity,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        message: String,
    },
}

impl TokenReply {
    pub fn from_error(err: &impl ErrorCode) -> Self {
        let body = ErrorBody::from_error(err);
        Self::Error { error: body.code, message: body.message }
    }

    #[must_use]
    pub fn id_token(&self) -> Option<&str> {
        match self {
            Self::Tokens { id_token, .. } => Some(id_token),
            Self::Error { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "messages_test.rs"]
mod tests;
