//! Message vocabulary of the embedded identity-provider frame.
//!
//! The frame is an opaque peer. What it accepts and what it emits is fixed,
//! so both directions are exhaustive tagged enums. Anything that does not
//! decode to a known discriminant is ignored, including the provider's own
//! internal transport chatter.

use envelope::{ErrorBody, FIELD_REQUEST_ID, FIELD_TYPE, Identity};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pending::RequestId;

/// Leading bytes of the identity provider's internal postMessage transport.
pub const TRANSPORT_NOISE_PREFIX: &str = "!_";

// =============================================================================
// BRIDGE -> FRAME
// =============================================================================

/// Work delegated to the frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum FrameCommand {
    InitializeInteractiveAuth,
    FetchCollections { user_id: String },
    FetchBookmarks { user_id: String, collection_id: String },
    SaveBookmark { user_id: String, bookmark_data: Value },
    CreateCollection { user_id: String, collection_data: Value },
    FetchNotificationSettings { user_id: String },
    SignOutOfIdentityProvider,
}

impl FrameCommand {
    /// Wire form of the command, tagged with the request it belongs to.
    #[must_use]
    pub fn encode(&self, request_id: RequestId) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        if let Value::Object(map) = &mut value {
            map.insert(FIELD_REQUEST_ID.to_owned(), Value::from(request_id));
        }
        value
    }
}

// =============================================================================
// FRAME -> BRIDGE
// =============================================================================

/// Discriminant of every message the frame may emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplyKind {
    FrameReady,
    LoginSuccess,
    LogoutSuccess,
    AuthResult,
    AuthError,
    AuthFallbackInProgress,
    CollectionsData,
    CollectionsError,
    BookmarksData,
    BookmarksError,
    BookmarkSaved,
    BookmarkSaveError,
    CollectionCreated,
    CollectionCreateError,
    NotificationSettingsData,
    NotificationSettingsError,
}

impl ReplyKind {
    /// Map a wire discriminant onto the vocabulary.
    #[must_use]
    pub fn from_discriminant(discriminant: &str) -> Option<Self> {
        serde_json::from_value(Value::String(discriminant.to_owned())).ok()
    }
}

/// A decoded message from the frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum FrameEvent {
    /// The frame's own app has mounted.
    FrameReady,
    /// Unsolicited sign-in signal, e.g. after a redirect fallback completed.
    LoginSuccess {
        identity: Identity,
        id_token: String,
        #[serde(default)]
        refresh_token: Option<String>,
        #[serde(default)]
        collections: Option<Vec<Value>>,
    },
    LogoutSuccess,
    AuthResult {
        identity: Identity,
        id_token: String,
        #[serde(default)]
        refresh_token: Option<String>,
    },
    AuthError {
        #[serde(flatten)]
        error: ErrorBody,
    },
    /// The frame switched from popup to full-page redirect.
    AuthFallbackInProgress,
    CollectionsData { collections: Vec<Value> },
    CollectionsError {
        #[serde(flatten)]
        error: ErrorBody,
    },
    BookmarksData { bookmarks: Vec<Value> },
    BookmarksError {
        #[serde(flatten)]
        error: ErrorBody,
    },
    BookmarkSaved {
        #[serde(default)]
        bookmark: Value,
    },
    BookmarkSaveError {
        #[serde(flatten)]
        error: ErrorBody,
    },
    CollectionCreated { collection: Value },
    CollectionCreateError {
        #[serde(flatten)]
        error: ErrorBody,
    },
    NotificationSettingsData { settings: Value },
    NotificationSettingsError {
        #[serde(flatten)]
        error: ErrorBody,
    },
}

impl FrameEvent {
    #[must_use]
    pub fn kind(&self) -> ReplyKind {
        match self {
            Self::FrameReady => ReplyKind::FrameReady,
            Self::LoginSuccess { .. } => ReplyKind::LoginSuccess,
            Self::LogoutSuccess => ReplyKind::LogoutSuccess,
            Self::AuthResult { .. } => ReplyKind::AuthResult,
            Self::AuthError { .. } => ReplyKind::AuthError,
            Self::AuthFallbackInProgress => ReplyKind::AuthFallbackInProgress,
            Self::CollectionsData { .. } => ReplyKind::CollectionsData,
            Self::CollectionsError { .. } => ReplyKind::CollectionsError,
            Self::BookmarksData { .. } => ReplyKind::BookmarksData,
            Self::BookmarksError { .. } => ReplyKind::BookmarksError,
            Self::BookmarkSaved { .. } => ReplyKind::BookmarkSaved,
            Self::BookmarkSaveError { .. } => ReplyKind::BookmarkSaveError,
            Self::CollectionCreated { .. } => ReplyKind::CollectionCreated,
            Self::CollectionCreateError { .. } => ReplyKind::CollectionCreateError,
            Self::NotificationSettingsData { .. } => ReplyKind::NotificationSettingsData,
            Self::NotificationSettingsError { .. } => ReplyKind::NotificationSettingsError,
        }
    }

    /// The error carried by an `*_ERROR` event.
    #[must_use]
    pub fn error(&self) -> Option<&ErrorBody> {
        match self {
            Self::AuthError { error }
            | Self::CollectionsError { error }
            | Self::BookmarksError { error }
            | Self::BookmarkSaveError { error }
            | Self::CollectionCreateError { error }
            | Self::NotificationSettingsError { error } => Some(error),
            _ => None,
        }
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Why a delivered message was not treated as part of the vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ignored {
    /// The provider's internal transport.
    TransportNoise,
    /// Not a JSON object with a string discriminant.
    NotAnEnvelope,
    /// A discriminant outside the frame vocabulary.
    UnknownType,
}

/// Result of reading one message from the frame.
#[derive(Debug)]
pub enum FrameMessage {
    Event { event: FrameEvent, request_id: Option<RequestId> },
    /// Known discriminant, undecodable payload.
    Malformed { kind: ReplyKind, request_id: Option<RequestId>, error: serde_json::Error },
    Ignored(Ignored),
}

/// Classify one raw message delivered by the frame.
#[must_use]
pub fn parse_frame_message(raw: &Value) -> FrameMessage {
    if raw
        .as_str()
        .is_some_and(|text| text.starts_with(TRANSPORT_NOISE_PREFIX))
    {
        return FrameMessage::Ignored(Ignored::TransportNoise);
    }

    let Ok(value) = envelope::normalize(raw) else {
        return FrameMessage::Ignored(Ignored::NotAnEnvelope);
    };
    let Some(kind) = value
        .get(FIELD_TYPE)
        .and_then(Value::as_str)
        .and_then(ReplyKind::from_discriminant)
    else {
        return FrameMessage::Ignored(Ignored::UnknownType);
    };
    let request_id = envelope::request_id_of(&value);

    match serde_json::from_value::<FrameEvent>(value) {
        Ok(event) => FrameMessage::Event { event, request_id },
        Err(error) => FrameMessage::Malformed { kind, request_id, error },
    }
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
