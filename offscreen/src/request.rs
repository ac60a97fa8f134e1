//! Work requests from the background coordinator and the responses they get.

use std::fmt;
use std::time::Duration;

use envelope::{Envelope, EnvelopeError, ErrorBody, Session, Target, deadline};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::{FrameCommand, FrameEvent, ReplyKind};

// =============================================================================
// REQUESTS
// =============================================================================

/// A unit of work the coordinator asks the bridge to carry out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum WorkRequest {
    BeginSignIn,
    GetCachedSession,
    SignOut,
    SignOutOfIdentityProvider,
    FetchCollections { user_id: String },
    FetchBookmarks { user_id: String, collection_id: String },
    SaveBookmark { user_id: String, bookmark_data: Value },
    CreateCollection { user_id: String, collection_data: Value },
    FetchNotificationSettings { user_id: String },
}

impl WorkRequest {
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::BeginSignIn => RequestKind::BeginSignIn,
            Self::GetCachedSession => RequestKind::GetCachedSession,
            Self::SignOut => RequestKind::SignOut,
            Self::SignOutOfIdentityProvider => RequestKind::SignOutOfIdentityProvider,
            Self::FetchCollections { .. } => RequestKind::FetchCollections,
            Self::FetchBookmarks { .. } => RequestKind::FetchBookmarks,
            Self::SaveBookmark { .. } => RequestKind::SaveBookmark,
            Self::CreateCollection { .. } => RequestKind::CreateCollection,
            Self::FetchNotificationSettings { .. } => RequestKind::FetchNotificationSettings,
        }
    }

    /// The frame message this request turns into. `None` for requests the
    /// bridge answers on its own.
    #[must_use]
    pub fn into_command(self) -> Option<FrameCommand> {
        let command = match self {
            Self::GetCachedSession | Self::SignOut => return None,
            Self::BeginSignIn => FrameCommand::InitializeInteractiveAuth,
            Self::SignOutOfIdentityProvider => FrameCommand::SignOutOfIdentityProvider,
            Self::FetchCollections { user_id } => FrameCommand::FetchCollections { user_id },
            Self::FetchBookmarks { user_id, collection_id } => FrameCommand::FetchBookmarks { user_id, collection_id },
            Self::SaveBookmark { user_id, bookmark_data } => FrameCommand::SaveBookmark { user_id, bookmark_data },
            Self::CreateCollection { user_id, collection_data } => {
                FrameCommand::CreateCollection { user_id, collection_data }
            }
            Self::FetchNotificationSettings { user_id } => FrameCommand::FetchNotificationSettings { user_id },
        };
        Some(command)
    }

    /// Read a request delivered to this context.
    ///
    /// Returns `Ok(None)` for messages addressed to another context.
    ///
    /// # Errors
    ///
    /// Fails when the message is not an envelope or a field the request
    /// needs is missing.
    pub fn decode(raw: &Value) -> Result<Option<Self>, EnvelopeError> {
        let envelope = Envelope::decode(raw)?;
        if !envelope.is_addressed_to(Target::Offscreen) {
            return Ok(None);
        }
        envelope.decode_as().map(Some)
    }
}

/// Fieldless mirror of [`WorkRequest`], used for routing and deadlines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    BeginSignIn,
    GetCachedSession,
    SignOut,
    SignOutOfIdentityProvider,
    FetchCollections,
    FetchBookmarks,
    SaveBookmark,
    CreateCollection,
    FetchNotificationSettings,
}

impl RequestKind {
    pub const ALL: [Self; 9] = [
        Self::BeginSignIn,
        Self::GetCachedSession,
        Self::SignOut,
        Self::SignOutOfIdentityProvider,
        Self::FetchCollections,
        Self::FetchBookmarks,
        Self::SaveBookmark,
        Self::CreateCollection,
        Self::FetchNotificationSettings,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeginSignIn => "BEGIN_SIGN_IN",
            Self::GetCachedSession => "GET_CACHED_SESSION",
            Self::SignOut => "SIGN_OUT",
            Self::SignOutOfIdentityProvider => "SIGN_OUT_OF_IDENTITY_PROVIDER",
            Self::FetchCollections => "FETCH_COLLECTIONS",
            Self::FetchBookmarks => "FETCH_BOOKMARKS",
            Self::SaveBookmark => "SAVE_BOOKMARK",
            Self::CreateCollection => "CREATE_COLLECTION",
            Self::FetchNotificationSettings => "FETCH_NOTIFICATION_SETTINGS",
        }
    }

    /// Whether the request goes through the frame and therefore waits for it.
    #[must_use]
    pub fn needs_frame(self) -> bool {
        !matches!(self, Self::GetCachedSession | Self::SignOut)
    }

    /// Reply kinds that resolve this request.
    #[must_use]
    pub fn accepted_replies(self) -> &'static [ReplyKind] {
        match self {
            Self::GetCachedSession | Self::SignOut => &[],
            Self::BeginSignIn => &[ReplyKind::AuthResult, ReplyKind::AuthError, ReplyKind::AuthFallbackInProgress],
            Self::SignOutOfIdentityProvider => &[ReplyKind::LogoutSuccess, ReplyKind::AuthError],
            Self::FetchCollections => &[ReplyKind::CollectionsData, ReplyKind::CollectionsError],
            Self::FetchBookmarks => &[ReplyKind::BookmarksData, ReplyKind::BookmarksError],
            Self::SaveBookmark => &[ReplyKind::BookmarkSaved, ReplyKind::BookmarkSaveError],
            Self::CreateCollection => &[ReplyKind::CollectionCreated, ReplyKind::CollectionCreateError],
            Self::FetchNotificationSettings => {
                &[ReplyKind::NotificationSettingsData, ReplyKind::NotificationSettingsError]
            }
        }
    }

    #[must_use]
    pub fn accepts(self, reply: ReplyKind) -> bool {
        self.accepted_replies().contains(&reply)
    }

    /// Built-in deadline. Local requests never wait on the frame and get zero.
    #[must_use]
    pub fn default_deadline(self) -> Duration {
        match self {
            Self::GetCachedSession | Self::SignOut => Duration::ZERO,
            Self::BeginSignIn => deadline::INTERACTIVE_SIGN_IN,
            Self::SignOutOfIdentityProvider => deadline::IDENTITY_PROVIDER_SIGN_OUT,
            Self::FetchBookmarks => deadline::FETCH_BOOKMARKS,
            Self::CreateCollection => deadline::CREATE_COLLECTION,
            Self::FetchCollections | Self::SaveBookmark | Self::FetchNotificationSettings => deadline::READ,
        }
    }

    /// The error response this kind of request reports failures with.
    #[must_use]
    pub fn error_response(self, error: ErrorBody) -> Response {
        let event = match self {
            Self::GetCachedSession | Self::SignOut => {
                return Response::Local(LocalResponse::SessionError { error });
            }
            Self::BeginSignIn | Self::SignOutOfIdentityProvider => FrameEvent::AuthError { error },
            Self::FetchCollections => FrameEvent::CollectionsError { error },
            Self::FetchBookmarks => FrameEvent::BookmarksError { error },
            Self::SaveBookmark => FrameEvent::BookmarkSaveError { error },
            Self::CreateCollection => FrameEvent::CollectionCreateError { error },
            Self::FetchNotificationSettings => FrameEvent::NotificationSettingsError { error },
        };
        Response::Relayed(event)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

/// Responses the bridge produces without involving the frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocalResponse {
    CachedSession {
        session: Session,
    },
    SignedOut,
    SessionError {
        #[serde(flatten)]
        error: ErrorBody,
    },
}

/// What the coordinator receives for one request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Local(LocalResponse),
    /// A frame reply, passed through as-is.
    Relayed(FrameEvent),
}

impl Response {
    /// The error this response reports, if it is an error response.
    #[must_use]
    pub fn error(&self) -> Option<&ErrorBody> {
        match self {
            Self::Local(LocalResponse::SessionError { error }) => Some(error),
            Self::Local(_) => None,
            Self::Relayed(event) => event.error(),
        }
    }
}

/// Terminal state of one request.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestOutcome {
    Resolved(Response),
    /// No reply before the deadline; carries the kind's timeout error.
    TimedOut(Response),
    /// Interactive sign-in handed off to a full-page redirect. The caller is
    /// deliberately left unanswered.
    DeferredToRedirect,
}

impl RequestOutcome {
    /// The response to deliver to the caller, if any.
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Resolved(response) | Self::TimedOut(response) => Some(response),
            Self::DeferredToRedirect => None,
        }
    }
}

#[cfg(test)]
#[path = "request_test.rs"]
mod tests;
