//! Identity and session model shared by every context.
//!
//! Each context holds its own copy of the session; copies only move through
//! broadcast messages, never through shared memory.

use serde::{Deserialize, Serialize};

/// Signed-in user as reported by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable provider-assigned user id.
    #[serde(alias = "uid")]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL", alias = "photoUrl")]
    pub photo_url: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), email: None, display_name: None, photo_url: None }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Locally cached identity plus tokens.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub identity: Option<Identity>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl Session {
    /// The logged-out session.
    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn signed_in(identity: Identity, id_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self { identity: Some(identity), id_token: Some(id_token.into()), refresh_token }
    }

    #[must_use]
    pub fn identity_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|identity| identity.id.as_str())
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }

    /// An identity is present but the token that should accompany it is not.
    #[must_use]
    pub fn is_desynchronized(&self) -> bool {
        self.identity.is_some() && self.id_token.as_deref().is_none_or(str::is_empty)
    }
}
