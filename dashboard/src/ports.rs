//! Collaborators the dashboard bridge talks to. The host application
//! provides all of them.

use async_trait::async_trait;
use envelope::Identity;

use crate::error::DashboardError;
use crate::messages::Broadcast;

/// Tokens minted by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FreshTokens {
    pub id_token: String,
    pub refresh_token: Option<String>,
}

/// The host application's identity-provider SDK.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves once the provider has restored its persisted state.
    async fn initialize(&self) -> Result<(), DashboardError>;

    async fn current_identity(&self) -> Option<Identity>;

    /// Mint tokens for the current identity, bypassing any cache when
    /// `force_refresh` is set.
    async fn fresh_tokens(&self, force_refresh: bool) -> Result<FreshTokens, DashboardError>;
}

/// The dashboard's data layer.
#[async_trait]
pub trait DataLayer: Send + Sync {
    async fn refetch_collections(&self) -> Result<(), DashboardError>;
}

/// User-facing warnings.
pub trait Toaster: Send + Sync {
    fn warn(&self, message: &str);
}

/// Window-level broadcast channel shared with companion contexts.
#[async_trait]
pub trait BroadcastPort: Send + Sync {
    async fn emit(&self, message: Broadcast);
}
