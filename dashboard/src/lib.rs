//! Dashboard bridge: keeps the web dashboard's session in step with the
//! extension and answers fresh-token requests.
//!
//! Runs inside the dashboard window. Everything it learns arrives as a
//! window-level broadcast; everything it shares leaves as one. The identity
//! provider, data layer, toasts, and the broadcast channel itself are host
//! collaborators behind the traits in [`ports`].

pub mod bridge;
pub mod config;
pub mod error;
pub mod messages;
pub mod ports;

pub use bridge::{BroadcastDedupGuard, DashboardBridge, Inbound, request_fresh_token};
pub use config::DashboardConfig;
pub use error::DashboardError;
pub use messages::{Broadcast, Origin, TokenReply};
pub use ports::{BroadcastPort, DataLayer, FreshTokens, IdentityProvider, Toaster};
