//! Fixed deadlines shared by the bridges.
//!
//! A request's deadline is its only cancellation mechanism: once it passes,
//! the pending entry is dropped and any late reply is ignored.

use std::time::Duration;

/// Session, collection, notification-settings reads and bookmark writes.
pub const READ: Duration = Duration::from_secs(10);

/// Bookmark listing for a collection.
pub const FETCH_BOOKMARKS: Duration = Duration::from_secs(30);

/// Collection creation.
pub const CREATE_COLLECTION: Duration = Duration::from_secs(30);

/// Interactive sign-in through the provider's popup.
pub const INTERACTIVE_SIGN_IN: Duration = Duration::from_secs(60);

/// Signing out of the identity provider itself.
pub const IDENTITY_PROVIDER_SIGN_OUT: Duration = Duration::from_secs(10);

/// How long a request waits for the embedded frame before going ahead anyway.
pub const READY_GRACE: Duration = Duration::from_secs(10);

/// How long the dashboard tolerates an identity without a token before it
/// forces a refresh.
pub const RECONCILE: Duration = Duration::from_secs(5);
