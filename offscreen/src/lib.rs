//! Offscreen bridge between the extension's background coordinator and the
//! embedded identity-provider frame.
//!
//! The background process cannot run the provider's interactive sign-in or
//! its data SDK, so it hands that work to a hidden document which embeds the
//! provider's web app in a frame. This crate is that document's logic: it
//! waits for the frame, forwards each request as a frame command, and settles
//! the request with the first matching reply or a timeout error.
//!
//! DESIGN
//! ======
//! - Every request resolves exactly once. The pending table removes an entry
//!   on its first reply or on expiry, whichever comes first.
//! - Correlation prefers an echoed `requestId` and falls back to the oldest
//!   outstanding request that accepts the reply's discriminant.
//! - Login notifications are deduplicated by identity id; logout
//!   notifications never are.
//! - Browser surfaces (the frame, the coordinator, local storage) sit behind
//!   the traits in [`ports`].

pub mod bridge;
pub mod config;
pub mod error;
pub mod pending;
pub mod ports;
pub mod protocol;
pub mod readiness;
pub mod request;

pub use bridge::{Inbound, LoginDedupGuard, OffscreenBridge};
pub use config::OffscreenConfig;
pub use error::BridgeError;
pub use ports::{CoordinatorEvent, CoordinatorPort, FileSessionStore, FramePort, MemorySessionStore, SessionStore};
pub use protocol::{FrameCommand, FrameEvent, ReplyKind};
pub use request::{LocalResponse, RequestKind, RequestOutcome, Response, WorkRequest};
