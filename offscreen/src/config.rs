//! Offscreen bridge configuration parsed from environment variables.

use std::collections::HashMap;
use std::time::Duration;

use envelope::deadline;

use crate::request::RequestKind;

pub const DEFAULT_SESSION_KEY: &str = "authSession";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffscreenConfig {
    /// How long a frame-bound request waits for readiness before going ahead.
    pub ready_grace: Duration,
    /// Persistent storage key the session lives under.
    pub session_key: String,
    deadlines: HashMap<RequestKind, Duration>,
}

impl OffscreenConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `OFFSCREEN_READY_GRACE_MS`: default 10000
    /// - `OFFSCREEN_SESSION_KEY`: default `authSession`
    /// - `OFFSCREEN_TIMEOUT_<KIND>_MS`: per-request deadline, e.g.
    ///   `OFFSCREEN_TIMEOUT_FETCH_BOOKMARKS_MS`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let ready_grace = lookup_ms(&lookup, "OFFSCREEN_READY_GRACE_MS").unwrap_or(deadline::READY_GRACE);
        let session_key = lookup("OFFSCREEN_SESSION_KEY")
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| DEFAULT_SESSION_KEY.to_owned());
        let deadlines = RequestKind::ALL
            .into_iter()
            .filter(|kind| kind.needs_frame())
            .map(|kind| {
                let key = format!("OFFSCREEN_TIMEOUT_{}_MS", kind.as_str());
                (kind, lookup_ms(&lookup, &key).unwrap_or_else(|| kind.default_deadline()))
            })
            .collect();

        Self { ready_grace, session_key, deadlines }
    }

    /// Deadline for one request kind.
    #[must_use]
    pub fn deadline(&self, kind: RequestKind) -> Duration {
        self.deadlines
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_deadline())
    }

    #[must_use]
    pub fn with_deadline(mut self, kind: RequestKind, deadline: Duration) -> Self {
        self.deadlines.insert(kind, deadline);
        self
    }

    #[must_use]
    pub fn with_ready_grace(mut self, grace: Duration) -> Self {
        self.ready_grace = grace;
        self
    }
}

impl Default for OffscreenConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn lookup_ms(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
