//! Dashboard bridge configuration parsed from environment variables.

use std::time::Duration;

use envelope::deadline;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    /// How long a host session that has an identity but no token may stay
    /// unreconciled before the bridge forces a token refresh.
    pub reconcile_window: Duration,
}

impl DashboardConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `DASHBOARD_RECONCILE_MS`: default 5000
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let reconcile_window = lookup("DASHBOARD_RECONCILE_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(deadline::RECONCILE, Duration::from_millis);
        Self { reconcile_window }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { reconcile_window: deadline::RECONCILE }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
