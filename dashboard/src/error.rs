use envelope::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("no signed-in user")]
    NoUser,
    #[error("identity provider unavailable: {0}")]
    Identity(String),
    #[error("token refresh failed: {0}")]
    Refresh(String),
    #[error("dashboard bridge is not running")]
    ChannelClosed,
}

impl ErrorCode for DashboardError {
    fn error_code(&self) -> &str {
        match self {
            Self::NoUser => "NO_USER",
            Self::Identity(_) => "identity_error",
            Self::Refresh(_) => "refresh_error",
            Self::ChannelClosed => "channel_closed",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Refresh(_) | Self::ChannelClosed)
    }
}
