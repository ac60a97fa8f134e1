//! Request-scoped failures. None of these ever escape a single request.

use std::time::Duration;

use envelope::ErrorCode;

use crate::protocol::ReplyKind;
use crate::request::RequestKind;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("no reply to {kind} within {}ms", .deadline.as_millis())]
    Timeout { kind: RequestKind, deadline: Duration },
    #[error("malformed {kind:?} reply: {source}")]
    Parse {
        kind: ReplyKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("frame unavailable: {0}")]
    FrameUnavailable(String),
    #[error("session storage failed: {0}")]
    Storage(String),
    #[error("bridge shut down before {0} completed")]
    Shutdown(RequestKind),
}

impl ErrorCode for BridgeError {
    fn error_code(&self) -> &str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Parse { .. } => "parse_error",
            Self::FrameUnavailable(_) => "frame_unavailable",
            Self::Storage(_) => "storage_error",
            Self::Shutdown(_) => "shutdown",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::FrameUnavailable(_) | Self::Shutdown(_))
    }
}
