//! Newline-delimited JSON host for the offscreen bridge.
//!
//! Every input line is one delivered message, tagged with the channel it
//! arrived on:
//!
//! ```text
//! {"channel":"coordinator","replyTo":7,"message":{"type":"FETCH_COLLECTIONS","userId":"u1"}}
//! {"channel":"frame","message":{"type":"COLLECTIONS_DATA","collections":[]}}
//! {"channel":"frame-loaded"}
//! {"channel":"shutdown"}
//! ```
//!
//! Output lines use the same framing: `frame` (a command for the frame),
//! `response` (the answer to a coordinator request, keyed by `replyTo`),
//! `coordinator` (an unsolicited notification), and `rejected` (a
//! coordinator line that could not be read as a request).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use envelope::{ErrorBody, ErrorCode};
use offscreen::pending::RequestId;
use offscreen::{
    BridgeError, CoordinatorEvent, CoordinatorPort, FrameCommand, FramePort, Inbound, OffscreenBridge, OffscreenConfig,
    Response, SessionStore, WorkRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// How long buffered output may take to drain after shutdown.
pub const FLUSH_GRACE: Duration = Duration::from_secs(2);

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("stdio failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("bridge task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("output did not drain within {}ms", .0.as_millis())]
    Flush(Duration),
}

/// A coordinator line that is not a request for this context.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Rejected(envelope::EnvelopeError);

impl ErrorCode for Rejected {
    fn error_code(&self) -> &str {
        "bad_request"
    }
}

// =============================================================================
// WIRE
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "channel", rename_all = "kebab-case")]
enum InboundLine {
    Coordinator {
        #[serde(rename = "replyTo")]
        reply_to: u64,
        message: Value,
    },
    Frame {
        message: Value,
    },
    FrameLoaded,
    Shutdown,
}

#[derive(Debug, Serialize)]
#[serde(tag = "channel", rename_all = "kebab-case")]
enum OutboundLine {
    Frame {
        message: Value,
    },
    Response {
        #[serde(rename = "replyTo")]
        reply_to: u64,
        message: Response,
    },
    Coordinator {
        message: CoordinatorEvent,
    },
    Rejected {
        #[serde(rename = "replyTo")]
        reply_to: u64,
        error: ErrorBody,
    },
}

// =============================================================================
// PORTS
// =============================================================================

struct StdioFrame {
    out: mpsc::Sender<OutboundLine>,
}

#[async_trait]
impl FramePort for StdioFrame {
    async fn post(&self, request_id: RequestId, command: &FrameCommand) -> Result<(), BridgeError> {
        let line = OutboundLine::Frame { message: command.encode(request_id) };
        self.out
            .send(line)
            .await
            .map_err(|_| BridgeError::FrameUnavailable("output closed".into()))
    }
}

struct StdioCoordinator {
    out: mpsc::Sender<OutboundLine>,
}

#[async_trait]
impl CoordinatorPort for StdioCoordinator {
    async fn notify(&self, event: CoordinatorEvent) {
        if self.out.send(OutboundLine::Coordinator { message: event }).await.is_err() {
            warn!("host: output closed, coordinator notification lost");
        }
    }
}

// =============================================================================
// SERVE
// =============================================================================

/// Run a bridge over `input`/`output` until input ends or a shutdown line
/// arrives. Hands `output` back once everything queued was written.
///
/// # Errors
///
/// Fails on I/O errors, on a panicked bridge task, or when output cannot
/// drain within [`FLUSH_GRACE`].
pub async fn serve<R, W>(
    input: R,
    output: W,
    config: OffscreenConfig,
    store: Arc<dyn SessionStore>,
) -> Result<W, HostError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let writer = tokio::spawn(write_lines(output, out_rx));

    let frame = Arc::new(StdioFrame { out: out_tx.clone() });
    let coordinator = Arc::new(StdioCoordinator { out: out_tx.clone() });
    let bridge = OffscreenBridge::start(config, frame, coordinator, store).await;

    let (in_tx, in_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let runner = tokio::spawn(bridge.run(in_rx));

    let pumped = pump(input, &in_tx, &out_tx).await;
    // The bridge may already be gone if a shutdown line was pumped.
    let _ = in_tx.send(Inbound::Shutdown).await;
    runner.await?;
    drop(out_tx);
    pumped?;

    match tokio::time::timeout(FLUSH_GRACE, writer).await {
        Ok(written) => Ok(written??),
        Err(_) => Err(HostError::Flush(FLUSH_GRACE)),
    }
}

async fn pump<R>(
    mut input: R,
    inbound: &mpsc::Sender<Inbound>,
    out: &mpsc::Sender<OutboundLine>,
) -> Result<(), HostError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line).await? == 0 {
            info!("host: input closed");
            return Ok(());
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let parsed = match serde_json::from_str::<InboundLine>(text) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "host: unreadable input line");
                continue;
            }
        };

        let delivered = match parsed {
            InboundLine::Coordinator { reply_to, message } => {
                deliver_request(reply_to, &message, inbound, out).await
            }
            InboundLine::Frame { message } => inbound.send(Inbound::Frame(message)).await.is_ok(),
            InboundLine::FrameLoaded => inbound.send(Inbound::FrameLoaded).await.is_ok(),
            InboundLine::Shutdown => {
                info!("host: shutdown requested");
                return Ok(());
            }
        };
        if !delivered {
            warn!("host: bridge stopped, no more input accepted");
            return Ok(());
        }
    }
}

/// Hand a coordinator request to the bridge and forward its answer.
/// Returns `false` once the bridge no longer accepts input.
async fn deliver_request(
    reply_to: u64,
    message: &Value,
    inbound: &mpsc::Sender<Inbound>,
    out: &mpsc::Sender<OutboundLine>,
) -> bool {
    let request = match WorkRequest::decode(message) {
        Ok(Some(request)) => request,
        Ok(None) => {
            debug!(reply_to, "host: request addressed elsewhere");
            return true;
        }
        Err(e) => {
            let error = ErrorBody::from_error(&Rejected(e));
            return out.send(OutboundLine::Rejected { reply_to, error }).await.is_ok();
        }
    };

    let (reply, answer) = oneshot::channel();
    if inbound.send(Inbound::Coordinator { request, reply }).await.is_err() {
        return false;
    }

    let out = out.clone();
    tokio::spawn(async move {
        // A dropped sender means a sign-in deferred to a redirect was released at teardown.
        if let Ok(message) = answer.await {
            let _ = out.send(OutboundLine::Response { reply_to, message }).await;
        }
    });
    true
}

async fn write_lines<W>(mut output: W, mut lines: mpsc::Receiver<OutboundLine>) -> std::io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        let mut bytes = serde_json::to_vec(&line)?;
        bytes.push(b'\n');
        output.write_all(&bytes).await?;
        output.flush().await?;
    }
    Ok(output)
}

#[cfg(test)]
#[path = "host_test.rs"]
mod tests;
