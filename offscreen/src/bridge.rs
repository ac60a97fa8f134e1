//! The offscreen bridge: relays coordinator work through the embedded frame.
//!
//! LIFECYCLE
//! =========
//! 1. `start` restores the persisted session and seeds the login guard.
//! 2. The frame's load event or its `FRAME_READY` message opens the
//!    readiness latch, whichever comes first.
//! 3. Each coordinator request: wait for readiness (bounded) → register a
//!    pending entry → post the command → first matching reply or deadline.
//! 4. A standing listener handles `LOGIN_SUCCESS` / `LOGOUT_SUCCESS` that
//!    arrive outside any request.
//! 5. A sign-in deferred to a redirect never gets an answer on its channel.
//!    The channel stays open until teardown.
//! 6. Teardown wakes requests still waiting for the frame, drops every
//!    pending entry, and releases deferred channels.
//!
//! All state lives on the bridge instance; two bridges never share anything.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use envelope::{ErrorBody, Session};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::OffscreenConfig;
use crate::error::BridgeError;
use crate::pending::{PendingTable, RequestId, Settlement};
use crate::ports::{CoordinatorEvent, CoordinatorPort, FramePort, SessionStore};
use crate::protocol::{FrameCommand, FrameEvent, FrameMessage, ReplyKind, parse_frame_message};
use crate::readiness::{FrameReadiness, ReadinessWait, ReadySignal};
use crate::request::{LocalResponse, RequestKind, RequestOutcome, Response, WorkRequest};

// =============================================================================
// LOGIN GUARD
// =============================================================================

/// Remembers the last identity a login was processed for, so the same login
/// reported over a second channel is handled once.
#[derive(Debug, Default)]
pub struct LoginDedupGuard {
    last_identity_id: Option<String>,
}

impl LoginDedupGuard {
    /// Record a login. Returns `false` if it repeats the last one.
    pub fn admit(&mut self, identity_id: &str) -> bool {
        if self.last_identity_id.as_deref() == Some(identity_id) {
            return false;
        }
        self.last_identity_id = Some(identity_id.to_owned());
        true
    }

    pub fn clear(&mut self) {
        self.last_identity_id = None;
    }

    #[must_use]
    pub fn last_identity_id(&self) -> Option<&str> {
        self.last_identity_id.as_deref()
    }
}

// =============================================================================
// INBOUND
// =============================================================================

/// Everything that can arrive at the offscreen document.
#[derive(Debug)]
pub enum Inbound {
    /// Work from the background coordinator with its response channel.
    Coordinator { request: WorkRequest, reply: oneshot::Sender<Response> },
    /// A raw message posted by the frame.
    Frame(Value),
    /// The frame element finished loading.
    FrameLoaded,
    /// The document is being torn down.
    Shutdown,
}

// =============================================================================
// BRIDGE
// =============================================================================

#[derive(Clone)]
pub struct OffscreenBridge {
    config: Arc<OffscreenConfig>,
    readiness: FrameReadiness,
    pending: Arc<Mutex<PendingTable>>,
    login_guard: Arc<Mutex<LoginDedupGuard>>,
    /// Reply channels of sign-ins that continue through a redirect.
    deferred: Arc<Mutex<Vec<oneshot::Sender<Response>>>>,
    stopping: Arc<watch::Sender<bool>>,
    frame: Arc<dyn FramePort>,
    coordinator: Arc<dyn CoordinatorPort>,
    store: Arc<dyn SessionStore>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl OffscreenBridge {
    /// Build a bridge and restore the last persisted session.
    pub async fn start(
        config: OffscreenConfig,
        frame: Arc<dyn FramePort>,
        coordinator: Arc<dyn CoordinatorPort>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let bridge = Self {
            config: Arc::new(config),
            readiness: FrameReadiness::new(),
            pending: Arc::new(Mutex::new(PendingTable::new())),
            login_guard: Arc::new(Mutex::new(LoginDedupGuard::default())),
            deferred: Arc::new(Mutex::new(Vec::new())),
            stopping: Arc::new(watch::channel(false).0),
            frame,
            coordinator,
            store,
        };

        match bridge.store.load(&bridge.config.session_key).await {
            Ok(Some(session)) => {
                if let Some(identity_id) = session.identity_id() {
                    lock(&bridge.login_guard).admit(identity_id);
                    info!(identity_id, "offscreen: restored session");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "offscreen: session restore failed"),
        }

        bridge
    }

    #[must_use]
    pub fn readiness(&self) -> &FrameReadiness {
        &self.readiness
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Deferred sign-ins whose callers are still waiting.
    #[must_use]
    pub fn deferred_count(&self) -> usize {
        lock(&self.deferred).len()
    }

    #[must_use]
    pub fn last_login_identity(&self) -> Option<String> {
        lock(&self.login_guard).last_identity_id().map(str::to_owned)
    }

    /// Process inbound messages until shutdown or until every sender is gone.
    ///
    /// Each coordinator request runs on its own task, so an outstanding
    /// request never holds up frame messages.
    pub async fn run(self, mut inbound: mpsc::Receiver<Inbound>) {
        while let Some(message) = inbound.recv().await {
            match message {
                Inbound::Coordinator { request, reply } => {
                    let bridge = self.clone();
                    tokio::spawn(async move {
                        match bridge.dispatch(request).await.into_response() {
                            Some(response) => {
                                let _ = reply.send(response);
                            }
                            None => bridge.park(reply),
                        }
                    });
                }
                Inbound::Frame(raw) => self.on_frame_message(&raw).await,
                Inbound::FrameLoaded => self.on_frame_loaded(),
                Inbound::Shutdown => break,
            }
        }
        self.shutdown();
    }

    /// Drop every outstanding request and refuse new ones.
    pub fn shutdown(&self) {
        self.stopping.send_replace(true);
        let dropped = lock(&self.pending).close();
        let released = lock(&self.deferred).drain(..).count();
        info!(dropped, released, "offscreen: bridge torn down");
    }

    /// Keep a deferred caller's channel open until teardown.
    fn park(&self, reply: oneshot::Sender<Response>) {
        let mut deferred = lock(&self.deferred);
        if *self.stopping.borrow() {
            debug!("offscreen: deferred sign-in released at teardown");
            return;
        }
        deferred.retain(|waiting| !waiting.is_closed());
        deferred.push(reply);
    }

    async fn stopped(&self) {
        let mut rx = self.stopping.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|stopping| *stopping).await;
    }

    fn refused(kind: RequestKind) -> RequestOutcome {
        debug!(%kind, "offscreen: bridge torn down, request refused");
        let err = BridgeError::Shutdown(kind);
        RequestOutcome::Resolved(kind.error_response(ErrorBody::from_error(&err)))
    }

    // =========================================================================
    // REQUESTS
    // =========================================================================

    /// Carry out one coordinator request to its terminal outcome.
    pub async fn dispatch(&self, request: WorkRequest) -> RequestOutcome {
        let kind = request.kind();
        info!(%kind, "offscreen: request received");

        let Some(command) = request.into_command() else {
            return self.answer_locally(kind).await;
        };
        self.forward(kind, command).await
    }

    async fn answer_locally(&self, kind: RequestKind) -> RequestOutcome {
        let key = &self.config.session_key;
        let result = if kind == RequestKind::SignOut {
            lock(&self.login_guard).clear();
            self.store
                .clear(key)
                .await
                .map(|()| LocalResponse::SignedOut)
        } else {
            self.store
                .load(key)
                .await
                .map(|session| LocalResponse::CachedSession { session: session.unwrap_or_default() })
        };

        match result {
            Ok(response) => RequestOutcome::Resolved(Response::Local(response)),
            Err(e) => {
                warn!(%kind, error = %e, "offscreen: session storage failed");
                RequestOutcome::Resolved(kind.error_response(ErrorBody::from_error(&e)))
            }
        }
    }

    async fn forward(&self, kind: RequestKind, command: FrameCommand) -> RequestOutcome {
        let grace = self.config.ready_grace;
        let waited = tokio::select! {
            biased;
            () = self.stopped() => return Self::refused(kind),
            waited = self.readiness.wait_with_grace(grace) => waited,
        };
        if waited == ReadinessWait::GraceElapsed {
            warn!(
                %kind,
                grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                "offscreen: frame not ready after grace period, proceeding anyway"
            );
        }

        let timeout = self.config.deadline(kind);
        let deadline = Instant::now() + timeout;
        let registered = {
            let mut pending = lock(&self.pending);
            (!pending.is_closed()).then(|| pending.register(kind, deadline))
        };
        let Some((id, mut rx)) = registered else {
            return Self::refused(kind);
        };

        if let Err(e) = self.frame.post(id, &command).await {
            lock(&self.pending).expire(id);
            warn!(request_id = id, %kind, error = %e, "offscreen: could not reach frame");
            return RequestOutcome::Resolved(kind.error_response(ErrorBody::from_error(&e)));
        }
        debug!(request_id = id, %kind, "offscreen: request forwarded");

        let settled = match tokio::time::timeout_at(deadline, &mut rx).await {
            Ok(settled) => settled,
            Err(_) => {
                let expired = lock(&self.pending).expire(id);
                if expired {
                    warn!(request_id = id, %kind, "offscreen: request timed out");
                    let err = BridgeError::Timeout { kind, deadline: timeout };
                    return RequestOutcome::TimedOut(kind.error_response(ErrorBody::from_error(&err)));
                }
                // Settled in the same tick the deadline fired; the reply wins.
                rx.await
            }
        };

        match settled {
            Ok(Settlement::Reply(event)) => {
                self.after_reply(&event).await;
                RequestOutcome::Resolved(Response::Relayed(event))
            }
            Ok(Settlement::Failed(e)) => RequestOutcome::Resolved(kind.error_response(ErrorBody::from_error(&e))),
            Ok(Settlement::Deferred) => {
                info!(request_id = id, %kind, "offscreen: sign-in continues via redirect");
                RequestOutcome::DeferredToRedirect
            }
            Err(_) => Self::refused(kind),
        }
    }

    /// Side effects of a successful reply before it goes back to the caller.
    async fn after_reply(&self, event: &FrameEvent) {
        if let FrameEvent::AuthResult { identity, id_token, refresh_token } = event {
            lock(&self.login_guard).admit(&identity.id);
            let session = Session::signed_in(identity.clone(), id_token.clone(), refresh_token.clone());
            self.persist(&session).await;
        }
    }

    // =========================================================================
    // FRAME MESSAGES
    // =========================================================================

    /// The frame element's native load event.
    pub fn on_frame_loaded(&self) {
        self.mark_ready(ReadySignal::Loaded);
    }

    fn mark_ready(&self, signal: ReadySignal) {
        if self.readiness.mark_ready(signal) {
            info!(?signal, "offscreen: frame ready");
        } else {
            debug!(?signal, "offscreen: frame already ready");
        }
    }

    /// Handle one raw message posted by the frame.
    pub async fn on_frame_message(&self, raw: &Value) {
        match parse_frame_message(raw) {
            FrameMessage::Ignored(reason) => debug!(?reason, "offscreen: ignored frame message"),
            FrameMessage::Malformed { kind, request_id, error } => {
                warn!(?kind, error = %error, "offscreen: malformed frame reply");
                self.settle(kind, request_id, Settlement::Failed(BridgeError::Parse { kind, source: error }));
            }
            FrameMessage::Event { event, request_id } => self.on_frame_event(event, request_id).await,
        }
    }

    async fn on_frame_event(&self, event: FrameEvent, request_id: Option<RequestId>) {
        let kind = event.kind();
        match event {
            FrameEvent::FrameReady => self.mark_ready(ReadySignal::ReadyMessage),
            FrameEvent::LoginSuccess { identity, id_token, refresh_token, .. } => {
                self.on_login_success(Session::signed_in(identity, id_token, refresh_token))
                    .await;
            }
            FrameEvent::AuthFallbackInProgress => self.settle(kind, request_id, Settlement::Deferred),
            FrameEvent::LogoutSuccess => {
                self.on_logout_success().await;
                self.settle(kind, request_id, Settlement::Reply(FrameEvent::LogoutSuccess));
            }
            event => self.settle(kind, request_id, Settlement::Reply(event)),
        }
    }

    fn settle(&self, kind: ReplyKind, request_id: Option<RequestId>, settlement: Settlement) {
        let resolved = lock(&self.pending).settle(kind, request_id, settlement);
        match resolved {
            Some((id, request)) => debug!(request_id = id, %request, reply = ?kind, "offscreen: request resolved"),
            None => debug!(reply = ?kind, "offscreen: no request waiting for reply, dropped"),
        }
    }

    async fn on_login_success(&self, session: Session) {
        let Some(identity_id) = session.identity_id() else {
            return;
        };
        let admitted = lock(&self.login_guard).admit(identity_id);
        if !admitted {
            info!(identity_id, "offscreen: duplicate login signal dropped");
            return;
        }

        info!(identity_id, "offscreen: login completed");
        self.persist(&session).await;
        self.coordinator
            .notify(CoordinatorEvent::LoginCompleted { session })
            .await;
    }

    async fn on_logout_success(&self) {
        lock(&self.login_guard).clear();
        if let Err(e) = self.store.clear(&self.config.session_key).await {
            warn!(error = %e, "offscreen: could not clear persisted session");
        }
        info!("offscreen: logout completed");
        self.coordinator.notify(CoordinatorEvent::LogoutCompleted).await;
    }

    async fn persist(&self, session: &Session) {
        if let Err(e) = self.store.save(&self.config.session_key, session).await {
            warn!(error = %e, "offscreen: could not persist session");
        }
    }
}

#[cfg(test)]
#[path = "bridge_test.rs"]
mod tests;
