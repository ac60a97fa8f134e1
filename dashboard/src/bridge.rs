//! The dashboard bridge.
//!
//! DESIGN
//! ======
//! The dashboard window keeps its own copy of the session and only moves it
//! in response to broadcasts:
//!
//! - companion `AUTH_STATE_CHANGED` with an identity: accepted when the
//!   identity differs from the cached one or the message is newer;
//! - companion `AUTH_STATE_CHANGED` without an identity, or with the cached
//!   identity but no token: informational only, a companion emits that
//!   transiently while it reloads;
//! - host `AUTH_STATE_CHANGED`: authoritative, except that an identity
//!   without a token is a desync. That raises a warning and arms a bounded
//!   reconcile timer which forces one token refresh if nothing newer arrives;
//! - companion `COLLECTIONS_CHANGED`: refetch; host echoes are ignored.
//!
//! Session updates are applied on the run loop itself. Work that waits on a
//! collaborator (refetching collections, publishing the session) runs on its
//! own task so the loop keeps reading.
//!
//! Outgoing `COLLECTIONS_CHANGED` broadcasts are fingerprinted and suppressed
//! when the fingerprint has not changed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use envelope::{CollectionSummary, Session, collections_signature, now_ms};
use serde_json::Value;
use tokio::sync::{OnceCell, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::DashboardConfig;
use crate::error::DashboardError;
use crate::messages::{Broadcast, Origin, TokenReply};
use crate::ports::{BroadcastPort, DataLayer, IdentityProvider, Toaster};

const DESYNC_WARNING: &str = "Your session is out of sync. Reconnecting…";

// =============================================================================
// DEDUP GUARD
// =============================================================================

/// Remembers the fingerprint of the last emitted collections broadcast.
#[derive(Debug, Default)]
pub struct BroadcastDedupGuard {
    last_signature: Option<String>,
}

impl BroadcastDedupGuard {
    /// Record a signature. Returns `false` when it matches the last one.
    pub fn admit(&mut self, signature: &str) -> bool {
        if self.last_signature.as_deref() == Some(signature) {
            return false;
        }
        self.last_signature = Some(signature.to_owned());
        true
    }

    #[must_use]
    pub fn last_signature(&self) -> Option<&str> {
        self.last_signature.as_deref()
    }
}

// =============================================================================
// INBOUND
// =============================================================================

#[derive(Debug)]
pub enum Inbound {
    /// A raw window-level broadcast.
    Broadcast(Value),
    /// A fresh-token request with its own reply channel.
    FreshToken(oneshot::Sender<TokenReply>),
    /// The dashboard's own collections changed.
    CollectionsUpdated(Vec<CollectionSummary>),
    Shutdown,
}

/// Work a broadcast asks for beyond updating the cached session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FollowUp {
    RefetchCollections,
    PublishSession,
}

/// Ask a running bridge for a fresh token over a dedicated channel.
///
/// # Errors
///
/// Returns [`DashboardError::ChannelClosed`] when the bridge is not running
/// or stopped before answering.
pub async fn request_fresh_token(inbound: &mpsc::Sender<Inbound>) -> Result<TokenReply, DashboardError> {
    let (tx, rx) = oneshot::channel();
    inbound
        .send(Inbound::FreshToken(tx))
        .await
        .map_err(|_| DashboardError::ChannelClosed)?;
    rx.await.map_err(|_| DashboardError::ChannelClosed)
}

// =============================================================================
// BRIDGE
// =============================================================================

#[derive(Default)]
struct BridgeState {
    session: Session,
    /// Timestamp of the broadcast the cached session came from.
    session_ts: i64,
    dedup: BroadcastDedupGuard,
    /// Bumped on every accepted session change; an armed reconcile timer only
    /// fires if the generation it captured is still current.
    reconcile_generation: u64,
    reconcile_armed: bool,
}

impl BridgeState {
    fn replace_session(&mut self, session: Session, ts: i64) {
        self.session = session;
        self.session_ts = ts;
        self.reconcile_generation += 1;
        self.reconcile_armed = false;
    }
}

#[derive(Clone)]
pub struct DashboardBridge {
    config: Arc<DashboardConfig>,
    state: Arc<Mutex<BridgeState>>,
    initialized: Arc<OnceCell<()>>,
    identity: Arc<dyn IdentityProvider>,
    data: Arc<dyn DataLayer>,
    toaster: Arc<dyn Toaster>,
    broadcast: Arc<dyn BroadcastPort>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DashboardBridge {
    pub fn new(
        config: DashboardConfig,
        identity: Arc<dyn IdentityProvider>,
        data: Arc<dyn DataLayer>,
        toaster: Arc<dyn Toaster>,
        broadcast: Arc<dyn BroadcastPort>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(Mutex::new(BridgeState::default())),
            initialized: Arc::new(OnceCell::new()),
            identity,
            data,
            toaster,
            broadcast,
        }
    }

    /// Copy of the cached session.
    #[must_use]
    pub fn session(&self) -> Session {
        lock(&self.state).session.clone()
    }

    #[must_use]
    pub fn reconcile_armed(&self) -> bool {
        lock(&self.state).reconcile_armed
    }

    pub async fn run(self, mut inbound: mpsc::Receiver<Inbound>) {
        while let Some(message) = inbound.recv().await {
            match message {
                Inbound::Broadcast(raw) => {
                    if let Some(work) = self.apply_broadcast(&raw) {
                        let bridge = self.clone();
                        tokio::spawn(async move { bridge.follow_up(work).await });
                    }
                }
                Inbound::FreshToken(reply) => {
                    let bridge = self.clone();
                    tokio::spawn(async move {
                        let answer = bridge.fresh_id_token().await;
                        if reply.send(answer).is_err() {
                            debug!("dashboard: fresh-token requester went away");
                        }
                    });
                }
                Inbound::CollectionsUpdated(collections) => {
                    self.collections_changed(&collections).await;
                }
                Inbound::Shutdown => break,
            }
        }
        info!("dashboard: bridge stopped");
    }

    // =========================================================================
    // INBOUND BROADCASTS
    // =========================================================================

    /// Handle one broadcast to completion, follow-up work included.
    pub async fn on_broadcast(&self, raw: &Value) {
        if let Some(work) = self.apply_broadcast(raw) {
            self.follow_up(work).await;
        }
    }

    /// Apply a broadcast's effect on the cached session and report any
    /// follow-up work it asks for.
    fn apply_broadcast(&self, raw: &Value) -> Option<FollowUp> {
        let message = match Broadcast::decode(raw) {
            Ok(Some(message)) => message,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "dashboard: ignored broadcast");
                return None;
            }
        };

        match message {
            Broadcast::AuthStateChanged { origin: Origin::Companion, session, ts } => {
                self.on_companion_session(session, ts);
                None
            }
            Broadcast::AuthStateChanged { origin: Origin::Host, session, ts } => {
                self.on_host_session(session, ts);
                None
            }
            Broadcast::CollectionsChanged { origin: Origin::Companion, .. } => Some(FollowUp::RefetchCollections),
            Broadcast::CollectionsChanged { origin: Origin::Host, .. } => {
                debug!("dashboard: ignored own collections echo");
                None
            }
            Broadcast::RequestCurrentSession => Some(FollowUp::PublishSession),
        }
    }

    async fn follow_up(&self, work: FollowUp) {
        match work {
            FollowUp::RefetchCollections => {
                info!("dashboard: companion changed collections, refetching");
                if let Err(e) = self.data.refetch_collections().await {
                    warn!(error = %e, "dashboard: collections refetch failed");
                }
            }
            FollowUp::PublishSession => {
                self.publish_session().await;
            }
        }
    }

    fn on_companion_session(&self, session: Session, ts: i64) {
        let Some(identity_id) = session.identity_id().map(str::to_owned) else {
            debug!("dashboard: companion reported no identity, keeping cached session");
            return;
        };

        let mut state = lock(&self.state);
        let differs = state.session.identity_id() != Some(identity_id.as_str());
        if !differs && session.is_desynchronized() {
            debug!(identity_id, ts, "dashboard: companion reported no token, keeping cached session");
            return;
        }
        if !differs && ts <= state.session_ts {
            debug!(identity_id, ts, "dashboard: stale companion session ignored");
            return;
        }
        state.replace_session(session, ts);
        info!(identity_id, ts, "dashboard: session updated from companion");
    }

    fn on_host_session(&self, session: Session, ts: i64) {
        if session.is_desynchronized() {
            let identity_id = session.identity_id().unwrap_or_default().to_owned();
            warn!(identity_id, "dashboard: host session has identity but no token");
            self.toaster.warn(DESYNC_WARNING);
            self.arm_reconcile(identity_id);
            return;
        }

        let identity_id = session.identity_id().map(str::to_owned);
        lock(&self.state).replace_session(session, ts);
        match identity_id {
            Some(identity_id) => info!(identity_id, "dashboard: host session accepted"),
            None => info!("dashboard: host signed out"),
        }
    }

    /// Arm the single reconcile timer. Re-arming replaces a pending one.
    fn arm_reconcile(&self, identity_id: String) {
        let generation = {
            let mut state = lock(&self.state);
            state.reconcile_generation += 1;
            state.reconcile_armed = true;
            state.reconcile_generation
        };

        let bridge = self.clone();
        let window = self.config.reconcile_window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let current = {
                let state = lock(&bridge.state);
                state.reconcile_armed && state.reconcile_generation == generation
            };
            if current {
                bridge.reconcile(&identity_id).await;
            }
        });
    }

    async fn reconcile(&self, identity_id: &str) {
        info!(identity_id, "dashboard: session still out of sync, forcing token refresh");
        match self.fresh_id_token().await {
            TokenReply::Tokens { id_token, refresh_token, identity } => {
                let session = Session::signed_in(identity, id_token, refresh_token);
                lock(&self.state).replace_session(session.clone(), now_ms());
                self.emit_session(session).await;
            }
            TokenReply::Error { error, message } => {
                lock(&self.state).reconcile_armed = false;
                warn!(identity_id, error, message, "dashboard: reconcile refresh failed");
            }
        }
    }

    // =========================================================================
    // TOKENS AND SESSION
    // =========================================================================

    /// Wait for identity-provider initialization once per bridge. Concurrent
    /// callers share the same in-flight wait.
    async fn ensure_initialized(&self) -> Result<(), DashboardError> {
        self.initialized
            .get_or_try_init(|| self.identity.initialize())
            .await?;
        Ok(())
    }

    /// Force-refresh tokens for the current identity.
    pub async fn fresh_id_token(&self) -> TokenReply {
        match self.try_fresh_id_token().await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "dashboard: fresh token request failed");
                TokenReply::from_error(&e)
            }
        }
    }

    async fn try_fresh_id_token(&self) -> Result<TokenReply, DashboardError> {
        self.ensure_initialized().await?;
        let identity = self
            .identity
            .current_identity()
            .await
            .ok_or(DashboardError::NoUser)?;
        let tokens = self.identity.fresh_tokens(true).await?;
        debug!(identity_id = identity.id.as_str(), "dashboard: fresh token minted");
        Ok(TokenReply::Tokens { id_token: tokens.id_token, refresh_token: tokens.refresh_token, identity })
    }

    /// Compute the current session from the identity provider and broadcast
    /// it. Falls back to the cached session if the provider cannot answer.
    pub async fn publish_session(&self) -> Session {
        let session = match self.current_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "dashboard: could not compute session, publishing cached copy");
                self.session()
            }
        };
        self.emit_session(session.clone()).await;
        session
    }

    async fn current_session(&self) -> Result<Session, DashboardError> {
        self.ensure_initialized().await?;
        let Some(identity) = self.identity.current_identity().await else {
            return Ok(Session::signed_out());
        };
        let tokens = self.identity.fresh_tokens(false).await?;
        Ok(Session::signed_in(identity, tokens.id_token, tokens.refresh_token))
    }

    async fn emit_session(&self, session: Session) {
        let message = Broadcast::AuthStateChanged { origin: Origin::Host, session, ts: now_ms() };
        self.broadcast.emit(message).await;
    }

    // =========================================================================
    // OUTBOUND COLLECTIONS
    // =========================================================================

    /// Announce a change of the dashboard's collections unless it repeats the
    /// last announcement. Returns whether a broadcast went out.
    pub async fn collections_changed(&self, collections: &[CollectionSummary]) -> bool {
        let signature = collections_signature(collections);
        let admitted = lock(&self.state).dedup.admit(&signature);
        if !admitted {
            debug!(signature, "dashboard: collections unchanged, broadcast suppressed");
            return false;
        }

        info!(count = collections.len(), "dashboard: broadcasting collections change");
        let message = Broadcast::CollectionsChanged { origin: Origin::Host, signature: Some(signature), ts: now_ms() };
        self.broadcast.emit(message).await;
        true
    }
}

#[cfg(test)]
#[path = "bridge_test.rs"]
mod tests;
