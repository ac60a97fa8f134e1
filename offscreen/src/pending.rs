//! Outstanding requests awaiting exactly one reply from the frame.
//!
//! DESIGN
//! ======
//! Each request gets a monotonic id and a oneshot. A reply resolves the
//! request whose id it echoes, or, when the frame does not echo ids, the
//! oldest outstanding request that accepts its discriminant. Resolution
//! removes the entry, so a second matching reply finds nothing to resolve
//! and is dropped. Expiry removes the entry too, which is how late replies
//! are ignored.

use std::collections::BTreeMap;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::BridgeError;
use crate::protocol::{FrameEvent, ReplyKind};
use crate::request::RequestKind;

/// Correlation id of one outstanding request.
pub type RequestId = u64;

/// What a pending request is resolved with.
#[derive(Debug)]
pub enum Settlement {
    /// A well-formed reply of an accepted kind.
    Reply(FrameEvent),
    /// A reply of an accepted kind whose payload failed to decode.
    Failed(BridgeError),
    /// The frame took the redirect path; the result arrives elsewhere.
    Deferred,
}

struct PendingEntry {
    kind: RequestKind,
    deadline: Instant,
    tx: oneshot::Sender<Settlement>,
}

/// Ordered table of outstanding requests.
#[derive(Default)]
pub struct PendingTable {
    next_id: RequestId,
    entries: BTreeMap<RequestId, PendingEntry>,
    closed: bool,
}

impl PendingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new outstanding request and hand back its receiver.
    ///
    /// A closed table still hands out an id, but the receiver is already
    /// closed.
    pub fn register(&mut self, kind: RequestKind, deadline: Instant) -> (RequestId, oneshot::Receiver<Settlement>) {
        self.next_id += 1;
        let id = self.next_id;
        let (tx, rx) = oneshot::channel();
        if !self.closed {
            self.entries.insert(id, PendingEntry { kind, deadline, tx });
        }
        (id, rx)
    }

    /// Pick the request a reply belongs to, if any is still waiting for it.
    fn claim(&self, reply: ReplyKind, request_id: Option<RequestId>) -> Option<RequestId> {
        if let Some(id) = request_id {
            return self
                .entries
                .get(&id)
                .filter(|entry| entry.kind.accepts(reply))
                .map(|_| id);
        }
        self.entries
            .iter()
            .find(|(_, entry)| entry.kind.accepts(reply))
            .map(|(id, _)| *id)
    }

    /// Resolve the request a reply belongs to. First reply wins.
    ///
    /// Returns the resolved request, or `None` when nothing was waiting for
    /// this reply (duplicate, late, or unsolicited).
    pub fn settle(
        &mut self,
        reply: ReplyKind,
        request_id: Option<RequestId>,
        settlement: Settlement,
    ) -> Option<(RequestId, RequestKind)> {
        let id = self.claim(reply, request_id)?;
        let entry = self.entries.remove(&id)?;
        // The receiver is gone only if its caller already stopped waiting.
        let _ = entry.tx.send(settlement);
        Some((id, entry.kind))
    }

    /// Drop a request whose deadline passed.
    ///
    /// Returns `false` when the request had already been resolved, in which
    /// case its settlement is sitting in the receiver.
    pub fn expire(&mut self, id: RequestId) -> bool {
        self.entries.remove(&id).is_some()
    }

    #[must_use]
    pub fn contains(&self, id: RequestId) -> bool {
        self.entries.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outstanding requests in registration order.
    #[must_use]
    pub fn outstanding(&self) -> Vec<(RequestId, RequestKind, Instant)> {
        self.entries
            .iter()
            .map(|(id, entry)| (*id, entry.kind, entry.deadline))
            .collect()
    }

    /// Forget every outstanding request. Their callers observe a closed channel.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    /// Clear the table and refuse every later registration.
    pub fn close(&mut self) -> usize {
        self.closed = true;
        self.clear()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
#[path = "pending_test.rs"]
mod tests;
