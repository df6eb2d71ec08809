//! Correlation of dispatched feeds with their eventual acknowledgements.
//!
//! Every dispatch gets a fresh [`CorrelationId`] (written into `MSH-10`) and a [`PendingRequest`]
//! recorded in the [`CorrelationStore`]. When the registry answers, the entry is taken out of the
//! store exactly once. Entries whose response never arrives stay in the store unless the gateway
//! was configured with a pending timeout, in which case [`CorrelationStore::evict_expired`] drops
//! them.

use crate::event::{ChangeEvent, FeedKind};
use crate::gateway::ReplyTarget;
use crate::{GatewayError, GatewayResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::{fmt, str::FromStr};
use tokio::time::{Duration, Instant};
use uuid::Uuid;

/// Opaque token tying a dispatched feed to its acknowledgement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generates a new random (v4) correlation id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for CorrelationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A feed that has been sent and is waiting for its acknowledgement.
#[derive(Debug)]
pub struct PendingRequest {
    correlation_id: CorrelationId,
    event: ChangeEvent,
    reply: ReplyTarget,
    dispatched_at: Instant,
}

impl PendingRequest {
    pub fn new(correlation_id: CorrelationId, event: ChangeEvent, reply: ReplyTarget) -> Self {
        Self {
            correlation_id,
            event,
            reply,
            dispatched_at: Instant::now(),
        }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn kind(&self) -> FeedKind {
        self.event.kind()
    }

    pub fn event(&self) -> &ChangeEvent {
        &self.event
    }

    /// Consumes the request, yielding the handle used to answer the original caller.
    pub fn into_reply(self) -> ReplyTarget {
        self.reply
    }
}

/// In-flight requests keyed by correlation id.
///
/// Cloning yields another handle to the same store.
#[derive(Clone, Debug, Default)]
pub struct CorrelationStore {
    pending: Arc<Mutex<HashMap<CorrelationId, PendingRequest>>>,
}

impl CorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `request` under its correlation id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::DuplicateCorrelationId`] if the id is already pending. The existing
    /// entry is left untouched.
    pub fn put(&self, request: PendingRequest) -> GatewayResult<()> {
        let mut pending = self.pending.lock();
        let id = request.correlation_id;
        if pending.contains_key(&id) {
            return Err(GatewayError::DuplicateCorrelationId(id));
        }
        pending.insert(id, request);
        Ok(())
    }

    /// Removes and returns the entry for `id`, or `None` if nothing is pending under it.
    pub fn take_by_id(&self, id: &CorrelationId) -> Option<PendingRequest> {
        self.pending.lock().remove(id)
    }

    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.pending.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Removes every entry dispatched more than `max_age` ago and returns them.
    pub fn evict_expired(&self, max_age: Duration) -> Vec<PendingRequest> {
        let now = Instant::now();
        let mut pending = self.pending.lock();
        let expired: Vec<CorrelationId> = pending
            .iter()
            .filter(|(_, request)| now.saturating_duration_since(request.dispatched_at) > max_age)
            .map(|(id, _)| *id)
            .collect();
        expired
            .iter()
            .filter_map(|id| pending.remove(id))
            .collect()
    }
}
