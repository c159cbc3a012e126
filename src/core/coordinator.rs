//! Async request coordinator
//!
//! Issues resize and spawn requests to the inventory collaborator and folds
//! their completions back into one outcome per request. Completions travel
//! over an unbounded channel, so a collaborator may answer from any task; the
//! coordinator only drains them from the UI thread in [`RequestCoordinator::process`].
//!
//! Every request remembers the generation it was issued against. Anything that
//! resolves after that generation stopped being current is dropped without
//! reaching the UI.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::host::InventoryService;
use crate::panels::{Generation, PanelKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// What a request's result must still be relevant to when it resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Issued from a live panel instance
    Panel {
        kind: PanelKind,
        generation: Generation,
    },
    /// Issued by a background workflow for one player session
    Session(Generation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    QuantityChange { current: i64, target: i64 },
    SpawnBatch { item_id: String, count: usize },
}

impl RequestKind {
    /// Signed slot delta for resize requests; `None` when it overflows
    pub fn offset(&self) -> Option<i64> {
        match self {
            RequestKind::QuantityChange { current, target } => target.checked_sub(*current),
            RequestKind::SpawnBatch { .. } => None,
        }
    }
}

/// Running counters for a batch of independent units.
///
/// `failed` includes units that never answered before the deadline;
/// `timed_out` counts those separately for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchTally {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl BatchTally {
    pub fn new(requested: usize) -> Self {
        Self {
            requested,
            ..Self::default()
        }
    }

    pub fn pending(&self) -> usize {
        self.requested
            .saturating_sub(self.succeeded + self.failed)
    }

    pub fn is_settled(&self) -> bool {
        self.pending() == 0
    }

    pub fn all_succeeded(&self) -> bool {
        self.is_settled() && self.failed == 0
    }
}

impl fmt::Display for BatchTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} succeeded", self.succeeded, self.requested)?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if self.timed_out > 0 {
            write!(f, " ({} timed out)", self.timed_out)?;
        }
        Ok(())
    }
}

/// Normalized result handed to the UI refresh path
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Succeeded(i64),
    Failed(String),
    Batch(BatchTally),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub id: RequestId,
    pub origin: Origin,
    pub kind: RequestKind,
    pub outcome: Outcome,
}

/// Returned by every submit call. `immediate` is set when the request
/// resolved without contacting the collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub id: RequestId,
    pub immediate: Option<Outcome>,
}

#[derive(Debug)]
struct Completion {
    id: RequestId,
    result: Result<i64, String>,
}

/// One-shot answer handle given to a collaborator for a single unit of work.
///
/// Dropping it without answering reports a failure for that unit.
#[derive(Debug)]
pub struct Completer {
    id: RequestId,
    tx: mpsc::UnboundedSender<Completion>,
    answered: bool,
}

impl Completer {
    pub fn succeed(mut self, value: i64) {
        self.send(Ok(value));
    }

    pub fn fail(mut self, reason: impl Into<String>) {
        self.send(Err(reason.into()));
    }

    fn send(&mut self, result: Result<i64, String>) {
        if self.answered {
            return;
        }
        self.answered = true;
        // Receiver gone means the coordinator itself was dropped
        let _ = self.tx.send(Completion {
            id: self.id,
            result,
        });
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        if !self.answered {
            self.send(Err("request dropped without an answer".to_string()));
        }
    }
}

/// One outstanding operation
#[derive(Debug)]
pub struct PendingRequest {
    pub id: RequestId,
    pub origin: Origin,
    pub kind: RequestKind,
    pub issued_at: Instant,
    pub deadline: Instant,
    tally: BatchTally,
}

impl PendingRequest {
    fn into_resolution(self, outcome: Outcome) -> Resolution {
        Resolution {
            id: self.id,
            origin: self.origin,
            kind: self.kind,
            outcome,
        }
    }
}

pub struct RequestCoordinator {
    next_id: u64,
    pending: BTreeMap<RequestId, PendingRequest>,
    ready: VecDeque<Resolution>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    timeout: Duration,
    discarded: u64,
}

impl RequestCoordinator {
    pub fn new(timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            next_id: 1,
            pending: BTreeMap::new(),
            ready: VecDeque::new(),
            tx,
            rx,
            timeout,
            discarded: 0,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Resolutions dropped because their origin went stale
    pub fn discarded_count(&self) -> u64 {
        self.discarded
    }

    fn allocate_id(&mut self) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        id
    }

    fn completer(&self, id: RequestId) -> Completer {
        Completer {
            id,
            tx: self.tx.clone(),
            answered: false,
        }
    }

    /// Resize to `target`. A zero offset succeeds at once and the collaborator
    /// is never contacted.
    pub fn submit_quantity_change(
        &mut self,
        origin: Origin,
        current: i64,
        target: i64,
        service: &mut dyn InventoryService,
        now: Instant,
    ) -> Ticket {
        let id = self.allocate_id();
        let kind = RequestKind::QuantityChange { current, target };
        let immediate = match kind.offset() {
            Some(0) => {
                debug!("{}: target {} is already the current size", id, target);
                Some(Outcome::Succeeded(target))
            }
            Some(_) => None,
            None => {
                warn!("{}: offset from {} to {} is out of range", id, current, target);
                Some(Outcome::Failed(format!(
                    "cannot resize from {} to {}",
                    current, target
                )))
            }
        };

        if let Some(outcome) = immediate {
            self.ready.push_back(Resolution {
                id,
                origin,
                kind,
                outcome: outcome.clone(),
            });
            return Ticket {
                id,
                immediate: Some(outcome),
            };
        }

        let offset = target.saturating_sub(current);
        info!(
            "{}: resizing {} -> {} (offset {:+})",
            id, current, target, offset
        );
        self.pending.insert(
            id,
            PendingRequest {
                id,
                origin,
                kind,
                issued_at: now,
                deadline: now + self.timeout,
                tally: BatchTally::new(1),
            },
        );
        service.request_quantity_change(offset, self.completer(id));

        Ticket {
            id,
            immediate: None,
        }
    }

    /// Spawn `count` units of `item_id`, one collaborator call per unit.
    pub fn submit_spawn_batch(
        &mut self,
        origin: Origin,
        item_id: &str,
        count: usize,
        service: &mut dyn InventoryService,
        now: Instant,
    ) -> Ticket {
        let id = self.allocate_id();
        let kind = RequestKind::SpawnBatch {
            item_id: item_id.to_string(),
            count,
        };

        if count == 0 {
            let outcome = Outcome::Batch(BatchTally::new(0));
            self.ready.push_back(Resolution {
                id,
                origin,
                kind,
                outcome: outcome.clone(),
            });
            return Ticket {
                id,
                immediate: Some(outcome),
            };
        }

        info!("{}: spawning {}x '{}'", id, count, item_id);
        self.pending.insert(
            id,
            PendingRequest {
                id,
                origin,
                kind,
                issued_at: now,
                deadline: now + self.timeout,
                tally: BatchTally::new(count),
            },
        );
        for _ in 0..count {
            service.request_spawn(item_id, self.completer(id));
        }

        Ticket {
            id,
            immediate: None,
        }
    }

    /// Drain completions, expire overdue requests, and return every
    /// resolution whose origin is still current.
    pub fn process<F>(&mut self, now: Instant, is_current: F) -> Vec<Resolution>
    where
        F: Fn(&Origin) -> bool,
    {
        let stale: Vec<RequestId> = self
            .pending
            .values()
            .filter(|p| !is_current(&p.origin))
            .map(|p| p.id)
            .collect();
        for id in stale {
            if let Some(request) = self.pending.remove(&id) {
                self.discarded += 1;
                debug!(
                    "{}: origin {:?} is no longer current, dropping pending request",
                    id, request.origin
                );
            }
        }

        let mut resolved = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            self.apply_completion(completion, &mut resolved);
        }
        self.expire(now, &mut resolved);

        let mut delivered = Vec::new();
        for resolution in self.ready.drain(..).chain(resolved) {
            if is_current(&resolution.origin) {
                delivered.push(resolution);
            } else {
                self.discarded += 1;
                debug!(
                    "{}: resolved after {:?} went stale, discarding",
                    resolution.id, resolution.origin
                );
            }
        }
        delivered
    }

    fn apply_completion(&mut self, completion: Completion, out: &mut Vec<Resolution>) {
        let id = completion.id;
        let Some(request) = self.pending.get_mut(&id) else {
            debug!("{}: completion arrived after the request resolved", id);
            return;
        };

        let outcome = match &request.kind {
            RequestKind::QuantityChange { .. } => match completion.result {
                Ok(size) => {
                    info!("{}: resize succeeded, new size {}", id, size);
                    Some(Outcome::Succeeded(size))
                }
                Err(reason) => {
                    warn!("{}: resize failed: {}", id, reason);
                    Some(Outcome::Failed(reason))
                }
            },
            RequestKind::SpawnBatch { item_id, .. } => {
                match completion.result {
                    Ok(instance) => {
                        request.tally.succeeded += 1;
                        debug!("{}: spawned '{}' as instance {}", id, item_id, instance);
                    }
                    Err(reason) => {
                        request.tally.failed += 1;
                        warn!("{}: failed to spawn '{}': {}", id, item_id, reason);
                    }
                }
                request
                    .tally
                    .is_settled()
                    .then_some(Outcome::Batch(request.tally))
            }
        };

        if let Some(outcome) = outcome {
            if let Some(request) = self.pending.remove(&id) {
                out.push(request.into_resolution(outcome));
            }
        }
    }

    fn expire(&mut self, now: Instant, out: &mut Vec<Resolution>) {
        let overdue: Vec<RequestId> = self
            .pending
            .values()
            .filter(|p| p.deadline <= now)
            .map(|p| p.id)
            .collect();

        for id in overdue {
            let Some(mut request) = self.pending.remove(&id) else {
                continue;
            };
            let outcome = match request.kind {
                RequestKind::QuantityChange { .. } => {
                    warn!(
                        "{}: resize timed out after {:?}",
                        id,
                        now.saturating_duration_since(request.issued_at)
                    );
                    Outcome::Failed("timed out waiting for the inventory".to_string())
                }
                RequestKind::SpawnBatch { .. } => {
                    let missing = request.tally.pending();
                    request.tally.failed += missing;
                    request.tally.timed_out = missing;
                    warn!(
                        "{}: batch timed out after {:?}, {}",
                        id,
                        now.saturating_duration_since(request.issued_at),
                        request.tally
                    );
                    Outcome::Batch(request.tally)
                }
            };
            out.push(request.into_resolution(outcome));
        }
    }
}
