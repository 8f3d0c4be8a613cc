//! Motion arbitration: at most one continuous action drives the actuators.
//!
//! The arbiter owns a single slot. A voice-triggered action takes the slot with
//! [`Arbiter::acquire`] and holds it through an [`ActionLease`]; gesture-follow
//! is the background action and only writes while the slot is idle.
//!
//! ```text
//!   acquire(new) ──► slot = Handover ──► cancel(old token) ──► wait(old released)
//!                                                                   │
//!   old task: observes cancel ─► settle ─► drop lease ─► released ◄─┘
//!                                                                   │
//!                                          slot = Held(new) ◄───────┘
//! ```
//!
//! Every lease has its own cancellation token, and a new holder is handed its
//! lease only after the previous one has confirmed release, so two writers
//! never overlap.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Identity of one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ActionId(u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Holder {
    id: ActionId,
    label: String,
    token: CancellationToken,
    released: oneshot::Receiver<()>,
}

enum Slot {
    Idle,
    /// An acquire is waiting for the previous holder to let go.
    Handover,
    Held(Holder),
}

struct ArbiterState {
    slot: Slot,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Single-slot owner of actuator write access.
pub struct Arbiter {
    state: Arc<Mutex<ArbiterState>>,
    acquire_gate: Mutex<()>,
    next_id: AtomicU64,
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Arbiter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ArbiterState { slot: Slot::Idle })),
            acquire_gate: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Take the slot for a new action.
    ///
    /// Cancels the current holder, then blocks until it drops its lease. Call
    /// from a plain thread, never from async code or while holding a lease.
    pub fn acquire(&self, label: impl Into<String>) -> ActionLease {
        let label = label.into();
        let _gate = lock(&self.acquire_gate);

        let previous = std::mem::replace(&mut lock(&self.state).slot, Slot::Handover);
        if let Slot::Held(holder) = previous {
            info!(
                target: "mimic::arbiter",
                preempted = %holder.id,
                preempted_label = %holder.label,
                by = %label,
                "preempting current action"
            );
            holder.token.cancel();
            // A dropped sender also means the holder is gone.
            let _ = holder.released.blocking_recv();
            debug!(target: "mimic::arbiter", released = %holder.id, "previous holder released");
        }

        let id = ActionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let token = CancellationToken::new();
        let (release_tx, released) = oneshot::channel();
        lock(&self.state).slot = Slot::Held(Holder {
            id,
            label: label.clone(),
            token: token.clone(),
            released,
        });
        debug!(target: "mimic::arbiter", %id, %label, "slot acquired");

        ActionLease {
            id,
            label,
            token,
            release_tx: Some(release_tx),
            state: Arc::clone(&self.state),
        }
    }

    /// Ask the current holder to stop without waiting for it.
    pub fn cancel_current(&self) -> Option<ActionId> {
        match &lock(&self.state).slot {
            Slot::Held(holder) => {
                holder.token.cancel();
                Some(holder.id)
            }
            _ => None,
        }
    }

    /// True when no action holds the slot and none is being handed over.
    pub fn is_idle(&self) -> bool {
        matches!(lock(&self.state).slot, Slot::Idle)
    }

    /// Id and label of the current holder.
    pub fn current(&self) -> Option<(ActionId, String)> {
        match &lock(&self.state).slot {
            Slot::Held(holder) => Some((holder.id, holder.label.clone())),
            _ => None,
        }
    }

    /// True once `id` is no longer the live holder: it was cancelled, replaced
    /// or released.
    pub fn is_cancelled(&self, id: ActionId) -> bool {
        match &lock(&self.state).slot {
            Slot::Held(holder) if holder.id == id => holder.token.is_cancelled(),
            _ => true,
        }
    }

    /// Run `f` only if the slot is idle, keeping it idle for the duration.
    /// This is how the background gesture-follow action writes.
    pub fn run_if_idle<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let state = lock(&self.state);
        match state.slot {
            Slot::Idle => Some(f()),
            _ => None,
        }
    }
}

/// Exclusive write access for one action. Dropping it confirms release.
pub struct ActionLease {
    id: ActionId,
    label: String,
    token: CancellationToken,
    release_tx: Option<oneshot::Sender<()>>,
    state: Arc<Mutex<ArbiterState>>,
}

impl ActionLease {
    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Polled once per iteration by the holding task.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl fmt::Debug for ActionLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionLease")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Drop for ActionLease {
    fn drop(&mut self) {
        {
            let mut state = lock(&self.state);
            if matches!(&state.slot, Slot::Held(h) if h.id == self.id) {
                state.slot = Slot::Idle;
            }
        }
        if let Some(tx) = self.release_tx.take() {
            let _ = tx.send(());
        }
        debug!(target: "mimic::arbiter", id = %self.id, label = %self.label, "lease released");
    }
}
