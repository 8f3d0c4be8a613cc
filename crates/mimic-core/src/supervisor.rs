//! Action supervisor: the single owner that starts voice-triggered motions.
//!
//! Requests are queued and handled strictly in order on one worker thread. For
//! each request the worker takes the arbiter slot (which cancels the running
//! action and waits for it to let go), joins the old action thread, and only
//! then spawns the new one. Preemption is therefore sequential: the previous
//! task has fully exited before the next writes a single joint.

use crate::actuator::ActuatorBank;
use crate::arbiter::{ActionId, ActionLease, Arbiter};
use crate::error::{CoreError, CoreResult};
use crate::library::MotionLibrary;
use crate::motion::{MotionKind, MotionPlayer, StopReason};
use crate::stepper::{StepOutcome, Stepper};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Shared robot handles every action needs. Passed in, never global.
#[derive(Clone)]
pub struct ActionContext {
    pub bank: Arc<ActuatorBank>,
    pub arbiter: Arc<Arbiter>,
    pub stepper: Arc<dyn Stepper>,
}

/// How an action ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Tick budget spent (stand) or nothing to play (stop).
    Completed,
    Preempted,
    /// The simulator shut down underneath it.
    Shutdown,
    Failed(String),
}

/// Lifecycle events of supervised actions.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ActionEvent {
    Started {
        id: ActionId,
        kind: MotionKind,
        timestamp: DateTime<Utc>,
    },
    Finished {
        id: ActionId,
        kind: MotionKind,
        outcome: ActionOutcome,
        ticks: u32,
        timestamp: DateTime<Utc>,
    },
    /// The request could not start; the current action keeps running.
    Rejected {
        kind: MotionKind,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// A queued start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionRequest {
    pub kind: MotionKind,
    pub requested_at: DateTime<Utc>,
}

impl ActionRequest {
    pub fn new(kind: MotionKind) -> Self {
        Self {
            kind,
            requested_at: now(),
        }
    }
}

enum SupervisorMsg {
    Start(ActionRequest),
    Shutdown,
}

/// Cloneable handle for submitting start requests.
#[derive(Clone)]
pub struct ActionSender {
    tx: mpsc::UnboundedSender<SupervisorMsg>,
}

impl ActionSender {
    /// Queue `kind` to preempt whatever is running. Never blocks.
    pub fn request(&self, kind: MotionKind) -> CoreResult<()> {
        self.tx
            .send(SupervisorMsg::Start(ActionRequest::new(kind)))
            .map_err(|_| CoreError::ChannelClosed("action supervisor".to_string()))
    }
}

/// Owns the worker thread that sequences action starts.
pub struct ActionSupervisor {
    sender: ActionSender,
    worker: Option<JoinHandle<()>>,
}

impl ActionSupervisor {
    /// Start the worker. Returns the supervisor and its event stream; fails
    /// only if the OS refuses the thread.
    pub fn spawn(
        ctx: ActionContext,
        library: MotionLibrary,
    ) -> CoreResult<(Self, mpsc::UnboundedReceiver<ActionEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let worker = thread::Builder::new()
            .name("mimic-supervisor".to_string())
            .spawn(move || supervise(ctx, library, rx, event_tx))?;
        info!(target: "mimic::arbiter", "action supervisor started");

        let supervisor = Self {
            sender: ActionSender { tx },
            worker: Some(worker),
        };
        Ok((supervisor, event_rx))
    }

    pub fn sender(&self) -> ActionSender {
        self.sender.clone()
    }

    pub fn request(&self, kind: MotionKind) -> CoreResult<()> {
        self.sender.request(kind)
    }

    /// Cancel the running action and join every thread. Requests queued
    /// before this call are still started (and immediately preempted) in order.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        let _ = self.sender.tx.send(SupervisorMsg::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!(target: "mimic::arbiter", "action supervisor panicked");
            }
            info!(target: "mimic::arbiter", "action supervisor stopped");
        }
    }
}

impl Drop for ActionSupervisor {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

fn join_action(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!(target: "mimic::motion", "action thread panicked");
    }
}

fn supervise(
    ctx: ActionContext,
    library: MotionLibrary,
    mut rx: mpsc::UnboundedReceiver<SupervisorMsg>,
    events: mpsc::UnboundedSender<ActionEvent>,
) {
    let mut running: Option<JoinHandle<()>> = None;

    while let Some(SupervisorMsg::Start(request)) = rx.blocking_recv() {
        let kind = request.kind;
        let player = match library.player(kind) {
            Ok(p) => p,
            Err(e) => {
                warn!(target: "mimic::motion", %kind, error = %e, "action rejected");
                let _ = events.send(ActionEvent::Rejected {
                    kind,
                    reason: e.to_string(),
                    timestamp: now(),
                });
                continue;
            }
        };

        let lease = ctx.arbiter.acquire(kind.to_string());
        if let Some(previous) = running.take() {
            join_action(previous);
        }

        let id = lease.id();
        let waited_ms = (now() - request.requested_at).num_milliseconds();
        info!(target: "mimic::motion", %id, %kind, waited_ms, "▶ action started");
        let _ = events.send(ActionEvent::Started {
            id,
            kind,
            timestamp: now(),
        });

        let action_ctx = ctx.clone();
        let action_events = events.clone();
        let spawned = thread::Builder::new()
            .name(format!("mimic-action-{kind}"))
            .spawn(move || run_action(action_ctx, player, lease, action_events));
        match spawned {
            Ok(handle) => running = Some(handle),
            // The closure, and with it the lease, is dropped on failure.
            Err(e) => {
                error!(target: "mimic::motion", %id, %kind, error = %e, "could not start action thread");
                let _ = events.send(ActionEvent::Finished {
                    id,
                    kind,
                    outcome: ActionOutcome::Failed(e.to_string()),
                    ticks: 0,
                    timestamp: now(),
                });
            }
        }
    }

    ctx.arbiter.cancel_current();
    if let Some(previous) = running.take() {
        join_action(previous);
    }
}

fn run_action(
    ctx: ActionContext,
    mut player: MotionPlayer,
    lease: ActionLease,
    events: mpsc::UnboundedSender<ActionEvent>,
) {
    let outcome = loop {
        if ctx.stepper.step() == StepOutcome::Shutdown {
            break ActionOutcome::Shutdown;
        }
        match player.step(&lease, &ctx.bank) {
            Ok(true) => {}
            Ok(false) => match player.stop_reason() {
                Some(StopReason::Preempted) => break ActionOutcome::Preempted,
                _ => break ActionOutcome::Completed,
            },
            Err(e) => {
                warn!(target: "mimic::motion", kind = %player.kind(), error = %e, "trajectory failed");
                break ActionOutcome::Failed(e.to_string());
            }
        }
    };

    player.finish(&ctx.bank);
    let id = lease.id();
    drop(lease);

    info!(
        target: "mimic::motion",
        %id,
        kind = %player.kind(),
        ticks = player.ticks(),
        outcome = ?outcome,
        "■ action finished"
    );
    let _ = events.send(ActionEvent::Finished {
        id,
        kind: player.kind(),
        outcome,
        ticks: player.ticks(),
        timestamp: now(),
    });
}
