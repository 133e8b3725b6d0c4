//! # pagesmith-orchestrator
//!
//! Task workflow for Pagesmith.
//!
//! This crate provides:
//! - The pure workflow state machine (`Preparing` through `Done`/`Failed`)
//! - The [`Coordinator`] that performs each step in order
//! - Best-effort result notification
//! - Per-task working directories and per-repository run serialization
//!
//! Every accepted task is one independent run. There is no cancellation once
//! a run starts; it ends in a terminal state or with the process.

mod coordinator;
mod locks;
mod notify;
mod state_machine;
mod workspace;

pub use coordinator::{Collaborators, Coordinator, WorkflowOutcome};
pub use locks::{RepoGuard, RepoLocks};
pub use notify::{
    CallbackTransport, HttpCallback, NotificationOutcome, Notifier, RecordingCallback,
    CALLBACK_TIMEOUT,
};
pub use state_machine::{begin, transition, Action, Event, WorkflowState};
pub use workspace::TaskWorkspace;
