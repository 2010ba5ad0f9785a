//! Deployment progress events
//!
//! The engine reports progress through a caller-supplied callback instead
//! of printing. Events are plain data; the callback decides whether they
//! become a progress bar, log lines or nothing.

use std::fmt;

/// Phase of a running deployment, in the order phases occur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPhase {
    /// Resolving the activation order and computing the diff plan
    Planning,
    /// Backups of every to-be-mutated file have been taken
    CheckpointCreated,
    /// Mutating the destination; cancellation is no longer honored
    Applying,
    /// Undoing applied actions after a failure
    RollingBack,
}

impl fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeployPhase::Planning => "planning",
            DeployPhase::CheckpointCreated => "checkpoint created",
            DeployPhase::Applying => "applying",
            DeployPhase::RollingBack => "rolling back",
        };
        f.write_str(name)
    }
}

/// Kind of mutation an [`DeployEvent::ActionCompleted`] event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionLabel {
    Remove,
    Update,
    Add,
}

impl fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionLabel::Remove => "remove",
            ActionLabel::Update => "update",
            ActionLabel::Add => "add",
        };
        f.write_str(name)
    }
}

/// One progress event emitted by the engine
#[derive(Debug, Clone)]
pub enum DeployEvent {
    PhaseChanged {
        phase: DeployPhase,
    },
    /// An action finished; `index` is zero-based within `total` actions
    ActionCompleted {
        index: usize,
        total: usize,
        label: ActionLabel,
        path: String,
    },
    /// The new state was persisted and the checkpoint discarded
    Committed {
        files: usize,
    },
    /// Every applied action was undone; the destination matches the
    /// pre-deployment state
    RolledBack {
        undone: usize,
    },
}

/// Callback receiving [`DeployEvent`]s during a deployment
pub type EventSink<'a> = dyn FnMut(DeployEvent) + 'a;

/// Sink that drops every event
pub fn discard_events() -> impl FnMut(DeployEvent) {
    |_| {}
}
