//! # Domain Traits
//!
//! Abstract interfaces for the collaborators around the pipeline (chat surface,
//! advisor model, plan source, host shell).
//! Allows for pluggable implementations in the Infrastructure layer.

use async_trait::async_trait;

use crate::domain::types::{ActionPlan, ExecutionOutcome};

/// Abstract interface for the surface that talks to the user (console, chat room).
#[async_trait]
pub trait Responder: Send + Sync {
    /// Send a message to the user
    async fn send_message(&self, content: &str) -> Result<(), String>;

    /// Send a notification (warnings, status lines)
    async fn send_notification(&self, content: &str) -> Result<(), String>;
}

/// Language model consulted for confirmation decisions and multi-step splitting.
/// Its output is untrusted text.
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn complete(&self, prompt: &str, system_prompt: &str) -> Result<String, String>;
}

/// Where the execution bridge pulls plans from and reports outcomes to.
#[async_trait]
pub trait PlanSource: Send + Sync {
    /// Returns and clears all queued plans, in arrival order.
    async fn pending(&self) -> anyhow::Result<Vec<ActionPlan>>;

    /// Records the terminal outcome of a plan.
    async fn complete(&self, plan_id: &str, outcome: &ExecutionOutcome) -> anyhow::Result<()>;
}

/// Captured result of running a compiled script on the host shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Executes compiled script text on the host.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &str) -> anyhow::Result<ShellOutput>;
}

/// Receives snapshots of the action history for persistence.
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Hands over the full current history. May be written later; the latest snapshot wins.
    fn schedule(&self, entries: Vec<ActionPlan>);

    /// Writes anything outstanding and stops accepting snapshots.
    async fn close(&self);
}
