//! # Messages
//!
//! Contains constant strings and format functions for user-facing messages.
//! Includes routing outcomes, confirmation prompts and workspace results.

use crate::domain::types::{ActionPlan, PlanStatus};

pub const UNKNOWN_COMMAND: &str = "❓ Unknown command. Type `.help` for the list.";
pub const NOT_AN_ACTION: &str = "🤷 That doesn't look like something I can do on this PC.";
pub const CANCELLED: &str = "🛑 **Cancelled.**";
pub const NO_PENDING_CONFIRMATION: &str = "There is no question waiting for an answer.";
pub const BRIDGE_DISCONNECTED: &str =
    "⚠️ No executor has polled recently; the action will run once one connects.";
pub const HISTORY_EMPTY: &str = "No actions recorded yet.";
pub const NO_FILES: &str = "No files.";

pub const CONFIRM_USAGE: &str = "Usage: `.confirm <option number or text>`";
pub const READ_USAGE: &str = "Usage: `.read <name>`";
pub const WRITE_USAGE: &str = "Usage: `.write <name> <content>`";
pub const SCRIPT_USAGE: &str = "Usage: `.script <name> <content>`";
pub const DELETE_USAGE: &str = "Usage: `.delete <name>`";
pub const RUN_USAGE: &str = "Usage: `.run <name> [args...]`";

pub fn blocked(reason: &str) -> String {
    format!("🚫 **Blocked**: {reason}")
}

pub fn suggestion(hint: &str) -> String {
    format!("🤷 I couldn't turn that into an action. {hint}")
}

pub fn queued(plan: &ActionPlan) -> String {
    format!("✅ **Queued**: {} ({} steps)", plan.description, plan.steps.len())
}

pub fn confirmation_prompt(question: &str, options: &[String]) -> String {
    let mut text = format!("❔ **{question}**\n");
    for (i, option) in options.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", i + 1, option));
    }
    text.push_str("Reply with `.confirm <number>`.");
    text
}

pub fn modified(command: &str) -> String {
    format!("🔁 Running instead: `{command}`")
}

pub fn confirmation_failed(err: &str) -> String {
    format!("⚠️ {err}")
}

pub fn status_line(plan: &ActionPlan) -> String {
    let icon = match plan.status {
        PlanStatus::Pending => "⏳",
        PlanStatus::Completed => "✅",
        PlanStatus::Failed => "❌",
    };
    let when = plan
        .queued_at
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());
    match &plan.error {
        Some(err) => format!("{icon} [{when}] {} ({}): {err}", plan.description, plan.intent),
        None => format!("{icon} [{when}] {} ({})", plan.description, plan.intent),
    }
}

pub fn status_summary(pending: usize, connected: bool, awaiting: usize) -> String {
    let bridge = if connected { "connected" } else { "not connected" };
    format!("**Status**\n* Pending plans: {pending}\n* Executor: {bridge}\n* Open questions: {awaiting}")
}

pub fn file_written(name: &str, bytes: usize) -> String {
    format!("💾 Saved `{name}` ({bytes} bytes)")
}

pub fn file_deleted(name: &str) -> String {
    format!("🗑️ Deleted `{name}`")
}

pub fn file_read_success(name: &str, content: &str) -> String {
    format!("**File: {name}**\n\n```\n{content}\n```")
}

pub fn script_finished(name: &str, summary: &str, stdout: &str, stderr: &str) -> String {
    let mut text = format!("**{name}**: {summary}");
    if !stdout.trim().is_empty() {
        text.push_str(&format!("\n```\n{}\n```", stdout.trim_end()));
    }
    if !stderr.trim().is_empty() {
        text.push_str(&format!("\n--- STDERR ---\n```\n{}\n```", stderr.trim_end()));
    }
    text
}

pub fn workspace_error(err: &str) -> String {
    format!("❌ {err}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_prompt_numbers_options() {
        let text = confirmation_prompt("Sure?", &["Yes".to_string(), "Cancel".to_string()]);
        assert!(text.contains("1. Yes\n2. Cancel\n"));
    }
}
