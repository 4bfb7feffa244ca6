//! # Command Handlers
//!
//! Dispatches console input: plain text goes to the [`CommandRouter`], lines
//! starting with `.` are session commands (`.confirm`, `.history`, workspace
//! file operations and so on).

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::application::negotiator::{Confirmation, ConfirmationStore};
use crate::application::queue::PlanQueue;
use crate::application::router::{CommandRouter, RouteOutcome};
use crate::domain::traits::Responder;
use crate::infrastructure::workspace::{self, Area, Workspace, WorkspaceError};
use crate::strings::{help, messages};

pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Session {
    router: Arc<CommandRouter>,
    queue: Arc<PlanQueue>,
    confirmations: Arc<ConfirmationStore>,
    workspace: Arc<Workspace>,
    connected_window: Duration,
    open_question: Mutex<Option<Confirmation>>,
}

async fn say(responder: &dyn Responder, text: &str) {
    if let Err(e) = responder.send_message(text).await {
        tracing::error!("Failed to send message: {}", e);
    }
}

async fn usage(responder: &dyn Responder, text: &str) -> Flow {
    if let Err(e) = responder.send_notification(text).await {
        tracing::error!("Failed to send notification: {}", e);
    }
    Flow::Continue
}

/// Splits `name rest...` into the first word and the remainder.
fn split_first(args: &str) -> Option<(&str, &str)> {
    let args = args.trim();
    if args.is_empty() {
        return None;
    }
    Some(match args.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim_start()),
        None => (args, ""),
    })
}

impl Session {
    pub fn new(
        router: Arc<CommandRouter>,
        queue: Arc<PlanQueue>,
        confirmations: Arc<ConfirmationStore>,
        workspace: Arc<Workspace>,
        connected_window: Duration,
    ) -> Self {
        Self {
            router,
            queue,
            confirmations,
            workspace,
            connected_window,
            open_question: Mutex::new(None),
        }
    }

    pub async fn handle_line(&self, responder: &dyn Responder, line: &str) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }
        let Some(command) = line.strip_prefix('.') else {
            let outcome = self.router.route(responder, line).await;
            if let RouteOutcome::AwaitingConfirmation(confirmation) = outcome {
                *self.open_question.lock().await = Some(confirmation);
            }
            return Flow::Continue;
        };

        let (cmd, args) = split_first(command).unwrap_or(("", ""));
        tracing::debug!("Console command cmd='{}' args='{}'", cmd, args);
        match cmd {
            "confirm" => self.handle_confirm(responder, args).await,
            "history" => self.handle_history(responder, args).await,
            "status" => self.handle_status(responder).await,
            "files" => self.handle_files(responder, args).await,
            "read" => self.handle_read(responder, args).await,
            "write" => self.handle_write(responder, Area::Files, args).await,
            "script" => self.handle_write(responder, Area::Scripts, args).await,
            "delete" => self.handle_delete(responder, args).await,
            "run" => self.handle_run(responder, args).await,
            "help" => {
                say(responder, help::MAIN).await;
                Flow::Continue
            }
            "quit" | "exit" => Flow::Quit,
            _ => usage(responder, messages::UNKNOWN_COMMAND).await,
        }
    }

    async fn handle_confirm(&self, responder: &dyn Responder, args: &str) -> Flow {
        let selected = args.trim();
        if selected.is_empty() {
            return usage(responder, messages::CONFIRM_USAGE).await;
        }
        let Some(confirmation) = self.open_question.lock().await.take() else {
            say(responder, messages::NO_PENDING_CONFIRMATION).await;
            return Flow::Continue;
        };

        // numbers pick an option, anything else is passed through as typed
        let choice = match selected.parse::<usize>() {
            Ok(n) if (1..=confirmation.options.len()).contains(&n) => confirmation.options[n - 1].clone(),
            _ => selected.to_string(),
        };

        match self.router.confirm(responder, &confirmation.id, &choice).await {
            Ok(RouteOutcome::AwaitingConfirmation(next)) => {
                *self.open_question.lock().await = Some(next);
            }
            Ok(_) => {}
            Err(e) => say(responder, &messages::confirmation_failed(&e.to_string())).await,
        }
        Flow::Continue
    }

    async fn handle_history(&self, responder: &dyn Responder, args: &str) -> Flow {
        let limit = args.trim().parse().unwrap_or(DEFAULT_HISTORY_LIMIT);
        let entries = self.queue.history(limit).await;
        if entries.is_empty() {
            say(responder, messages::HISTORY_EMPTY).await;
        } else {
            let lines: Vec<String> = entries.iter().map(messages::status_line).collect();
            say(responder, &lines.join("\n")).await;
        }
        Flow::Continue
    }

    async fn handle_status(&self, responder: &dyn Responder) -> Flow {
        let pending = self.queue.pending_len().await;
        let connected = self.queue.consumer_connected(self.connected_window).await;
        let awaiting = self.confirmations.len().await;
        say(responder, &messages::status_summary(pending, connected, awaiting)).await;
        Flow::Continue
    }

    async fn handle_files(&self, responder: &dyn Responder, args: &str) -> Flow {
        let area = if args.trim().eq_ignore_ascii_case("scripts") {
            Area::Scripts
        } else {
            Area::Files
        };
        match self.workspace.list(area).await {
            Ok(files) if files.is_empty() => say(responder, messages::NO_FILES).await,
            Ok(files) => {
                let lines: Vec<String> = files
                    .iter()
                    .map(|f| format!("* {} ({} bytes)", f.name, f.size))
                    .collect();
                say(responder, &lines.join("\n")).await;
            }
            Err(e) => say(responder, &messages::workspace_error(&e.to_string())).await,
        }
        Flow::Continue
    }

    /// Reads from `files/`, falling back to `scripts/` so saved scripts can be shown.
    async fn handle_read(&self, responder: &dyn Responder, args: &str) -> Flow {
        let name = args.trim();
        if name.is_empty() {
            return usage(responder, messages::READ_USAGE).await;
        }
        let result = match self.workspace.read(Area::Files, name).await {
            Err(WorkspaceError::NotFound(_)) => self.workspace.read(Area::Scripts, name).await,
            other => other,
        };
        match result {
            Ok(content) => say(responder, &messages::file_read_success(name, &content)).await,
            Err(e) => say(responder, &messages::workspace_error(&e.to_string())).await,
        }
        Flow::Continue
    }

    async fn handle_write(&self, responder: &dyn Responder, area: Area, args: &str) -> Flow {
        let Some((name, content)) = split_first(args) else {
            let text = match area {
                Area::Files => messages::WRITE_USAGE,
                Area::Scripts => messages::SCRIPT_USAGE,
            };
            return usage(responder, text).await;
        };
        // literal "\n" lets multi-line content fit on one console line
        let content = content.replace("\\n", "\n");
        match self.workspace.write(area, name, &content).await {
            Ok(_) => say(responder, &messages::file_written(name, content.len())).await,
            Err(e) => say(responder, &messages::workspace_error(&e.to_string())).await,
        }
        Flow::Continue
    }

    async fn handle_delete(&self, responder: &dyn Responder, args: &str) -> Flow {
        let name = args.trim();
        if name.is_empty() {
            return usage(responder, messages::DELETE_USAGE).await;
        }
        let result = match self.workspace.delete(Area::Files, name).await {
            Err(WorkspaceError::NotFound(_)) => self.workspace.delete(Area::Scripts, name).await,
            other => other,
        };
        match result {
            Ok(()) => say(responder, &messages::file_deleted(name)).await,
            Err(e) => say(responder, &messages::workspace_error(&e.to_string())).await,
        }
        Flow::Continue
    }

    async fn handle_run(&self, responder: &dyn Responder, args: &str) -> Flow {
        let Some((name, rest)) = split_first(args) else {
            return usage(responder, messages::RUN_USAGE).await;
        };
        let script_args: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
        match self.workspace.run(name, &script_args).await {
            Ok(run) => {
                self.queue
                    .record(workspace::history_entry(name, &script_args, &run))
                    .await;
                let text = messages::script_finished(name, &run.summary(), &run.stdout, &run.stderr);
                say(responder, &text).await;
            }
            Err(e) => say(responder, &messages::workspace_error(&e.to_string())).await,
        }
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::WorkspaceConfig;
    use crate::domain::types::{intent, PlanStatus};
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingResponder {
        lines: std::sync::Mutex<Vec<String>>,
    }

    impl RecordingResponder {
        fn last(&self) -> String {
            self.lines.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl Responder for RecordingResponder {
        async fn send_message(&self, content: &str) -> Result<(), String> {
            self.lines.lock().unwrap().push(content.to_string());
            Ok(())
        }

        async fn send_notification(&self, content: &str) -> Result<(), String> {
            self.lines.lock().unwrap().push(content.to_string());
            Ok(())
        }
    }

    fn session(dir: &std::path::Path) -> (Session, Arc<PlanQueue>) {
        let queue = Arc::new(PlanQueue::new(50));
        let store = Arc::new(ConfirmationStore::new(Duration::from_secs(300)));
        let router = Arc::new(CommandRouter::new(
            queue.clone(),
            store.clone(),
            None,
            Duration::from_secs(5),
        ));
        let workspace = Arc::new(Workspace::new(&WorkspaceConfig {
            root: dir.to_path_buf(),
            ..Default::default()
        }));
        let session = Session::new(router, queue.clone(), store, workspace, Duration::from_secs(5));
        (session, queue)
    }

    #[test]
    fn test_split_first() {
        assert_eq!(split_first("a.txt hello world"), Some(("a.txt", "hello world")));
        assert_eq!(split_first("  a.txt  "), Some(("a.txt", "")));
        assert_eq!(split_first("   "), None);
    }

    #[tokio::test]
    async fn test_confirm_by_number() {
        let dir = tempfile::tempdir().unwrap();
        let (session, queue) = session(dir.path());
        let responder = RecordingResponder::default();
        session.handle_line(&responder, "shut down this pc").await;
        assert!(responder.last().contains("1. Yes, shut down"));
        session.handle_line(&responder, ".confirm 3").await;
        let pending = queue.take_pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].intent, intent::POWER);
        assert!(pending[0].description.to_lowercase().contains("sleep"));

        session.handle_line(&responder, ".confirm 1").await;
        assert_eq!(responder.last(), messages::NO_PENDING_CONFIRMATION);
    }

    #[tokio::test]
    async fn test_workspace_commands() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session(dir.path());
        let responder = RecordingResponder::default();
        session.handle_line(&responder, ".write todo.txt buy milk\\nwalk dog").await;
        session.handle_line(&responder, ".read todo.txt").await;
        assert!(responder.last().contains("buy milk\nwalk dog"));
        session.handle_line(&responder, ".files").await;
        assert!(responder.last().contains("todo.txt"));
        session.handle_line(&responder, ".delete todo.txt").await;
        session.handle_line(&responder, ".files").await;
        assert_eq!(responder.last(), messages::NO_FILES);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_is_recorded_in_history() {
        let dir = tempfile::tempdir().unwrap();
        let (session, queue) = session(dir.path());
        let responder = RecordingResponder::default();
        // no interpreter for .cmd on unix, so the run ends as a spawn failure
        session.handle_line(&responder, ".script hello.cmd echo hi").await;
        session.handle_line(&responder, ".run hello.cmd").await;
        let history = queue.history(1).await;
        assert_eq!(history[0].intent, intent::SCRIPT_EXECUTE);
        assert_eq!(history[0].status, PlanStatus::Failed);
    }

    #[tokio::test]
    async fn test_unknown_and_quit() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session(dir.path());
        let responder = RecordingResponder::default();
        assert_eq!(session.handle_line(&responder, ".bogus").await, Flow::Continue);
        assert_eq!(responder.last(), messages::UNKNOWN_COMMAND);
        assert_eq!(session.handle_line(&responder, ".quit").await, Flow::Quit);
    }
}
