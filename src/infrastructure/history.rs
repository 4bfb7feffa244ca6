//! # History Persistence
//!
//! Loads the action history at startup and writes it back through a debounced
//! background task, so bursts of queue activity cost one write.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::domain::traits::HistorySink;
use crate::domain::types::ActionPlan;

/// Reads the last `capacity` entries. Missing or unreadable files yield an empty history.
pub fn load(path: &Path, capacity: usize) -> Vec<ActionPlan> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!("Could not read history {}: {}", path.display(), e);
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<ActionPlan>>(&content) {
        Ok(mut entries) => {
            if entries.len() > capacity {
                entries.drain(..entries.len() - capacity);
            }
            tracing::info!("Loaded {} history entries from {}", entries.len(), path.display());
            entries
        }
        Err(e) => {
            tracing::warn!("History file {} is corrupt, starting empty: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Writes `entries` as pretty JSON via a temp file and rename.
pub async fn save(path: &Path, entries: &[ActionPlan]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(entries)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Debounced history writer. The latest snapshot always wins.
pub struct HistoryWriter {
    snapshots: watch::Sender<Option<Vec<ActionPlan>>>,
    closed: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HistoryWriter {
    pub fn spawn(path: PathBuf, debounce: Duration) -> Self {
        let (snapshots, snapshot_rx) = watch::channel(None);
        let (closed, closed_rx) = watch::channel(false);
        let task = tokio::spawn(run_writer(path, debounce, snapshot_rx, closed_rx));
        Self {
            snapshots,
            closed,
            task: Mutex::new(Some(task)),
        }
    }
}

#[async_trait]
impl HistorySink for HistoryWriter {
    fn schedule(&self, entries: Vec<ActionPlan>) {
        self.snapshots.send_replace(Some(entries));
    }

    /// Flushes any pending snapshot and stops the task.
    async fn close(&self) {
        self.closed.send_replace(true);
        if let Some(task) = self.task.lock().await.take()
            && let Err(e) = task.await
        {
            tracing::error!("History writer task failed: {}", e);
        }
    }
}

async fn write_latest(path: &Path, snapshots: &mut watch::Receiver<Option<Vec<ActionPlan>>>) {
    let latest = snapshots.borrow_and_update().clone();
    if let Some(entries) = latest {
        match save(path, &entries).await {
            Ok(()) => tracing::debug!("History saved ({} entries)", entries.len()),
            Err(e) => tracing::warn!("Failed to save history: {:#}", e),
        }
    }
}

async fn run_writer(
    path: PathBuf,
    debounce: Duration,
    mut snapshots: watch::Receiver<Option<Vec<ActionPlan>>>,
    mut closed: watch::Receiver<bool>,
) {
    loop {
        if *closed.borrow() {
            break;
        }
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = closed.changed() => break,
        }
        tokio::select! {
            _ = tokio::time::sleep(debounce) => {}
            _ = closed.changed() => {}
        }
        write_latest(&path, &mut snapshots).await;
    }
    if snapshots.has_changed().unwrap_or(false) {
        write_latest(&path, &mut snapshots).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::intent;

    fn plan(text: &str) -> ActionPlan {
        let mut plan = ActionPlan::new(text, intent::WAIT, text, vec![]);
        plan.id = text.to_string();
        plan
    }

    #[test]
    fn test_load_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("none.json"), 10).is_empty());
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert!(load(&bad, 10).is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_keeps_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.json");
        let entries: Vec<ActionPlan> = (0..5).map(|i| plan(&format!("p{i}"))).collect();
        save(&path, &entries).await.unwrap();
        let loaded = load(&path, 3);
        let ids: Vec<&str> = loaded.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p3", "p4"]);
    }

    #[tokio::test]
    async fn test_writer_coalesces_and_flushes_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let writer = HistoryWriter::spawn(path.clone(), Duration::from_secs(60));
        writer.schedule(vec![plan("a")]);
        writer.schedule(vec![plan("a"), plan("b")]);
        writer.close().await;
        let loaded = load(&path, 10);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].id, "b");
    }

    #[tokio::test]
    async fn test_queue_changes_are_saved() {
        use crate::application::queue::PlanQueue;
        use crate::domain::types::{ExecutionOutcome, PlanStatus};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let writer = HistoryWriter::spawn(path.clone(), Duration::from_millis(10));
        let queue = PlanQueue::with_history(Vec::new(), 10, Some(Box::new(writer)));
        let mut fresh = plan("a");
        fresh.id.clear();
        let a = queue.enqueue(fresh).await;
        queue.complete(&a.id, &ExecutionOutcome::success()).await;
        queue.close().await;
        let saved = load(&path, 10);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].status, PlanStatus::Completed);
    }
}
