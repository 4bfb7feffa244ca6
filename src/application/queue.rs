//! # Plan Queue
//!
//! In-process queue between the router (producer) and the execution bridge
//! (consumer), plus the capped action history. Implements [`PlanSource`].

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::traits::{HistorySink, PlanSource};
use crate::domain::types::{ActionPlan, ExecutionOutcome, PlanStatus};

#[derive(Default)]
struct QueueState {
    pending: VecDeque<ActionPlan>,
    history: VecDeque<ActionPlan>,
    last_poll: Option<Instant>,
}

pub struct PlanQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    writer: Option<Box<dyn HistorySink>>,
}

impl PlanQueue {
    pub fn new(capacity: usize) -> Self {
        Self::with_history(Vec::new(), capacity, None)
    }

    /// Starts from previously saved entries; changes are handed to `writer` when present.
    pub fn with_history(
        entries: Vec<ActionPlan>,
        capacity: usize,
        writer: Option<Box<dyn HistorySink>>,
    ) -> Self {
        let capacity = capacity.max(1);
        let mut history: VecDeque<ActionPlan> = entries.into();
        while history.len() > capacity {
            history.pop_front();
        }
        Self {
            state: Mutex::new(QueueState {
                history,
                ..Default::default()
            }),
            capacity,
            writer,
        }
    }

    fn push_history(&self, state: &mut QueueState, entry: ActionPlan) {
        state.history.push_back(entry);
        while state.history.len() > self.capacity {
            state.history.pop_front();
        }
    }

    fn persist(&self, state: &QueueState) {
        if let Some(writer) = &self.writer {
            writer.schedule(state.history.iter().cloned().collect());
        }
    }

    /// Assigns id, status and queue time, then queues the plan. Returns the stored copy.
    pub async fn enqueue(&self, mut plan: ActionPlan) -> ActionPlan {
        plan.id = Uuid::new_v4().to_string();
        plan.status = PlanStatus::Pending;
        plan.queued_at = Some(Utc::now());
        plan.completed_at = None;
        plan.error = None;

        let mut state = self.state.lock().await;
        state.pending.push_back(plan.clone());
        self.push_history(&mut state, plan.clone());
        self.persist(&state);
        tracing::info!("Queued plan {} ({}): {}", plan.id, plan.intent, plan.description);
        plan
    }

    /// Returns and clears every pending plan, oldest first, and records the poll time.
    pub async fn take_pending(&self) -> Vec<ActionPlan> {
        let mut state = self.state.lock().await;
        state.last_poll = Some(Instant::now());
        state.pending.drain(..).collect()
    }

    /// Records a plan's terminal outcome. Unknown ids are logged and ignored.
    pub async fn complete(&self, plan_id: &str, outcome: &ExecutionOutcome) {
        let mut state = self.state.lock().await;
        state.pending.retain(|p| p.id != plan_id);
        let Some(entry) = state.history.iter_mut().rev().find(|p| p.id == plan_id) else {
            tracing::warn!("Completion for unknown plan {}", plan_id);
            return;
        };
        entry.status = if outcome.success {
            PlanStatus::Completed
        } else {
            PlanStatus::Failed
        };
        entry.completed_at = Some(Utc::now());
        entry.error = outcome.error.clone();
        self.persist(&state);
    }

    /// Appends an already-finished entry (workspace script runs).
    pub async fn record(&self, entry: ActionPlan) {
        let mut state = self.state.lock().await;
        self.push_history(&mut state, entry);
        self.persist(&state);
    }

    /// The most recent `limit` entries, oldest first.
    pub async fn history(&self, limit: usize) -> Vec<ActionPlan> {
        let state = self.state.lock().await;
        let skip = state.history.len().saturating_sub(limit);
        state.history.iter().skip(skip).cloned().collect()
    }

    /// Latest history entry for `plan_id`.
    pub async fn find(&self, plan_id: &str) -> Option<ActionPlan> {
        let state = self.state.lock().await;
        state.history.iter().rev().find(|p| p.id == plan_id).cloned()
    }

    pub async fn status_of(&self, plan_id: &str) -> Option<PlanStatus> {
        self.find(plan_id).await.map(|p| p.status)
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// True when a consumer polled within `window`.
    pub async fn consumer_connected(&self, window: Duration) -> bool {
        let state = self.state.lock().await;
        state.last_poll.is_some_and(|t| t.elapsed() <= window)
    }

    /// Flushes history and stops the writer.
    pub async fn close(&self) {
        if let Some(writer) = &self.writer {
            writer.close().await;
        }
    }
}

#[async_trait]
impl PlanSource for PlanQueue {
    async fn pending(&self) -> anyhow::Result<Vec<ActionPlan>> {
        Ok(self.take_pending().await)
    }

    async fn complete(&self, plan_id: &str, outcome: &ExecutionOutcome) -> anyhow::Result<()> {
        PlanQueue::complete(self, plan_id, outcome).await;
        Ok(())
    }
}
