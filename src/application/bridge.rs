//! # Execution Bridge
//!
//! Polls a [`PlanSource`], then validates, compiles and runs each plan on the
//! host one at a time. Every pulled plan gets exactly one completion report.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::application::compiler::ScriptCompiler;
use crate::application::guard;
use crate::domain::traits::{PlanSource, ScriptRunner};
use crate::domain::types::{ActionPlan, ExecutionOutcome};

pub const CANCELLED_BEFORE_EXECUTION: &str = "cancelled before execution";

/// Lifecycle of one plan inside the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    Pending,
    Executing,
    Completed,
    Failed,
}

impl PlanState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanState::Completed | PlanState::Failed)
    }

    /// The state after `next`, or `None` if the transition is not allowed.
    fn advance(self, next: PlanState) -> Option<PlanState> {
        match (self, next) {
            (PlanState::Pending, PlanState::Executing)
            | (PlanState::Pending, PlanState::Failed)
            | (PlanState::Executing, PlanState::Completed)
            | (PlanState::Executing, PlanState::Failed) => Some(next),
            _ => None,
        }
    }
}

pub struct ExecutionBridge {
    source: Arc<dyn PlanSource>,
    runner: Arc<dyn ScriptRunner>,
    compiler: ScriptCompiler,
    poll_interval: Duration,
    executing: Mutex<()>,
    states: Mutex<HashMap<String, PlanState>>,
}

impl ExecutionBridge {
    pub fn new(
        source: Arc<dyn PlanSource>,
        runner: Arc<dyn ScriptRunner>,
        compiler: ScriptCompiler,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            runner,
            compiler,
            poll_interval,
            executing: Mutex::new(()),
            states: Mutex::new(HashMap::new()),
        }
    }

    pub async fn state_of(&self, plan_id: &str) -> Option<PlanState> {
        self.states.lock().await.get(plan_id).copied()
    }

    async fn transition(&self, plan_id: &str, next: PlanState) -> bool {
        let mut states = self.states.lock().await;
        let current = states.get(plan_id).copied().unwrap_or(PlanState::Pending);
        match current.advance(next) {
            Some(state) => {
                states.insert(plan_id.to_string(), state);
                true
            }
            None => {
                tracing::warn!("Ignoring {:?} -> {:?} for plan {}", current, next, plan_id);
                false
            }
        }
    }

    async fn report(&self, plan: &ActionPlan, outcome: ExecutionOutcome) {
        let terminal = if outcome.success {
            PlanState::Completed
        } else {
            PlanState::Failed
        };
        if !self.transition(&plan.id, terminal).await {
            return;
        }
        match &outcome.error {
            None => tracing::info!("Plan {} completed: {}", plan.id, plan.description),
            Some(e) => tracing::warn!("Plan {} failed: {}", plan.id, e),
        }
        if let Err(e) = self.source.complete(&plan.id, &outcome).await {
            tracing::error!("Failed to report outcome of plan {}: {:#}", plan.id, e);
        }
    }

    /// Guard, compile, guard again and run. Never panics on bad input.
    pub async fn execute_plan(&self, plan: &ActionPlan) -> ExecutionOutcome {
        let verdict = guard::check_plan(plan);
        if verdict.blocked {
            return ExecutionOutcome::failure(format!("Blocked: {}", verdict.reason()));
        }
        if plan.steps.is_empty() {
            return ExecutionOutcome::success();
        }

        let script = self.compiler.compile(&plan.steps);
        let verdict = guard::check_script(&script);
        if verdict.blocked {
            return ExecutionOutcome::failure(format!("Compiled script blocked: {}", verdict.reason()));
        }

        match self.runner.run(&script).await {
            Ok(output) if output.success => {
                if !output.stdout.trim().is_empty() {
                    tracing::debug!("Plan {} output: {}", plan.id, output.stdout.trim());
                }
                ExecutionOutcome::success()
            }
            Ok(output) => {
                let detail = if output.stderr.trim().is_empty() {
                    output.stdout.trim()
                } else {
                    output.stderr.trim()
                };
                let code = output
                    .exit_code
                    .map_or_else(|| "none".to_string(), |c| c.to_string());
                if detail.is_empty() {
                    ExecutionOutcome::failure(format!("Script exited with code {code}"))
                } else {
                    ExecutionOutcome::failure(format!("Script exited with code {code}: {detail}"))
                }
            }
            Err(e) => ExecutionOutcome::failure(format!("{:#}", e)),
        }
    }

    /// One poll. Returns how many plans were reported; 0 if another tick is running.
    pub async fn tick(&self, shutdown: &watch::Receiver<bool>) -> usize {
        let Ok(_gate) = self.executing.try_lock() else {
            tracing::debug!("Bridge busy, skipping tick");
            return 0;
        };

        let plans = match self.source.pending().await {
            Ok(plans) => plans,
            Err(e) => {
                tracing::warn!("Failed to fetch pending plans: {:#}", e);
                return 0;
            }
        };
        if plans.is_empty() {
            return 0;
        }

        {
            let mut states = self.states.lock().await;
            states.retain(|_, state| !state.is_terminal());
            for plan in &plans {
                states.insert(plan.id.clone(), PlanState::Pending);
            }
        }

        let count = plans.len();
        for plan in &plans {
            if *shutdown.borrow() {
                self.report(plan, ExecutionOutcome::failure(CANCELLED_BEFORE_EXECUTION))
                    .await;
                continue;
            }
            self.transition(&plan.id, PlanState::Executing).await;
            tracing::info!("Executing plan {} ({} steps): {}", plan.id, plan.steps.len(), plan.description);
            let outcome = self.execute_plan(plan).await;
            self.report(plan, outcome).await;
        }
        count
    }

    /// Polls until `shutdown` flips to true. The in-flight plan is allowed to finish.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!("Execution bridge polling every {:?}", self.poll_interval);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
            self.tick(&shutdown).await;
        }
        tracing::info!("Execution bridge stopped");
    }

    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::queue::PlanQueue;
    use crate::domain::traits::ShellOutput;
    use crate::domain::types::{intent, ActionStep, PlanStatus};
    use async_trait::async_trait;

    #[derive(Default)]
    struct FakeRunner {
        scripts: std::sync::Mutex<Vec<String>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl ScriptRunner for FakeRunner {
        async fn run(&self, script: &str) -> anyhow::Result<ShellOutput> {
            self.scripts.lock().unwrap().push(script.to_string());
            Ok(match &self.fail_with {
                None => ShellOutput {
                    success: true,
                    exit_code: Some(0),
                    stdout: String::new(),
                    stderr: String::new(),
                },
                Some(stderr) => ShellOutput {
                    success: false,
                    exit_code: Some(1),
                    stdout: String::new(),
                    stderr: stderr.clone(),
                },
            })
        }
    }

    fn bridge(queue: Arc<PlanQueue>, runner: Arc<FakeRunner>) -> ExecutionBridge {
        ExecutionBridge::new(
            queue,
            runner,
            ScriptCompiler::new("/tmp/scripts", 30),
            Duration::from_millis(10),
        )
    }

    fn typing(text: &str) -> ActionPlan {
        ActionPlan::new(
            text,
            intent::TYPE_TEXT,
            format!("Typing {text}"),
            vec![ActionStep::type_text(text, "Type text")],
        )
    }

    #[tokio::test]
    async fn test_runs_in_arrival_order_and_reports() {
        let queue = Arc::new(PlanQueue::new(10));
        let runner = Arc::new(FakeRunner::default());
        let bridge = bridge(queue.clone(), runner.clone());
        let a = queue.enqueue(typing("first")).await;
        let b = queue.enqueue(typing("second")).await;

        let (_tx, rx) = watch::channel(false);
        assert_eq!(bridge.tick(&rx).await, 2);

        let scripts = runner.scripts.lock().unwrap().clone();
        assert_eq!(scripts.len(), 2);
        assert!(scripts[0].contains("first"));
        assert!(scripts[1].contains("second"));
        assert_eq!(queue.status_of(&a.id).await, Some(PlanStatus::Completed));
        assert_eq!(queue.status_of(&b.id).await, Some(PlanStatus::Completed));
        assert_eq!(bridge.state_of(&a.id).await, Some(PlanState::Completed));
        assert!(bridge.state_of("unknown").await.is_none());
    }

    #[tokio::test]
    async fn test_blocked_plan_never_runs() {
        let queue = Arc::new(PlanQueue::new(10));
        let runner = Arc::new(FakeRunner::default());
        let bridge = bridge(queue.clone(), runner.clone());
        let plan = queue.enqueue(typing(r"C:\Windows\System32\cmd.exe")).await;

        let (_tx, rx) = watch::channel(false);
        bridge.tick(&rx).await;

        assert!(runner.scripts.lock().unwrap().is_empty());
        let history = queue.history(1).await;
        assert_eq!(history[0].id, plan.id);
        assert_eq!(history[0].status, PlanStatus::Failed);
        assert!(history[0].error.as_deref().unwrap().starts_with("Blocked"));
    }

    #[tokio::test]
    async fn test_empty_plan_succeeds_without_running() {
        let queue = Arc::new(PlanQueue::new(10));
        let runner = Arc::new(FakeRunner::default());
        let bridge = bridge(queue.clone(), runner.clone());
        let plan = queue
            .enqueue(ActionPlan::new("nothing", intent::WAIT, "Nothing", vec![]))
            .await;
        let (_tx, rx) = watch::channel(false);
        bridge.tick(&rx).await;
        assert!(runner.scripts.lock().unwrap().is_empty());
        assert_eq!(queue.status_of(&plan.id).await, Some(PlanStatus::Completed));
    }

    #[tokio::test]
    async fn test_script_failure_is_reported() {
        let queue = Arc::new(PlanQueue::new(10));
        let runner = Arc::new(FakeRunner {
            fail_with: Some("Access denied".into()),
            ..Default::default()
        });
        let bridge = bridge(queue.clone(), runner);
        queue.enqueue(typing("hello")).await;
        let (_tx, rx) = watch::channel(false);
        bridge.tick(&rx).await;
        let entry = &queue.history(1).await[0];
        assert_eq!(entry.status, PlanStatus::Failed);
        assert_eq!(entry.error.as_deref(), Some("Script exited with code 1: Access denied"));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pulled_plans() {
        let queue = Arc::new(PlanQueue::new(10));
        let runner = Arc::new(FakeRunner::default());
        let bridge = bridge(queue.clone(), runner.clone());
        let plan = queue.enqueue(typing("late")).await;
        let (_tx, rx) = watch::channel(true);
        assert_eq!(bridge.tick(&rx).await, 1);
        assert!(runner.scripts.lock().unwrap().is_empty());
        let entry = &queue.history(1).await[0];
        assert_eq!(entry.id, plan.id);
        assert_eq!(entry.error.as_deref(), Some(CANCELLED_BEFORE_EXECUTION));
    }

    #[tokio::test]
    async fn test_busy_gate_skips_tick() {
        let queue = Arc::new(PlanQueue::new(10));
        let bridge = bridge(queue.clone(), Arc::new(FakeRunner::default()));
        queue.enqueue(typing("wait")).await;
        let (_tx, rx) = watch::channel(false);
        {
            let _held = bridge.executing.lock().await;
            assert_eq!(bridge.tick(&rx).await, 0);
        }
        assert_eq!(queue.pending_len().await, 1);
        assert_eq!(bridge.tick(&rx).await, 1);
    }

    #[tokio::test]
    async fn test_run_loop_stops_on_shutdown() {
        let queue = Arc::new(PlanQueue::new(10));
        let bridge = Arc::new(bridge(queue.clone(), Arc::new(FakeRunner::default())));
        let plan = queue.enqueue(typing("loop")).await;
        let (tx, rx) = watch::channel(false);
        let handle = bridge.spawn(rx);
        for _ in 0..100 {
            if queue.status_of(&plan.id).await == Some(PlanStatus::Completed) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(queue.status_of(&plan.id).await, Some(PlanStatus::Completed));
        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[test]
    fn test_state_transitions() {
        assert_eq!(PlanState::Pending.advance(PlanState::Executing), Some(PlanState::Executing));
        assert_eq!(PlanState::Executing.advance(PlanState::Completed), Some(PlanState::Completed));
        assert!(PlanState::Completed.advance(PlanState::Failed).is_none());
        assert!(PlanState::Pending.advance(PlanState::Completed).is_none());
    }
}
