//! # Main Entry Point
//!
//! Wires the pipeline together:
//! - Domain: configuration
//! - Infrastructure: advisor, shell runner, workspace, history
//! - Application: queue, router, execution bridge, logging
//! - Interface: console surface

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use hostpilot::application::bridge::ExecutionBridge;
use hostpilot::application::compiler::ScriptCompiler;
use hostpilot::application::logging;
use hostpilot::application::negotiator::ConfirmationStore;
use hostpilot::application::queue::PlanQueue;
use hostpilot::application::router::{CommandRouter, RouteOutcome};
use hostpilot::domain::config::AppConfig;
use hostpilot::domain::traits::{Advisor, HistorySink, Responder, ScriptRunner};
use hostpilot::domain::types::PlanStatus;
use hostpilot::infrastructure::history::{self, HistoryWriter};
use hostpilot::infrastructure::llm::client::LlmAdvisor;
use hostpilot::infrastructure::shell::{DryRunRunner, ShellRunner};
use hostpilot::infrastructure::workspace::Workspace;
use hostpilot::interface::commands::Session;
use hostpilot::interface::console::{self, ConsoleResponder};
use hostpilot::strings::messages;

#[derive(Parser, Debug)]
#[command(name = "hostpilot", version, about = "Natural-language desktop automation")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "data/config.yaml")]
    config: PathBuf,

    /// Route a single command, wait for it to execute, then exit
    #[arg(long)]
    command: Option<String>,

    /// Queue plans without starting the execution bridge
    #[arg(long)]
    no_bridge: bool,

    /// Compile and log scripts instead of executing them
    #[arg(long)]
    dry_run: bool,
}

fn build_advisor(config: &AppConfig) -> Option<Arc<dyn Advisor>> {
    let advisor_config = config.advisor.as_ref()?;
    match LlmAdvisor::from_config(advisor_config) {
        Ok(advisor) => {
            tracing::info!("Advisor enabled ({})", advisor.provider().as_str());
            Some(Arc::new(advisor))
        }
        Err(e) => {
            tracing::warn!("Advisor disabled: {}", e);
            None
        }
    }
}

/// Routes `text` and, when it was queued and a bridge is running, waits for its outcome.
async fn run_once(
    router: &CommandRouter,
    queue: &PlanQueue,
    responder: &dyn Responder,
    text: &str,
    wait_for: Option<Duration>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let RouteOutcome::Queued(plan) = router.route(responder, text).await else {
        return Ok(());
    };
    let Some(timeout) = wait_for else {
        return Ok(());
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(entry) = queue.find(&plan.id).await
            && entry.status != PlanStatus::Pending
        {
            if let Err(e) = responder.send_message(&messages::status_line(&entry)).await {
                tracing::warn!("Failed to send status: {}", e);
            }
            if entry.status == PlanStatus::Failed {
                bail!("Plan failed: {}", entry.error.unwrap_or_default());
            }
            return Ok(());
        }
        if *shutdown.borrow() {
            bail!("Interrupted before plan {} finished", plan.id);
        }
        if Instant::now() >= deadline {
            bail!("Timed out waiting for plan {}", plan.id);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load Configuration
    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    // 2. Logging Setup
    let _log_guard = logging::init_tracing(&config.logging, true)?;
    tracing::info!("Starting HostPilot...");

    // 3. Infrastructure
    let advisor = build_advisor(&config);
    let workspace = Arc::new(Workspace::new(&config.workspace));
    if let Err(e) = workspace.ensure_dirs().await {
        tracing::warn!("Workspace unavailable at {}: {}", workspace.root().display(), e);
    }

    let entries = history::load(&config.history.path, config.history.capacity);
    let writer: Box<dyn HistorySink> = Box::new(HistoryWriter::spawn(
        config.history.path.clone(),
        Duration::from_millis(config.history.debounce_ms),
    ));

    // 4. Application
    let queue = Arc::new(PlanQueue::with_history(entries, config.history.capacity, Some(writer)));
    let confirmations = Arc::new(ConfirmationStore::new(Duration::from_secs(
        config.confirmation.ttl_secs,
    )));
    let connected_window = Duration::from_secs(config.bridge.connected_window_secs);
    let router = Arc::new(CommandRouter::new(
        queue.clone(),
        confirmations.clone(),
        advisor,
        connected_window,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let bridge_handle = if cli.no_bridge {
        tracing::info!("Execution bridge disabled, plans stay queued");
        None
    } else {
        let plan_timeout = Duration::from_secs(config.bridge.plan_timeout_secs);
        let runner: Arc<dyn ScriptRunner> = if cli.dry_run {
            Arc::new(DryRunRunner)
        } else {
            Arc::new(ShellRunner::new(&config.shell, std::env::temp_dir(), plan_timeout))
        };
        let compiler = ScriptCompiler::new(workspace.scripts_dir(), config.workspace.script_timeout_secs);
        let bridge = Arc::new(ExecutionBridge::new(
            queue.clone(),
            runner,
            compiler,
            Duration::from_millis(config.bridge.poll_interval_ms),
        ));
        Some(bridge.spawn(shutdown_rx.clone()))
    };

    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            ctrl_c_tx.send_replace(true);
        }
    });

    // 5. Interface
    let responder = ConsoleResponder;
    let result = match &cli.command {
        Some(text) => {
            let wait_for = bridge_handle
                .as_ref()
                .map(|_| Duration::from_secs(config.bridge.plan_timeout_secs + 5));
            run_once(&router, &queue, &responder, text, wait_for, shutdown_rx.clone()).await
        }
        None => {
            let session = Session::new(
                router.clone(),
                queue.clone(),
                confirmations,
                workspace,
                connected_window,
            );
            console::run_repl(&session, &responder, shutdown_rx.clone()).await
        }
    };

    // 6. Shutdown: let the in-flight plan finish, then flush history
    shutdown_tx.send_replace(true);
    if let Some(handle) = bridge_handle
        && let Err(e) = handle.await
    {
        tracing::error!("Execution bridge task failed: {}", e);
    }
    queue.close().await;
    tracing::info!("HostPilot stopped");
    result
}
