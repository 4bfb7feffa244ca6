//! # Host Shell
//!
//! Runs compiled plan scripts. The exact text that passed the script guard is
//! written to a temporary `.ps1` file and handed to the configured shell.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::config::ShellConfig;
use crate::domain::traits::{ScriptRunner, ShellOutput};

pub struct ShellRunner {
    program: String,
    args: Vec<String>,
    temp_dir: PathBuf,
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(config: &ShellConfig, temp_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            temp_dir: temp_dir.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ScriptRunner for ShellRunner {
    async fn run(&self, script: &str) -> Result<ShellOutput> {
        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.temp_dir.display()))?;
        let path = self.temp_dir.join(format!("hostpilot-{}.ps1", Uuid::new_v4()));
        tokio::fs::write(&path, script)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = match cmd.spawn() {
            Ok(child) => match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
                Ok(Ok(output)) => Ok(ShellOutput {
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                }),
                Ok(Err(e)) => Err(anyhow::Error::new(e).context("Failed to wait for shell")),
                Err(_) => Ok(ShellOutput {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: format!("Timed out after {}s", self.timeout.as_secs()),
                }),
            },
            Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to spawn {}", self.program))),
        };

        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::debug!("Could not remove {}: {}", path.display(), e);
        }
        result
    }
}

/// Logs scripts instead of running them (`--dry-run`).
pub struct DryRunRunner;

#[async_trait]
impl ScriptRunner for DryRunRunner {
    async fn run(&self, script: &str) -> Result<ShellOutput> {
        tracing::info!("Dry run, script not executed:\n{}", script);
        Ok(ShellOutput {
            success: true,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
