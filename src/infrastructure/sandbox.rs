//! # Sandboxed Process Runner
//!
//! Runs a child process under a wall-clock limit and per-stream output caps.
//! Exceeding any limit kills the child. Output past the cap is discarded.

use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub timeout: Duration,
    pub max_stdout: usize,
    pub max_stderr: usize,
}

/// How a sandboxed run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    NonZeroExit,
    OutputLimit,
    TimedOut,
    SpawnFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SandboxRun {
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl SandboxRun {
    pub fn success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// One-line summary for chat output.
    pub fn summary(&self) -> String {
        let secs = self.duration_ms as f64 / 1000.0;
        match (&self.status, &self.error) {
            (RunStatus::Success, _) => format!("✅ exited cleanly in {secs:.1}s"),
            (_, Some(error)) => format!("❌ {error}"),
            (status, None) => format!("❌ {status:?}"),
        }
    }
}

enum Stop {
    Exited(std::process::ExitStatus),
    Overflow(&'static str, usize),
    Timeout,
    WaitFailed(std::io::Error),
}

async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut Option<R>, buf: &mut [u8]) -> std::io::Result<usize> {
    match reader {
        Some(r) => r.read(buf).await,
        None => Ok(0),
    }
}

/// Length of `bytes` without a trailing, incomplete UTF-8 sequence.
fn char_boundary(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(4) {
        let b = bytes[len - back];
        if b & 0xC0 != 0x80 {
            let width = match b {
                0x00..=0x7F => 1,
                0xC0..=0xDF => 2,
                0xE0..=0xEF => 3,
                _ => 4,
            };
            return if width > back { len - back } else { len };
        }
    }
    len
}

fn lossy_capped(mut bytes: Vec<u8>, cap: usize) -> String {
    bytes.truncate(cap);
    bytes.truncate(char_boundary(&bytes));
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Runs `program args...` in `cwd` with `envs` added, enforcing `limits`.
pub async fn run(
    program: &str,
    args: &[String],
    cwd: &Path,
    envs: &[(&str, &Path)],
    limits: Limits,
) -> SandboxRun {
    let started = Instant::now();
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!("Failed to spawn {}: {}", program, e);
            return SandboxRun {
                status: RunStatus::SpawnFailed,
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                error: Some(format!("Failed to start {program}: {e}")),
                duration_ms: started.elapsed().as_millis() as u64,
            };
        }
    };

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();
    let mut out_chunk = [0u8; 4096];
    let mut err_chunk = [0u8; 4096];
    let mut out_open = stdout.is_some();
    let mut err_open = stderr.is_some();
    let deadline = tokio::time::sleep(limits.timeout);
    tokio::pin!(deadline);

    let stop = loop {
        tokio::select! {
            read = read_chunk(&mut stdout, &mut out_chunk), if out_open => match read {
                Ok(0) | Err(_) => out_open = false,
                Ok(n) => {
                    out_buf.extend_from_slice(&out_chunk[..n]);
                    if out_buf.len() > limits.max_stdout {
                        break Stop::Overflow("stdout", limits.max_stdout);
                    }
                }
            },
            read = read_chunk(&mut stderr, &mut err_chunk), if err_open => match read {
                Ok(0) | Err(_) => err_open = false,
                Ok(n) => {
                    err_buf.extend_from_slice(&err_chunk[..n]);
                    if err_buf.len() > limits.max_stderr {
                        break Stop::Overflow("stderr", limits.max_stderr);
                    }
                }
            },
            status = child.wait(), if !out_open && !err_open => match status {
                Ok(status) => break Stop::Exited(status),
                Err(e) => break Stop::WaitFailed(e),
            },
            _ = &mut deadline => break Stop::Timeout,
        }
    };

    if matches!(stop, Stop::Overflow(..) | Stop::Timeout) {
        if let Err(e) = child.start_kill() {
            tracing::warn!("Failed to kill {}: {}", program, e);
        }
        if let Err(e) = child.wait().await {
            tracing::warn!("Failed to reap {}: {}", program, e);
        }
    }

    let (status, exit_code, error) = match stop {
        Stop::Exited(status) if status.success() => (RunStatus::Success, status.code(), None),
        Stop::Exited(status) => (
            RunStatus::NonZeroExit,
            status.code(),
            Some(match status.code() {
                Some(code) => format!("Exited with code {code}"),
                None => "Terminated by signal".to_string(),
            }),
        ),
        Stop::Overflow(stream, cap) => (
            RunStatus::OutputLimit,
            None,
            Some(format!("Killed: {stream} exceeded {cap} bytes")),
        ),
        Stop::Timeout => (
            RunStatus::TimedOut,
            None,
            Some(format!("Killed: timed out after {}s", limits.timeout.as_secs())),
        ),
        Stop::WaitFailed(e) => (
            RunStatus::SpawnFailed,
            None,
            Some(format!("Failed to wait for {program}: {e}")),
        ),
    };

    SandboxRun {
        status,
        exit_code,
        stdout: lossy_capped(out_buf, limits.max_stdout),
        stderr: lossy_capped(err_buf, limits.max_stderr),
        error,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn limits(timeout_ms: u64, max_stdout: usize) -> Limits {
        Limits {
            timeout: Duration::from_millis(timeout_ms),
            max_stdout,
            max_stderr: 1000,
        }
    }

    async fn sh(script: &str, limits: Limits) -> SandboxRun {
        let dir = tempfile::tempdir().unwrap();
        let args = vec!["-c".to_string(), script.to_string()];
        run("sh", &args, dir.path(), &[("HOSTPILOT_WORKSPACE", dir.path())], limits).await
    }

    #[test]
    fn test_cap_keeps_whole_characters() {
        assert_eq!(lossy_capped("héllo".as_bytes().to_vec(), 2), "h");
        assert_eq!(lossy_capped("héllo".as_bytes().to_vec(), 3), "hé");
        assert_eq!(lossy_capped("a€".as_bytes().to_vec(), 3), "a");
        assert_eq!(lossy_capped("abc".as_bytes().to_vec(), 10), "abc");
        assert!(!lossy_capped("日本語".as_bytes().to_vec(), 7).contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_clean_exit() {
        let run = sh("echo out; echo err >&2", limits(5000, 1000)).await;
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.exit_code, Some(0));
        assert_eq!(run.stdout.trim(), "out");
        assert_eq!(run.stderr.trim(), "err");
        assert!(run.error.is_none());
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let run = sh("exit 4", limits(5000, 1000)).await;
        assert_eq!(run.status, RunStatus::NonZeroExit);
        assert_eq!(run.exit_code, Some(4));
        assert_eq!(run.error.as_deref(), Some("Exited with code 4"));
    }

    #[tokio::test]
    async fn test_output_cap_kills() {
        let run = sh("while true; do echo xxxxxxxxxxxxxxxx; done", limits(5000, 100)).await;
        assert_eq!(run.status, RunStatus::OutputLimit);
        assert!(run.stdout.len() <= 100);
    }

    #[tokio::test]
    async fn test_timeout_kills() {
        let run = sh("sleep 5", limits(200, 1000)).await;
        assert_eq!(run.status, RunStatus::TimedOut);
        assert!(run.duration_ms < 5000);
    }

    #[tokio::test]
    async fn test_env_is_passed() {
        let run = sh("echo $HOSTPILOT_WORKSPACE", limits(5000, 1000)).await;
        assert!(!run.stdout.trim().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let run = run("/nonexistent/hostpilot-bin", &[], dir.path(), &[], limits(1000, 10)).await;
        assert_eq!(run.status, RunStatus::SpawnFailed);
        assert!(run.error.unwrap().starts_with("Failed to start"));
    }
}
