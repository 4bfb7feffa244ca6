//! # Workspace
//!
//! A sandboxed directory with `files/` and `scripts/` where the user can keep
//! notes and small scripts. Every name is sanitized and must resolve inside its
//! directory; script content is screened before it is written.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::application::guard;
use crate::domain::config::WorkspaceConfig;
use crate::domain::paths::{self, FILES_DIR, SCRIPTS_DIR, SCRIPT_EXTENSIONS, WORKSPACE_ENV};
use crate::domain::types::{intent, ActionPlan, ActionStep, PlanStatus, StepKind};
use crate::infrastructure::sandbox::{self, Limits, SandboxRun};

pub const MAX_ARG_LEN: usize = 1000;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Invalid filename: {0:?}")]
    InvalidName(String),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Content is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("Unsupported script type {0:?}. Allowed: {allowed}", allowed = SCRIPT_EXTENSIONS.join(", "))]
    UnsupportedType(String),
    #[error("Script blocked: {0}")]
    Blocked(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Files,
    Scripts,
}

impl Area {
    fn dir_name(&self) -> &'static str {
        match self {
            Area::Files => FILES_DIR,
            Area::Scripts => SCRIPTS_DIR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Created,
    Updated,
}

pub struct Workspace {
    root: PathBuf,
    max_file_bytes: usize,
    limits: Limits,
}

impl Workspace {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self {
            root: config.root.clone(),
            max_file_bytes: config.max_file_bytes,
            limits: Limits {
                timeout: Duration::from_secs(config.script_timeout_secs),
                max_stdout: config.max_stdout_bytes,
                max_stderr: config.max_stderr_bytes,
            },
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join(SCRIPTS_DIR)
    }

    /// Creates the root and both subdirectories.
    pub async fn ensure_dirs(&self) -> Result<(), WorkspaceError> {
        tokio::fs::create_dir_all(self.root.join(FILES_DIR)).await?;
        tokio::fs::create_dir_all(self.root.join(SCRIPTS_DIR)).await?;
        Ok(())
    }

    fn resolve(&self, area: Area, name: &str) -> Result<PathBuf, WorkspaceError> {
        let base = self.root.join(area.dir_name());
        paths::resolve_in(&base, name).ok_or_else(|| WorkspaceError::InvalidName(name.to_string()))
    }

    /// Writes a file, replacing any previous content. Scripts are screened first.
    pub async fn write(&self, area: Area, name: &str, content: &str) -> Result<WriteKind, WorkspaceError> {
        let path = self.resolve(area, name)?;
        if content.len() > self.max_file_bytes {
            return Err(WorkspaceError::TooLarge {
                size: content.len(),
                limit: self.max_file_bytes,
            });
        }
        if area == Area::Scripts {
            let ext = paths::extension(&path).unwrap_or_default();
            if !paths::is_script_extension(&ext) {
                return Err(WorkspaceError::UnsupportedType(ext));
            }
            let verdict = guard::check_script_content(content, &ext);
            if verdict.blocked {
                return Err(WorkspaceError::Blocked(verdict.reason().to_string()));
            }
        }

        self.ensure_dirs().await?;
        let kind = if tokio::fs::try_exists(&path).await? {
            WriteKind::Updated
        } else {
            WriteKind::Created
        };
        tokio::fs::write(&path, content).await?;
        tracing::info!("Workspace {:?} {}", kind, path.display());
        Ok(kind)
    }

    pub async fn read(&self, area: Area, name: &str) -> Result<String, WorkspaceError> {
        let path = self.resolve(area, name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(WorkspaceError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Regular files in `area`, sorted by name. A missing directory lists as empty.
    pub async fn list(&self, area: Area) -> Result<Vec<FileEntry>, WorkspaceError> {
        let dir = self.root.join(area.dir_name());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_file() {
                files.push(FileEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    size: meta.len(),
                });
            }
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    pub async fn delete(&self, area: Area, name: &str) -> Result<(), WorkspaceError> {
        let path = self.resolve(area, name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("Workspace deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(WorkspaceError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Runs a script from `scripts/` with the workspace root as working directory.
    pub async fn run(&self, name: &str, args: &[String]) -> Result<SandboxRun, WorkspaceError> {
        let path = self.resolve(Area::Scripts, name)?;
        let ext = paths::extension(&path).unwrap_or_default();
        let Some((program, mut argv)) = interpreter_for(&ext) else {
            return Err(WorkspaceError::UnsupportedType(ext));
        };
        if !tokio::fs::try_exists(&path).await? {
            return Err(WorkspaceError::NotFound(name.to_string()));
        }
        argv.push(path.to_string_lossy().into_owned());
        argv.extend(args.iter().map(|a| truncate_arg(a)));

        tracing::info!("Running workspace script {} {:?}", name, args);
        let run = sandbox::run(
            program,
            &argv,
            &self.root,
            &[(WORKSPACE_ENV, self.root.as_path())],
            self.limits,
        )
        .await;
        tracing::info!("Script {} finished: {:?} ({} ms)", name, run.status, run.duration_ms);
        Ok(run)
    }
}

/// Program and leading arguments for a script extension.
pub fn interpreter_for(ext: &str) -> Option<(&'static str, Vec<String>)> {
    let (program, args): (&str, &[&str]) = match ext {
        "py" if cfg!(windows) => ("python", &[]),
        "py" => ("python3", &[]),
        "js" => ("node", &[]),
        "ps1" if cfg!(windows) => ("powershell", &["-NoProfile", "-ExecutionPolicy", "Bypass", "-File"]),
        "ps1" => ("pwsh", &["-NoProfile", "-File"]),
        "bat" | "cmd" => ("cmd", &["/c"]),
        _ => return None,
    };
    Some((program, args.iter().map(|a| a.to_string()).collect()))
}

/// A finished history entry describing one script run.
pub fn history_entry(name: &str, args: &[String], run: &SandboxRun) -> ActionPlan {
    let step = ActionStep::new(
        StepKind::RunScript {
            filename: name.to_string(),
            args: args.to_vec(),
        },
        format!("Run {name}"),
    );
    let mut entry = ActionPlan::new(
        format!("run {name}"),
        intent::SCRIPT_EXECUTE,
        format!("Run script {name}"),
        vec![step],
    );
    let now = chrono::Utc::now();
    entry.id = uuid::Uuid::new_v4().to_string();
    entry.status = if run.success() {
        PlanStatus::Completed
    } else {
        PlanStatus::Failed
    };
    entry.queued_at = Some(now - chrono::Duration::milliseconds(run.duration_ms as i64));
    entry.completed_at = Some(now);
    entry.error = run.error.clone();
    entry
}

fn truncate_arg(arg: &str) -> String {
    arg.chars().take(MAX_ARG_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace(dir: &Path) -> Workspace {
        Workspace::new(&WorkspaceConfig {
            root: dir.to_path_buf(),
            script_timeout_secs: 5,
            max_stdout_bytes: 1000,
            max_stderr_bytes: 1000,
            max_file_bytes: 64,
        })
    }

    #[tokio::test]
    async fn test_write_read_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        assert_eq!(ws.write(Area::Files, "notes.txt", "hi").await.unwrap(), WriteKind::Created);
        assert_eq!(ws.write(Area::Files, "notes.txt", "hello").await.unwrap(), WriteKind::Updated);
        assert_eq!(ws.read(Area::Files, "notes.txt").await.unwrap(), "hello");
        let listed = ws.list(Area::Files).await.unwrap();
        assert_eq!(listed, vec![FileEntry { name: "notes.txt".into(), size: 5 }]);
        ws.delete(Area::Files, "notes.txt").await.unwrap();
        assert!(matches!(
            ws.read(Area::Files, "notes.txt").await,
            Err(WorkspaceError::NotFound(_))
        ));
        assert!(matches!(
            ws.delete(Area::Files, "notes.txt").await,
            Err(WorkspaceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_traversal_stays_inside() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        ws.write(Area::Files, "../../escape.txt", "x").await.unwrap();
        assert!(dir.path().join(FILES_DIR).join("escape.txt").exists());
        assert!(matches!(
            ws.write(Area::Files, "..", "x").await,
            Err(WorkspaceError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_limits_and_screening() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        assert!(matches!(
            ws.write(Area::Files, "big.txt", &"x".repeat(65)).await,
            Err(WorkspaceError::TooLarge { size: 65, limit: 64 })
        ));
        assert!(matches!(
            ws.write(Area::Scripts, "tool.exe", "x").await,
            Err(WorkspaceError::UnsupportedType(_))
        ));
        assert!(matches!(
            ws.write(Area::Scripts, "wipe.ps1", "format c:").await,
            Err(WorkspaceError::Blocked(_))
        ));
        assert!(ws.list(Area::Scripts).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_script_type_comes_from_the_sanitized_name() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        assert!(matches!(
            ws.write(Area::Scripts, "run..py", "print(1)").await,
            Err(WorkspaceError::UnsupportedType(ext)) if ext.is_empty()
        ));
        std::fs::create_dir_all(dir.path().join(SCRIPTS_DIR)).unwrap();
        std::fs::write(dir.path().join(SCRIPTS_DIR).join("runpy"), "print(1)").unwrap();
        assert!(matches!(
            ws.run("run..py", &[]).await,
            Err(WorkspaceError::UnsupportedType(_))
        ));
    }

    #[tokio::test]
    async fn test_run_rejects_unknown_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        assert!(matches!(
            ws.run("thing.sh", &[]).await,
            Err(WorkspaceError::UnsupportedType(_))
        ));
        assert!(matches!(
            ws.run("absent.py", &[]).await,
            Err(WorkspaceError::NotFound(_))
        ));
    }

    #[test]
    fn test_args_are_truncated() {
        assert_eq!(truncate_arg(&"a".repeat(1500)).len(), MAX_ARG_LEN);
        assert_eq!(truncate_arg("short"), "short");
    }

    #[test]
    fn test_history_entry() {
        let run = SandboxRun {
            status: sandbox::RunStatus::NonZeroExit,
            exit_code: Some(2),
            stdout: String::new(),
            stderr: String::new(),
            error: Some("Exited with code 2".into()),
            duration_ms: 40,
        };
        let entry = history_entry("report.py", &["--fast".to_string()], &run);
        assert_eq!(entry.intent, intent::SCRIPT_EXECUTE);
        assert_eq!(entry.status, PlanStatus::Failed);
        assert_eq!(entry.error.as_deref(), Some("Exited with code 2"));
        assert!(!entry.id.is_empty());
    }

    #[test]
    fn test_interpreters() {
        assert_eq!(interpreter_for("js").unwrap().0, "node");
        assert_eq!(interpreter_for("cmd").unwrap().1, vec!["/c".to_string()]);
        assert!(interpreter_for("exe").is_none());
    }
}
