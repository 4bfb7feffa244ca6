//! # Workspace Paths
//!
//! Centralized definitions for the sandboxed workspace layout and filename rules.
//! Acts as the Single Source of Truth for where user files and scripts live.

use std::path::{Path, PathBuf};

pub const FILES_DIR: &str = "files";
pub const SCRIPTS_DIR: &str = "scripts";

/// Environment variable exposing the workspace root to scripts.
pub const WORKSPACE_ENV: &str = "HOSTPILOT_WORKSPACE";

pub const MAX_FILENAME_LEN: usize = 255;

/// Script types the workspace will run.
pub const SCRIPT_EXTENSIONS: &[&str] = &["py", "js", "ps1", "bat", "cmd"];

/// Cleans a user-supplied filename: drops NUL bytes, `..` and path separators,
/// then trims. Returns `None` when nothing usable remains or the result is too long.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let cleaned = name
        .replace('\0', "")
        .replace("..", "")
        .replace(['/', '\\'], "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.len() > MAX_FILENAME_LEN {
        return None;
    }
    Some(cleaned.to_string())
}

/// Sanitizes `name` and joins it to `base`, checking the result stays under `base`.
pub fn resolve_in(base: &Path, name: &str) -> Option<PathBuf> {
    let cleaned = sanitize_filename(name)?;
    let resolved = base.join(&cleaned);
    (resolved.parent() == Some(base)).then_some(resolved)
}

/// Lowercase extension without the dot.
pub fn extension(name: impl AsRef<Path>) -> Option<String> {
    name.as_ref()
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

pub fn is_script_extension(ext: &str) -> bool {
    SCRIPT_EXTENSIONS.contains(&ext)
}
