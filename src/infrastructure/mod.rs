//! # Infrastructure Layer
//!
//! Handles interactions with external systems: the advisor's HTTP APIs, the
//! host shell, child processes and the filesystem.
//! Implements the traits defined in the Domain layer (e.g., Advisor, ScriptRunner).

pub mod history;
pub mod llm;
pub mod sandbox;
pub mod shell;
pub mod workspace;
