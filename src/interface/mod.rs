//! # Interface Layer
//!
//! The user-facing surface: console input/output and the dot-command handlers.

pub mod commands;
pub mod console;
