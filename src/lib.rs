//! # HostPilot
//!
//! Turns short natural-language commands into validated automation plans and
//! runs them on the host through a compiled PowerShell script.
//!
//! - Domain: configuration, plan types, key tables and traits
//! - Application: interpreter, guard, negotiator, compiler, queue, bridge, router
//! - Infrastructure: advisor providers, shell runner, sandbox, workspace, history
//! - Interface: console surface and dot commands

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interface;
pub mod strings;
