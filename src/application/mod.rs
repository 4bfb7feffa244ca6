//! # Application Layer
//!
//! Contains the core logic and orchestration of the pipeline.
//! This includes the interpreter, security guard, negotiator, compiler, queue and execution bridge.

pub mod bridge;
pub mod compiler;
pub mod guard;
pub mod interpreter;
pub mod logging;
pub mod negotiator;
pub mod parsing;
pub mod queue;
pub mod router;
