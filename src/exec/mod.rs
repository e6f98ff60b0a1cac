// src/exec/mod.rs

//! Job business logic.
//!
//! - [`behavior`] defines the `JobBehavior` trait, the [`JobContext`] handed
//!   to it and the explicit [`JobOutcome`] it returns.
//! - [`registry`] maps `class_ref` strings to behaviors.
//! - [`shell`] is the built-in behavior that runs a shell command, used by
//!   workflows loaded from TOML.

pub mod behavior;
pub mod registry;
pub mod shell;

pub use behavior::{FnBehavior, JobBehavior, JobContext, JobOutcome, NoopBehavior};
pub use registry::{BehaviorRegistry, NOOP_CLASS, SHELL_CLASS};
pub use shell::ShellBehavior;
