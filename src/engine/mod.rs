// src/engine/mod.rs

//! Job execution engine.
//!
//! This module ties together:
//! - the dependency resolver ([`resolver`]), which collects upstream outputs
//! - the DAG advancement protocol ([`advance`]), which enqueues ready
//!   downstream jobs exactly once under a per-child lock
//! - the execution coordinator ([`coordinator`]), the entry point the queue
//!   runtime dispatches `(workflow_id, job_id)` pairs to
//! - the worker runtime ([`runtime`]), an async shell draining the in-process
//!   queue onto a bounded pool of Tokio tasks
//!
//! The coordinator only talks to the store, lock service and queue through
//! their traits, so it can run against any backend.

pub mod advance;
pub mod coordinator;
pub mod resolver;
pub mod runtime;

pub use advance::{enqueue_job, AdvanceOutcome, Advancer};
pub use coordinator::{Coordinator, PerformOutcome};
pub use resolver::resolve_payloads;
pub use runtime::Runtime;
