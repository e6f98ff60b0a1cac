// src/job/mod.rs

//! Jobs: one node of a workflow DAG plus its lifecycle state.
//!
//! - [`model`] holds the persisted [`Job`] record and its dependency payloads.
//! - [`state`] contains the per-job state machine (`start`, `finish`, `fail`,
//!   `enqueue`).

pub mod model;
pub mod state;

pub use model::{DependencyPayload, Job};
pub use state::JobState;
