// src/dag/mod.rs

//! DAG definition.
//!
//! [`graph`] turns the `after = [...]` declarations of a workflow file into
//! the mutually consistent `incoming` / `outgoing` lists stored on each job.

pub mod graph;

pub use graph::DagGraph;
