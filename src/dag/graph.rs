// src/dag/graph.rs

use std::collections::BTreeMap;

use crate::config::model::WorkflowFile;
use crate::types::JobName;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Direct dependencies (`after = [...]`), in declaration order.
    deps: Vec<JobName>,
    /// Direct dependents, ordered by job name.
    dependents: Vec<JobName>,
}

/// In-memory DAG keyed by job name.
///
/// Acyclicity and reference validity are checked in `config::validate`;
/// this only keeps adjacency so jobs can be created with consistent
/// `incoming` / `outgoing` lists.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: BTreeMap<JobName, DagNode>,
}

impl DagGraph {
    /// Build a DAG from a validated [`WorkflowFile`].
    pub fn from_workflow(cfg: &WorkflowFile) -> Self {
        Self::from_edges(
            cfg.job
                .iter()
                .map(|(name, job)| (name.clone(), job.after.clone())),
        )
    }

    /// Build a DAG from `(job, after)` pairs.
    ///
    /// Dependencies naming unknown jobs are kept as incoming edges but do not
    /// create nodes.
    pub fn from_edges(jobs: impl IntoIterator<Item = (JobName, Vec<JobName>)>) -> Self {
        let mut nodes: BTreeMap<JobName, DagNode> = jobs
            .into_iter()
            .map(|(name, deps)| {
                (
                    name,
                    DagNode {
                        deps,
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        // Second pass: populate dependents based on deps. BTreeMap iteration
        // keeps `dependents` sorted by name.
        let edges: Vec<(JobName, JobName)> = nodes
            .iter()
            .flat_map(|(name, node)| node.deps.iter().map(move |dep| (dep.clone(), name.clone())))
            .collect();

        for (dep, dependent) in edges {
            if let Some(dep_node) = nodes.get_mut(&dep) {
                dep_node.dependents.push(dependent);
            }
        }

        Self { nodes }
    }

    /// All job names, sorted.
    pub fn jobs(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    /// Jobs without dependencies.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.deps.is_empty())
            .map(|(name, _)| name.as_str())
    }

    /// Immediate dependencies of a job (its `after` list).
    pub fn dependencies_of(&self, name: &str) -> &[JobName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a job (jobs listing it in their `after`).
    pub fn dependents_of(&self, name: &str) -> &[JobName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}
