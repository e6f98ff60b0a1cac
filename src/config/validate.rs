// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{RawWorkflowFile, WorkflowFile};
use crate::errors::{Result, WorkflowError};

impl TryFrom<RawWorkflowFile> for WorkflowFile {
    type Error = WorkflowError;

    fn try_from(raw: RawWorkflowFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_workflow(&raw)?;
        Ok(WorkflowFile::new_unchecked(raw.config, raw.job))
    }
}

fn validate_raw_workflow(cfg: &RawWorkflowFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    validate_global_config(cfg)?;
    validate_job_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_jobs(cfg: &RawWorkflowFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(WorkflowError::ConfigError(
            "workflow must contain at least one [job.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawWorkflowFile) -> Result<()> {
    let c = &cfg.config;

    let durations = [
        ("polling_interval", Some(c.polling_interval)),
        ("locking_duration", Some(c.locking_duration)),
        ("lock_wait_timeout", c.lock_wait_timeout),
    ];
    for (field, value) in durations {
        if value.is_some_and(|d| d.as_duration().is_zero()) {
            return Err(WorkflowError::ConfigError(format!(
                "[config].{field} must be greater than zero"
            )));
        }
    }

    if c.workers == 0 {
        return Err(WorkflowError::ConfigError(
            "[config].workers must be >= 1 (got 0)".to_string(),
        ));
    }

    if c.max_attempts == 0 {
        return Err(WorkflowError::ConfigError(
            "[config].max_attempts must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_job_dependencies(cfg: &RawWorkflowFile) -> Result<()> {
    for (name, job) in cfg.job.iter() {
        for dep in job.after.iter() {
            if !cfg.job.contains_key(dep) {
                return Err(WorkflowError::ConfigError(format!(
                    "job '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(WorkflowError::ConfigError(format!(
                    "job '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawWorkflowFile) -> Result<()> {
    // Edge direction: dep -> job. For `[job.B] after = ["A"]` we add A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.job.keys() {
        graph.add_node(name.as_str());
    }

    for (name, job) in cfg.job.iter() {
        for dep in job.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(WorkflowError::DagCycle(format!(
            "cycle detected in job DAG involving job '{}'",
            cycle.node_id()
        ))),
    }
}
