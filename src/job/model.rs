// src/job/model.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::job::JobState;
use crate::types::{JobName, WorkflowId};

/// Persisted record for one job of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique within the workflow.
    pub name: JobName,
    pub workflow_id: WorkflowId,
    #[serde(default)]
    pub state: JobState,
    /// Upstream job names, in declaration order.
    #[serde(default)]
    pub incoming: Vec<JobName>,
    /// Downstream job names, ordered by name.
    #[serde(default)]
    pub outgoing: Vec<JobName>,
    /// Queue this job's execution requests are delivered on.
    pub queue: String,
    /// Behavior bound to this job (see [`crate::exec::BehaviorRegistry`]).
    pub class_ref: String,
    /// Free-form parameters handed to the behavior.
    #[serde(default)]
    pub params: Value,
    /// Set exactly once, when the job succeeds.
    #[serde(default)]
    pub output_payload: Option<Value>,
}

impl Job {
    pub fn new(
        workflow_id: impl Into<WorkflowId>,
        name: impl Into<JobName>,
        class_ref: impl Into<String>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            workflow_id: workflow_id.into(),
            state: JobState::Pending,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            queue: queue.into(),
            class_ref: class_ref.into(),
            params: Value::Null,
            output_payload: None,
        }
    }

    /// Whether this job has no upstream dependencies.
    pub fn is_root(&self) -> bool {
        self.incoming.is_empty()
    }
}

/// Output of one upstream job, as handed to a job about to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyPayload {
    /// Upstream job name.
    pub id: JobName,
    /// Upstream job's class ref.
    pub class: String,
    pub output: Value,
}
