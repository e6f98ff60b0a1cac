// src/job/state.rs

//! Per-job lifecycle state machine.
//!
//! ```text
//! pending -> enqueued -> running -> succeeded
//!                              \-> failed -> running (on redelivery)
//! ```
//!
//! Every transition is a pure mutation of the in-memory [`Job`]; callers are
//! responsible for persisting the job right after a transition.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, WorkflowError};
use crate::job::Job;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Pending,
    Enqueued,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    /// `pending` and `enqueued` both mean "not yet started".
    pub fn is_not_started(self) -> bool {
        matches!(self, JobState::Pending | JobState::Enqueued)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

impl Job {
    /// Transition to `running`.
    ///
    /// Allowed from any state except `succeeded`; a failed job that is
    /// redelivered starts again from here.
    pub fn start(&mut self) -> Result<()> {
        if self.state == JobState::Succeeded {
            return Err(self.invalid("start"));
        }
        debug!(job = %self.name, from = ?self.state, "job -> running");
        self.state = JobState::Running;
        Ok(())
    }

    /// Transition `running -> succeeded`, recording the output payload.
    pub fn finish(&mut self, output: Value) -> Result<()> {
        if self.state != JobState::Running {
            return Err(self.invalid("finish"));
        }
        debug!(job = %self.name, "job -> succeeded");
        self.state = JobState::Succeeded;
        self.output_payload = Some(output);
        Ok(())
    }

    /// Transition `running -> failed`.
    ///
    /// A job that has not started yet may also be failed directly, which is
    /// what happens when its dependency payloads cannot be resolved.
    pub fn fail(&mut self) -> Result<()> {
        if self.state == JobState::Succeeded {
            return Err(self.invalid("fail"));
        }
        debug!(job = %self.name, from = ?self.state, "job -> failed");
        self.state = JobState::Failed;
        Ok(())
    }

    /// Transition `pending -> enqueued`.
    pub fn enqueue(&mut self) -> Result<()> {
        if self.state != JobState::Pending {
            return Err(self.invalid("enqueue"));
        }
        debug!(job = %self.name, "job -> enqueued");
        self.state = JobState::Enqueued;
        Ok(())
    }

    /// Undo `enqueue` when the request could not be handed to the queue, so
    /// a later advancement attempt sees the job as ready again.
    pub fn reset_enqueue(&mut self) -> Result<()> {
        if self.state != JobState::Enqueued {
            return Err(self.invalid("reset_enqueue"));
        }
        debug!(job = %self.name, "job -> pending (enqueue rolled back)");
        self.state = JobState::Pending;
        Ok(())
    }

    pub fn succeeded(&self) -> bool {
        self.state == JobState::Succeeded
    }

    pub fn failed(&self) -> bool {
        self.state == JobState::Failed
    }

    fn invalid(&self, action: &'static str) -> WorkflowError {
        WorkflowError::InvalidTransition {
            job: self.name.clone(),
            action,
            from: self.state,
        }
    }
}
