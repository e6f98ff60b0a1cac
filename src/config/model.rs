// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::lock::LockOptions;
use crate::queue::DEFAULT_QUEUE;
use crate::types::HumanDuration;

/// Top-level workflow file as read from TOML, before validation.
///
/// ```toml
/// [config]
/// polling_interval = "300ms"
/// locking_duration = "2s"
/// advance_retry_delay = "2s"
///
/// [job.fetch]
/// class = "shell"
/// cmd = "curl -s https://example.com"
///
/// [job.report]
/// class = "noop"
/// after = ["fetch"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkflowFile {
    /// Worker/runtime settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All jobs from `[job.<name>]`, keyed by job name.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,
}

/// Validated workflow file.
///
/// Only obtainable through `WorkflowFile::try_from(RawWorkflowFile)` (or the
/// loader), so holders can rely on dependencies being known and acyclic.
#[derive(Debug, Clone)]
pub struct WorkflowFile {
    pub config: ConfigSection,
    pub job: BTreeMap<String, JobConfig>,
}

impl WorkflowFile {
    pub(crate) fn new_unchecked(config: ConfigSection, job: BTreeMap<String, JobConfig>) -> Self {
        Self { config, job }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::from(&self.config)
    }

    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions::from(&self.config)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Sleep between lock acquisition attempts.
    #[serde(default = "default_polling_interval")]
    pub polling_interval: HumanDuration,

    /// Lease duration of the enqueue lock.
    #[serde(default = "default_locking_duration")]
    pub locking_duration: HumanDuration,

    /// How long to wait for the enqueue lock before rescheduling the
    /// advancement step. Defaults to `locking_duration`.
    #[serde(default)]
    pub lock_wait_timeout: Option<HumanDuration>,

    /// Delay before a contended advancement step is retried.
    #[serde(default = "default_advance_retry_delay")]
    pub advance_retry_delay: HumanDuration,

    /// Number of deliveries processed concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Attempts per delivery before a failed job is given up on.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before a failed job is redelivered.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: HumanDuration,
}

fn default_polling_interval() -> HumanDuration {
    HumanDuration::from_millis(300)
}

fn default_locking_duration() -> HumanDuration {
    HumanDuration::from_secs(2)
}

fn default_advance_retry_delay() -> HumanDuration {
    HumanDuration::from_secs(2)
}

fn default_workers() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> HumanDuration {
    HumanDuration::from_secs(1)
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            polling_interval: default_polling_interval(),
            locking_duration: default_locking_duration(),
            lock_wait_timeout: None,
            advance_retry_delay: default_advance_retry_delay(),
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            retry_delay: default_retry_delay(),
        }
    }
}

/// `[job.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Behavior class ref (`"shell"`, `"noop"`, or anything registered).
    #[serde(default = "default_class")]
    pub class: String,

    /// Shorthand for `params.cmd`, used by the `shell` class.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Queue the job is delivered on.
    #[serde(default)]
    pub queue: Option<String>,

    /// Jobs that must succeed before this one runs.
    #[serde(default)]
    pub after: Vec<String>,

    /// Free-form parameters handed to the behavior.
    #[serde(default)]
    pub params: Value,
}

fn default_class() -> String {
    crate::exec::SHELL_CLASS.to_string()
}

impl JobConfig {
    pub fn effective_queue(&self) -> &str {
        self.queue.as_deref().unwrap_or(DEFAULT_QUEUE)
    }

    /// `params` with `cmd` folded in when given.
    pub fn effective_params(&self) -> Value {
        let mut params = match &self.params {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        if let (Some(cmd), Value::Object(map)) = (&self.cmd, &mut params) {
            map.insert("cmd".to_string(), Value::String(cmd.clone()));
        }
        params
    }
}

/// Immutable engine configuration, passed to the coordinator and the
/// advancement step at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub polling_interval: Duration,
    pub locking_duration: Duration,
    pub lock_wait_timeout: Duration,
    pub advance_retry_delay: Duration,
}

impl WorkerConfig {
    /// Lock timing for the per-downstream enqueue lock.
    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            wait_timeout: self.lock_wait_timeout,
            poll_interval: self.polling_interval,
            lease: self.locking_duration,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig::from(&ConfigSection::default())
    }
}

impl From<&ConfigSection> for WorkerConfig {
    fn from(cfg: &ConfigSection) -> Self {
        let locking_duration = cfg.locking_duration.as_duration();
        Self {
            polling_interval: cfg.polling_interval.as_duration(),
            locking_duration,
            lock_wait_timeout: cfg
                .lock_wait_timeout
                .map(HumanDuration::as_duration)
                .unwrap_or(locking_duration),
            advance_retry_delay: cfg.advance_retry_delay.as_duration(),
        }
    }
}

/// Worker pool settings, i.e. the queue runtime's own policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub workers: usize,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions::from(&ConfigSection::default())
    }
}

impl From<&ConfigSection> for RuntimeOptions {
    fn from(cfg: &ConfigSection) -> Self {
        Self {
            workers: cfg.workers,
            max_attempts: cfg.max_attempts,
            retry_delay: cfg.retry_delay.as_duration(),
        }
    }
}
