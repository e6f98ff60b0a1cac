// src/exec/registry.rs

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::{Result, WorkflowError};
use crate::exec::behavior::{FnBehavior, JobBehavior, JobContext, NoopBehavior};
use crate::exec::shell::ShellBehavior;

/// Class ref of the built-in shell behavior.
pub const SHELL_CLASS: &str = "shell";
/// Class ref of the built-in no-op behavior.
pub const NOOP_CLASS: &str = "noop";

/// Maps `class_ref` strings to job behaviors.
#[derive(Clone, Default)]
pub struct BehaviorRegistry {
    behaviors: HashMap<String, Arc<dyn JobBehavior>>,
}

impl fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes: Vec<_> = self.behaviors.keys().collect();
        classes.sort();
        f.debug_struct("BehaviorRegistry")
            .field("classes", &classes)
            .finish()
    }
}

impl BehaviorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `shell` and `noop` pre-registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(SHELL_CLASS, ShellBehavior);
        registry.register(NOOP_CLASS, NoopBehavior);
        registry
    }

    /// Register (or replace) the behavior for `class_ref`.
    pub fn register<B>(&mut self, class_ref: impl Into<String>, behavior: B) -> &mut Self
    where
        B: JobBehavior + 'static,
    {
        self.behaviors.insert(class_ref.into(), Arc::new(behavior));
        self
    }

    /// Register an async closure as the behavior for `class_ref`.
    pub fn register_fn<F, Fut>(&mut self, class_ref: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.register(class_ref, FnBehavior::new(f))
    }

    pub fn resolve(&self, class_ref: &str) -> Result<Arc<dyn JobBehavior>> {
        self.behaviors
            .get(class_ref)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownClass(class_ref.to_string()))
    }
}
