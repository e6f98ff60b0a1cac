// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod job;
pub mod lock;
pub mod logging;
pub mod queue;
pub mod store;
pub mod types;
pub mod workflow;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, WorkflowFile};
use crate::dag::DagGraph;
use crate::engine::{Coordinator, Runtime};
use crate::errors::Result;
use crate::exec::BehaviorRegistry;
use crate::lock::MemoryLockService;
use crate::queue::MemoryQueue;
use crate::store::MemoryStore;
use crate::workflow::{WorkflowClient, WorkflowStatus};

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the workflow file, then either prints it (`--dry-run`)
/// or runs it to completion in-process. Returns `true` when every job
/// succeeded.
pub async fn run(args: CliArgs) -> Result<bool> {
    let path = Path::new(&args.workflow);
    let cfg = load_and_validate(path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(true);
    }

    let workflow_id = args
        .workflow_id
        .clone()
        .unwrap_or_else(|| default_workflow_id(path));

    let status = execute_workflow(&cfg, &workflow_id, BehaviorRegistry::with_builtins()).await?;
    print_summary(&workflow_id, &status);

    Ok(status.finished())
}

/// Run `cfg` as workflow `workflow_id` against in-process store, lock and
/// queue, and return the final job states.
///
/// This wires together:
/// - the workflow client (job creation + root enqueue)
/// - the coordinator (execution + advancement)
/// - the worker runtime (delivery loop + redelivery policy)
pub async fn execute_workflow(
    cfg: &WorkflowFile,
    workflow_id: &str,
    registry: BehaviorRegistry,
) -> Result<WorkflowStatus> {
    let store = Arc::new(MemoryStore::new());
    let locks = Arc::new(MemoryLockService::new());
    let (queue, deliveries) = MemoryQueue::new();
    let queue_handle = Arc::new(queue.clone());

    let worker_config = cfg.worker_config();
    debug!(?worker_config, "engine configuration");

    let coordinator = Arc::new(Coordinator::new(
        store.clone(),
        locks,
        queue_handle.clone(),
        registry,
        worker_config,
    ));

    let client = WorkflowClient::new(store, queue_handle);
    let workflow = client.create_workflow(workflow_id, cfg).await?;
    client.start_workflow(&workflow).await?;

    let runtime = Runtime::new(coordinator, queue, deliveries, cfg.runtime_options());
    runtime.run().await?;

    let status = client.status(&workflow).await?;
    if status.finished() {
        info!(workflow = %workflow_id, "workflow finished");
    } else {
        warn!(
            workflow = %workflow_id,
            failed = status.count(crate::job::JobState::Failed),
            "workflow did not finish"
        );
    }
    Ok(status)
}

/// Workflow id derived from the file stem (`pipelines/etl.toml` -> `etl`).
fn default_workflow_id(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("workflow")
        .to_string()
}

fn print_summary(workflow_id: &str, status: &WorkflowStatus) {
    println!("workflow {workflow_id}:");
    for (name, state) in status.states.iter() {
        println!("  {name}: {state:?}");
    }
}

/// Simple dry-run output: print config, jobs, classes, queues and edges.
fn print_dry_run(cfg: &WorkflowFile) {
    let worker = cfg.worker_config();
    let runtime = cfg.runtime_options();

    println!("dagworker dry-run");
    println!("  config.polling_interval = {:?}", worker.polling_interval);
    println!("  config.locking_duration = {:?}", worker.locking_duration);
    println!("  config.lock_wait_timeout = {:?}", worker.lock_wait_timeout);
    println!("  config.advance_retry_delay = {:?}", worker.advance_retry_delay);
    println!("  config.workers = {}", runtime.workers);
    println!("  config.max_attempts = {}", runtime.max_attempts);
    println!();

    let graph = DagGraph::from_workflow(cfg);
    println!("jobs ({}):", cfg.job.len());
    for (name, job) in cfg.job.iter() {
        println!("  - {name}");
        println!("      class: {}", job.class);
        println!("      queue: {}", job.effective_queue());
        if let Some(ref cmd) = job.cmd {
            println!("      cmd: {cmd}");
        }
        if !job.after.is_empty() {
            println!("      after: {:?}", job.after);
        }
        let dependents = graph.dependents_of(name);
        if !dependents.is_empty() {
            println!("      before: {:?}", dependents);
        }
    }

    debug!("dry-run complete (no execution)");
}
