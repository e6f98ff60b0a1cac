// src/exec/shell.rs

//! Built-in behavior running `params.cmd` as a shell command.

use std::process::Stdio;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info};

use crate::exec::behavior::{JobBehavior, JobContext, JobOutcome};
use crate::types::BoxFuture;

/// Environment variable carrying the upstream payloads as a JSON array.
pub const PAYLOADS_ENV: &str = "DAGWORKER_PAYLOADS";

/// Runs `params.cmd` via `sh -c` (`cmd /C` on Windows).
///
/// - Upstream payloads are exported as JSON in [`PAYLOADS_ENV`].
/// - The job output is the trimmed stdout as a JSON string.
/// - A non-zero exit status fails the job.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellBehavior;

impl JobBehavior for ShellBehavior {
    fn perform(&self, ctx: JobContext) -> BoxFuture<'_, JobOutcome> {
        Box::pin(async move { JobOutcome::from(run_shell(&ctx).await) })
    }
}

async fn run_shell(ctx: &JobContext) -> Result<Value> {
    let script = ctx
        .params
        .get("cmd")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("job '{}' has no `cmd` parameter", ctx.job))?;

    let payloads = serde_json::to_string(&ctx.payloads)
        .with_context(|| format!("serialising payloads for job '{}'", ctx.job))?;

    info!(
        workflow = %ctx.workflow_id,
        job = %ctx.job,
        cmd = %script,
        "starting job process"
    );

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(script);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(script);
        c
    };

    cmd.env(PAYLOADS_ENV, payloads)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = cmd
        .output()
        .await
        .with_context(|| format!("running process for job '{}'", ctx.job))?;

    for line in String::from_utf8_lossy(&output.stderr).lines() {
        debug!(job = %ctx.job, "stderr: {}", line);
    }

    let code = output.status.code().unwrap_or(-1);
    info!(
        workflow = %ctx.workflow_id,
        job = %ctx.job,
        exit_code = code,
        success = output.status.success(),
        "job process exited"
    );

    if !output.status.success() {
        bail!("command `{}` exited with code {}", script, code);
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(Value::String(stdout))
}
