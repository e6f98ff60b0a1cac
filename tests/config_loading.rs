// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use dagworker::config::{load_and_validate, parse_str, WorkflowFile};
use dagworker::errors::WorkflowError;
use dagworker::types::HumanDuration;
use serde_json::json;
use tempfile::NamedTempFile;

fn write_workflow(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_full_workflow_file_loads() {
    let file = write_workflow(
        r#"
[config]
polling_interval = "50ms"
locking_duration = "5s"
lock_wait_timeout = "1s"
advance_retry_delay = "250ms"
workers = 2
max_attempts = 5
retry_delay = "3s"

[job.fetch]
cmd = "echo fetched"
queue = "io"

[job.report]
class = "noop"
after = ["fetch"]
params = { output = "done" }
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    let worker = cfg.worker_config();
    assert_eq!(worker.polling_interval, Duration::from_millis(50));
    assert_eq!(worker.locking_duration, Duration::from_secs(5));
    assert_eq!(worker.lock_wait_timeout, Duration::from_secs(1));
    assert_eq!(worker.advance_retry_delay, Duration::from_millis(250));

    let runtime = cfg.runtime_options();
    assert_eq!(runtime.workers, 2);
    assert_eq!(runtime.max_attempts, 5);
    assert_eq!(runtime.retry_delay, Duration::from_secs(3));

    let fetch = &cfg.job["fetch"];
    assert_eq!(fetch.class, "shell");
    assert_eq!(fetch.effective_queue(), "io");
    assert_eq!(fetch.effective_params(), json!({"cmd": "echo fetched"}));

    let report = &cfg.job["report"];
    assert_eq!(report.class, "noop");
    assert_eq!(report.effective_queue(), "default");
    assert_eq!(report.after, vec!["fetch".to_string()]);
    assert_eq!(report.effective_params(), json!({"output": "done"}));
}

#[test]
fn test_config_section_defaults() {
    let raw = parse_str(
        r#"
[job.only]
cmd = "true"
"#,
    )
    .unwrap();
    let cfg = WorkflowFile::try_from(raw).unwrap();

    let worker = cfg.worker_config();
    assert_eq!(worker.polling_interval, Duration::from_millis(300));
    assert_eq!(worker.locking_duration, Duration::from_secs(2));
    assert_eq!(worker.advance_retry_delay, Duration::from_secs(2));

    let runtime = cfg.runtime_options();
    assert_eq!(runtime.workers, 4);
    assert_eq!(runtime.max_attempts, 3);
    assert_eq!(runtime.retry_delay, Duration::from_secs(1));
}

#[test]
fn test_lock_wait_timeout_defaults_to_locking_duration() {
    let raw = parse_str(
        r#"
[config]
locking_duration = "7s"

[job.only]
cmd = "true"
"#,
    )
    .unwrap();
    let cfg = WorkflowFile::try_from(raw).unwrap();

    let worker = cfg.worker_config();
    assert_eq!(worker.lock_wait_timeout, Duration::from_secs(7));

    let options = worker.lock_options();
    assert_eq!(options.wait_timeout, Duration::from_secs(7));
    assert_eq!(options.lease, Duration::from_secs(7));
    assert_eq!(options.poll_interval, Duration::from_millis(300));
}

#[test]
fn test_dag_cycle_returns_structured_error() {
    let file = write_workflow(
        r#"
[job.A]
cmd = "echo A"
after = ["B"]

[job.B]
cmd = "echo B"
after = ["A"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(WorkflowError::DagCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains('A') || msg.contains('B'));
        }
        Err(e) => panic!("Expected DagCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_dependency_returns_config_error() {
    let file = write_workflow(
        r#"
[job.A]
cmd = "echo A"
after = ["NonExistent"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(WorkflowError::ConfigError(msg)) => {
            assert!(msg.contains("unknown dependency"));
            assert!(msg.contains("NonExistent"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_self_dependency_is_rejected() {
    let raw = parse_str(
        r#"
[job.A]
cmd = "echo A"
after = ["A"]
"#,
    )
    .unwrap();

    match WorkflowFile::try_from(raw) {
        Err(WorkflowError::ConfigError(msg)) => assert!(msg.contains("itself")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn test_empty_workflow_is_rejected() {
    let raw = parse_str("[config]\nworkers = 1\n").unwrap();
    assert!(matches!(
        WorkflowFile::try_from(raw),
        Err(WorkflowError::ConfigError(_))
    ));
}

#[test]
fn test_zero_workers_and_attempts_are_rejected() {
    for field in ["workers", "max_attempts"] {
        let raw = parse_str(&format!("[config]\n{field} = 0\n\n[job.A]\ncmd = \"true\"\n")).unwrap();
        match WorkflowFile::try_from(raw) {
            Err(WorkflowError::ConfigError(msg)) => assert!(msg.contains(field)),
            other => panic!("Expected ConfigError for {field}, got: {:?}", other),
        }
    }
}

#[test]
fn test_zero_duration_is_rejected() {
    let raw = parse_str(
        r#"
[config]
polling_interval = "0ms"

[job.A]
cmd = "true"
"#,
    )
    .unwrap();

    match WorkflowFile::try_from(raw) {
        Err(WorkflowError::ConfigError(msg)) => assert!(msg.contains("polling_interval")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn test_bad_duration_is_a_toml_error() {
    let err = parse_str(
        r#"
[config]
locking_duration = "5 fortnights"

[job.A]
cmd = "true"
"#,
    )
    .unwrap_err();

    match err {
        WorkflowError::TomlError(e) => assert!(e.to_string().contains("unsupported duration unit")),
        other => panic!("Expected TomlError, got: {:?}", other),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let res = load_and_validate(dir.path().join("nope.toml"));
    assert!(matches!(res, Err(WorkflowError::IoError(_))));
}

#[test]
fn test_human_duration_parsing() {
    assert_eq!("300ms".parse::<HumanDuration>().unwrap(), HumanDuration::from_millis(300));
    assert_eq!("2s".parse::<HumanDuration>().unwrap(), HumanDuration::from_secs(2));
    assert_eq!("5m".parse::<HumanDuration>().unwrap(), HumanDuration::from_secs(300));
    assert_eq!("1h".parse::<HumanDuration>().unwrap(), HumanDuration::from_secs(3600));
    assert_eq!(" 10S ".parse::<HumanDuration>().unwrap(), HumanDuration::from_secs(10));

    assert!("".parse::<HumanDuration>().is_err());
    assert!("15".parse::<HumanDuration>().is_err());
    assert!("ms".parse::<HumanDuration>().is_err());
    assert!("3d".parse::<HumanDuration>().is_err());

    let err = "999999999999999999h".parse::<HumanDuration>().unwrap_err();
    assert!(err.contains("too large"), "unexpected error: {err}");
    assert!("999999999999999999m".parse::<HumanDuration>().is_err());
    assert_eq!(
        "18446744073709551615s".parse::<HumanDuration>().unwrap(),
        HumanDuration::from_secs(u64::MAX)
    );

    assert_eq!(HumanDuration::from_millis(1500).to_string(), "1500ms");
    assert_eq!(HumanDuration::from_secs(2).to_string(), "2s");
}

#[test]
fn test_oversized_duration_is_a_toml_error() {
    let err = parse_str(
        r#"
[config]
locking_duration = "999999999999999999h"

[job.A]
cmd = "true"
"#,
    )
    .unwrap_err();

    match err {
        WorkflowError::TomlError(e) => assert!(e.to_string().contains("too large")),
        other => panic!("Expected TomlError, got: {:?}", other),
    }
}
