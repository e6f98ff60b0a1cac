// tests/advancement.rs

use std::sync::Arc;

use dagworker::engine::{AdvanceOutcome, PerformOutcome};
use dagworker::job::JobState;
use dagworker::lock::enqueue_lock_key;
use dagworker::queue::ExecutionRequest;
use dagworker_test_utils::builders::{seed_workflow, JobBuilder};
use dagworker_test_utils::harness::Harness;
use dagworker_test_utils::init_tracing;
use serde_json::json;

#[tokio::test]
async fn fan_in_child_waits_for_every_parent() {
    init_tracing();
    let h = Harness::new();
    seed_workflow(&h.store, "W", &[("A", &[]), ("B", &[]), ("C", &["A", "B"])]);
    let coordinator = h.coordinator();

    // A finishes first: C still waits on B.
    let outcome = coordinator.perform("W", "A").await.unwrap();
    assert_eq!(
        outcome,
        PerformOutcome::Executed {
            advance: AdvanceOutcome::Completed { enqueued: vec![] }
        }
    );
    assert_eq!(h.queue.enqueue_count("C"), 0);
    assert_eq!(h.state_of("W", "C"), JobState::Pending);

    // B finishes second: C becomes ready.
    let outcome = coordinator.perform("W", "B").await.unwrap();
    assert_eq!(outcome.advance().enqueued(), ["C".to_string()]);

    assert_eq!(h.state_of("W", "A"), JobState::Succeeded);
    assert_eq!(h.state_of("W", "B"), JobState::Succeeded);
    assert_eq!(h.state_of("W", "C"), JobState::Enqueued);
    assert_eq!(h.queue.enqueue_count("C"), 1);
    assert!(h.queue.scheduled().is_empty());
}

#[tokio::test]
async fn redelivered_parent_does_not_enqueue_child_twice() {
    init_tracing();
    let h = Harness::new();
    seed_workflow(&h.store, "W", &[("A", &[]), ("B", &[]), ("C", &["A", "B"])]);
    let coordinator = h.coordinator();

    coordinator.perform("W", "A").await.unwrap();
    coordinator.perform("W", "B").await.unwrap();

    // At-least-once delivery: both parents show up again.
    let again_a = coordinator.perform("W", "A").await.unwrap();
    let again_b = coordinator.perform("W", "B").await.unwrap();

    assert!(matches!(again_a, PerformOutcome::AdvancedOnly { .. }));
    assert!(again_a.advance().enqueued().is_empty());
    assert!(again_b.advance().enqueued().is_empty());
    assert_eq!(h.queue.enqueue_count("C"), 1);
}

#[tokio::test]
async fn contended_lock_reschedules_and_retry_enqueues() {
    init_tracing();
    let h = Harness::new();
    seed_workflow(&h.store, "W", &[("A", &[]), ("B", &["A"])]);
    h.locks.contend(&enqueue_lock_key("W", "B"), 1);
    let coordinator = h.coordinator();

    // First attempt: A runs, but B's lock is contended.
    let outcome = coordinator.perform("W", "A").await.unwrap();
    assert_eq!(
        outcome,
        PerformOutcome::Executed {
            advance: AdvanceOutcome::Rescheduled {
                contended: "B".to_string(),
                enqueued: vec![],
            }
        }
    );
    assert!(outcome.advance().is_rescheduled());
    assert_eq!(h.queue.enqueue_count("B"), 0);
    assert_eq!(h.state_of("W", "A"), JobState::Succeeded);
    assert_eq!(h.state_of("W", "B"), JobState::Pending);

    let scheduled = h.queue.scheduled();
    assert_eq!(scheduled.len(), 1);
    let (delay, queue, request) = &scheduled[0];
    assert_eq!(*delay, h.config.advance_retry_delay);
    assert_eq!(queue, "default");
    assert_eq!(request, &ExecutionRequest::new("W", "A"));

    // The retry finds A succeeded and only advances.
    let retry = coordinator.perform("W", "A").await.unwrap();
    assert_eq!(
        retry,
        PerformOutcome::AdvancedOnly {
            advance: AdvanceOutcome::Completed {
                enqueued: vec!["B".to_string()]
            }
        }
    );
    assert!(!retry.advance().is_rescheduled());
    assert_eq!(h.queue.enqueue_count("B"), 1);
    assert_eq!(h.state_of("W", "A"), JobState::Succeeded);
    assert_eq!(h.state_of("W", "B"), JobState::Enqueued);
    assert_eq!(h.queue.scheduled().len(), 1);
}

#[tokio::test]
async fn contention_aborts_rest_of_outgoing_list() {
    init_tracing();
    let h = Harness::new();
    seed_workflow(
        &h.store,
        "W",
        &[("A", &[]), ("B", &["A"]), ("C", &["A"]), ("D", &["A"])],
    );
    h.locks.contend(&enqueue_lock_key("W", "C"), 1);
    let coordinator = h.coordinator();

    let outcome = coordinator.perform("W", "A").await.unwrap();
    assert_eq!(
        outcome.advance(),
        &AdvanceOutcome::Rescheduled {
            contended: "C".to_string(),
            enqueued: vec!["B".to_string()],
        }
    );
    // D was never looked at.
    assert_eq!(h.locks.attempts(&enqueue_lock_key("W", "D")), 0);
    assert_eq!(h.queue.enqueued_jobs(), vec!["B".to_string()]);

    // Retry: B is already enqueued and skipped, C and D get enqueued.
    let retry = coordinator.perform("W", "A").await.unwrap();
    assert_eq!(
        retry.advance().enqueued(),
        ["C".to_string(), "D".to_string()]
    );
    assert_eq!(h.queue.enqueue_count("B"), 1);
    assert_eq!(h.queue.enqueue_count("C"), 1);
    assert_eq!(h.queue.enqueue_count("D"), 1);
}

#[tokio::test]
async fn locks_are_released_after_advancement() {
    let h = Harness::new();
    seed_workflow(&h.store, "W", &[("A", &[]), ("B", &["A"]), ("C", &["B"])]);
    let coordinator = h.coordinator();

    coordinator.perform("W", "A").await.unwrap();
    assert!(!h.locks.is_held(&enqueue_lock_key("W", "B")));
}

#[tokio::test]
async fn lock_is_released_when_critical_section_fails() {
    let h = Harness::new();
    // A lists a downstream job that was never created.
    h.store.insert(JobBuilder::new("W", "A").outgoing(&["ghost"]).build());
    let coordinator = h.coordinator();

    let err = coordinator.perform("W", "A").await.unwrap_err();
    assert!(err.to_string().contains("ghost"), "unexpected error: {err}");
    assert!(!h.locks.is_held(&enqueue_lock_key("W", "ghost")));
    // Advancement errors never touch the parent's own state.
    assert_eq!(h.state_of("W", "A"), JobState::Succeeded);
}

#[tokio::test]
async fn child_with_failed_parent_is_not_enqueued() {
    let h = Harness::new();
    h.store.insert(
        JobBuilder::new("W", "A")
            .outgoing(&["C"])
            .succeeded_with(json!(1))
            .build(),
    );
    h.store.insert(
        JobBuilder::new("W", "B")
            .outgoing(&["C"])
            .state(JobState::Failed)
            .build(),
    );
    h.store
        .insert(JobBuilder::new("W", "C").incoming(&["A", "B"]).build());

    let outcome = h.coordinator().perform("W", "A").await.unwrap();
    assert!(outcome.advance().enqueued().is_empty());
    assert_eq!(h.state_of("W", "C"), JobState::Pending);
}

#[tokio::test]
async fn failed_queue_handoff_rolls_child_back_to_pending() {
    let h = Harness::new();
    seed_workflow(&h.store, "W", &[("A", &[]), ("B", &["A"])]);
    h.queue.set_fail_enqueue(true);
    let coordinator = h.coordinator();

    assert!(coordinator.perform("W", "A").await.is_err());
    assert_eq!(h.state_of("W", "A"), JobState::Succeeded);
    assert_eq!(h.state_of("W", "B"), JobState::Pending);

    // Redelivery of A picks B up again once the queue recovers.
    h.queue.set_fail_enqueue(false);
    let retry = coordinator.perform("W", "A").await.unwrap();
    assert_eq!(retry.advance().enqueued(), ["B".to_string()]);
    assert_eq!(h.state_of("W", "B"), JobState::Enqueued);
}

#[tokio::test]
async fn child_is_enqueued_on_its_own_queue() {
    let h = Harness::new();
    h.store.insert(
        JobBuilder::new("W", "A")
            .queue("fast")
            .outgoing(&["B"])
            .build(),
    );
    h.store.insert(
        JobBuilder::new("W", "B")
            .queue("slow")
            .incoming(&["A"])
            .build(),
    );

    h.coordinator().perform("W", "A").await.unwrap();

    let calls = h.queue.calls();
    assert_eq!(
        calls,
        vec![dagworker_test_utils::fakes::QueueCall::Enqueue {
            queue: "slow".to_string(),
            request: ExecutionRequest::new("W", "B"),
        }]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_parents_enqueue_child_exactly_once() {
    init_tracing();
    let h = Harness::new();
    let parents: Vec<String> = (0..8).map(|i| format!("P{i}")).collect();
    let parent_refs: Vec<&str> = parents.iter().map(String::as_str).collect();

    let mut edges: Vec<(&str, &[&str])> = parent_refs.iter().map(|p| (*p, &[][..])).collect();
    edges.push(("C", parent_refs.as_slice()));
    seed_workflow(&h.store, "W", &edges);

    let coordinator = Arc::new(h.coordinator());
    let mut handles = Vec::new();
    for parent in parents.clone() {
        let coordinator = Arc::clone(&coordinator);
        handles.push(tokio::spawn(async move {
            coordinator.perform("W", &parent).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Replay any advancement retries until none are left.
    let mut replayed = 0;
    while replayed < h.queue.scheduled().len() {
        let (_, _, request) = h.queue.scheduled()[replayed].clone();
        coordinator
            .perform(&request.workflow_id, &request.job_id)
            .await
            .unwrap();
        replayed += 1;
    }

    for parent in &parents {
        assert_eq!(h.state_of("W", parent), JobState::Succeeded);
    }
    assert_eq!(h.queue.enqueue_count("C"), 1);
    assert_eq!(h.state_of("W", "C"), JobState::Enqueued);
}
