// tests/fan_in_property.rs

use std::collections::BTreeSet;
use std::sync::Arc;

use dagworker::engine::enqueue_job;
use dagworker::job::JobState;
use dagworker::queue::ExecutionRequest;
use dagworker_test_utils::builders::seed_workflow;
use dagworker_test_utils::fakes::QueueCall;
use dagworker_test_utils::harness::Harness;
use proptest::prelude::*;

// Acyclic by construction: job N may only depend on jobs 0..N-1.
fn dag_strategy(max_jobs: usize) -> impl Strategy<Value = Vec<(String, Vec<String>)>> {
    (1..=max_jobs).prop_flat_map(|num_jobs| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_jobs),
            num_jobs,
        )
        .prop_map(|raw_deps| {
            raw_deps
                .into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    let deps: BTreeSet<usize> = if i == 0 {
                        BTreeSet::new()
                    } else {
                        potential.into_iter().map(|d| d % i).collect()
                    };
                    (
                        format!("job_{i:02}"),
                        deps.into_iter().map(|d| format!("job_{d:02}")).collect(),
                    )
                })
                .collect()
        })
    })
}

/// Drive the workflow to completion in waves. Every request recorded since
/// the previous wave is performed concurrently, so the parents of a fan-in
/// job race on its enqueue lock. Requests flagged in `duplicate` are
/// delivered a second time once the wave has settled, like an at-least-once
/// queue would.
async fn drive(h: &Harness, dag: &[(String, Vec<String>)], duplicate: &[bool]) {
    let edges: Vec<(&str, Vec<&str>)> = dag
        .iter()
        .map(|(name, deps)| (name.as_str(), deps.iter().map(String::as_str).collect()))
        .collect();
    let edge_refs: Vec<(&str, &[&str])> = edges
        .iter()
        .map(|(name, deps)| (*name, deps.as_slice()))
        .collect();
    seed_workflow(&h.store, "W", &edge_refs);

    for (name, deps) in dag {
        if deps.is_empty() {
            let mut job = h.job("W", name);
            enqueue_job(h.store.as_ref(), h.queue.as_ref(), &mut job)
                .await
                .unwrap();
        }
    }

    let coordinator = Arc::new(h.coordinator());
    let mut cursor = 0;
    let mut delivered = 0;
    loop {
        let calls = h.queue.calls();
        if cursor >= calls.len() {
            break;
        }
        let wave: Vec<ExecutionRequest> = calls[cursor..]
            .iter()
            .map(|call| match call {
                QueueCall::Enqueue { request, .. } => request.clone(),
                QueueCall::ScheduleAfter { request, .. } => request.clone(),
            })
            .collect();
        cursor = calls.len();

        let mut redeliver = Vec::new();
        let mut handles = Vec::new();
        for request in wave {
            if duplicate[delivered % duplicate.len()] {
                redeliver.push(request.clone());
            }
            delivered += 1;

            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move {
                coordinator
                    .perform(&request.workflow_id, &request.job_id)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for request in redeliver {
            coordinator
                .perform(&request.workflow_id, &request.job_id)
                .await
                .unwrap();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_job_is_enqueued_exactly_once(
        dag in dag_strategy(12),
        duplicate in proptest::collection::vec(any::<bool>(), 1..8),
    ) {
        let h = Harness::new();
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(drive(&h, &dag, &duplicate));

        for (name, _) in &dag {
            prop_assert_eq!(h.queue.enqueue_count(name), 1, "job {} enqueue count", name);
            prop_assert_eq!(h.state_of("W", name), JobState::Succeeded);
        }
    }
}
