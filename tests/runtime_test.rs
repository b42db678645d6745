//! Tests for the scheduling driver and the tokio update loop.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{attempt, node, policies};
use prometheus_fair_queues::builders::{build_queue_tree, in_memory_leaves, QueueTree};
use prometheus_fair_queues::config::AllocationConfig;
use prometheus_fair_queues::core::{AppResult, Queue, ResourceVector};
use prometheus_fair_queues::infra::leaf::InMemoryLeafQueue;
use prometheus_fair_queues::runtime::{health, snapshot, spawn_update_loop, SchedulingDriver};
use prometheus_fair_queues::util::telemetry::init_tracing;

fn tree() -> QueueTree<InMemoryLeafQueue> {
    let cfg = AllocationConfig::from_json_str(
        r#"{ "queues": { "root.a": { "weight": 1.0 }, "root.b": { "weight": 3.0 } } }"#,
    )
    .unwrap();
    build_queue_tree(&cfg, policies, in_memory_leaves()).unwrap()
}

fn start(json: &str, capacity: ResourceVector) -> AppResult<SchedulingDriver> {
    init_tracing();
    let cfg = AllocationConfig::from_json_str(json).map_err(anyhow::Error::msg)?;
    let tree = build_queue_tree(&cfg, policies, in_memory_leaves())?;
    Ok(SchedulingDriver::new(Arc::clone(tree.root()), capacity))
}

#[test]
fn test_startup_errors_surface_through_app_result() {
    let driver = start(r#"{ "queues": { "root.a": {} } }"#, ResourceVector::new(8, 8)).unwrap();
    assert!(health(driver.root().as_ref()).ok);
    assert_eq!(health(driver.root().as_ref()).queues, 2);

    let err = start(r#"{ "queues": { "root.a": { "weight": 0 } } }"#, ResourceVector::zero())
        .unwrap_err();
    assert!(err.to_string().contains("weight must be positive"));

    let err = start(r#"{ "default_policy": "drf" }"#, ResourceVector::zero()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<prometheus_fair_queues::core::QueueError>(),
        Some(prometheus_fair_queues::core::QueueError::UnknownPolicy(_))
    ));
}

#[test]
fn test_capacity_change_redistributes_steady_shares() {
    let tree = tree();
    let driver = SchedulingDriver::new(Arc::clone(tree.root()), ResourceVector::new(100, 8));
    assert_eq!(
        tree.get("root.b").unwrap().steady_fair_share(),
        ResourceVector::new(75, 6)
    );
    driver.set_cluster_capacity(ResourceVector::new(200, 16));
    assert_eq!(driver.cluster_capacity(), ResourceVector::new(200, 16));
    assert_eq!(
        tree.get("root.a").unwrap().steady_fair_share(),
        ResourceVector::new(50, 4)
    );
    assert_eq!(
        tree.metrics("root").unwrap().steady_fair_share(),
        ResourceVector::new(200, 16)
    );
}

#[test]
fn test_per_node_assignment_cap() {
    let tree = tree();
    let a = tree.leaf("root.a").unwrap();
    a.submit(attempt(1), "alice");
    for _ in 0..10 {
        a.request(attempt(1), ResourceVector::new(1, 1));
    }
    let driver = SchedulingDriver::new(Arc::clone(tree.root()), ResourceVector::new(100, 100))
        .with_max_assign_per_node(3);
    let mut nodes = vec![node("n1", 50, 50), node("n2", 50, 50)];
    let report = driver.run_cycle(&mut nodes, 0);
    assert_eq!(report.assignments.len(), 2);
    assert!(report.assignments.iter().all(|a| a.containers == 3));
    assert_eq!(a.pending_requests(), 4);

    let second = driver.run_cycle(&mut nodes, 1);
    assert_eq!(second.cycle, 2);
    assert_eq!(second.total_assigned(), ResourceVector::new(4, 4));
    assert_eq!(second.demand, ResourceVector::new(10, 10));
}

#[test]
fn test_update_refreshes_preemption_timestamps() {
    let tree = tree();
    let driver = SchedulingDriver::new(Arc::clone(tree.root()), ResourceVector::new(100, 100));
    let b = tree.leaf("root.b").unwrap();
    b.submit(attempt(1), "alice");
    b.request(attempt(1), ResourceVector::new(10, 1));

    let start = b.base().preemption_timestamps();
    let far_future = start.last_time_at_min_share + 1_000_000;
    driver.update(far_future);
    // Demand is unmet and the fair share is not reached.
    let after = b.base().preemption_timestamps();
    assert_eq!(after.last_time_at_min_share, far_future);
    assert_eq!(
        after.last_time_at_fair_share_threshold,
        start.last_time_at_fair_share_threshold
    );

    let snap = snapshot(tree.root().as_ref());
    assert_eq!(snap.children[1].fair_share, ResourceVector::new(75, 75));
    assert_eq!(snap.children[1].demand, ResourceVector::new(10, 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_loop_runs_periodically() {
    let tree = tree();
    let a = Arc::clone(tree.leaf("root.a").unwrap());
    a.submit(attempt(1), "alice");
    a.request(attempt(1), ResourceVector::new(8, 2));

    let driver = Arc::new(SchedulingDriver::new(
        Arc::clone(tree.root()),
        ResourceVector::new(40, 40),
    ));
    let handle = spawn_update_loop(
        &tokio::runtime::Handle::current(),
        Arc::clone(&driver),
        Duration::from_millis(10),
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(tree.root().demand(), ResourceVector::new(8, 2));
    assert_eq!(a.fair_share(), ResourceVector::new(10, 10));

    a.request(attempt(1), ResourceVector::new(4, 1));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(tree.root().demand(), ResourceVector::new(12, 3));

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
}
