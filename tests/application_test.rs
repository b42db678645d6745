//! Tests for application binding, attempt replacement, and completion
//! reporting through queue metrics.

mod common;

use std::sync::Arc;

use common::{attempt, policies};
use prometheus_fair_queues::builders::{build_queue_tree, in_memory_leaves, QueueTree};
use prometheus_fair_queues::config::AllocationConfig;
use prometheus_fair_queues::core::{Queue, SchedulerApplication};
use prometheus_fair_queues::infra::leaf::InMemoryLeafQueue;
use prometheus_fair_queues::util::serde::{AppFinalState, Priority};

fn tree() -> QueueTree<InMemoryLeafQueue> {
    let cfg = AllocationConfig::from_json_str(
        r#"{ "queues": { "root.eng.ml": {}, "root.eng.web": {}, "root.ops": {} } }"#,
    )
    .unwrap();
    build_queue_tree(&cfg, policies, in_memory_leaves()).unwrap()
}

fn queue(tree: &QueueTree<InMemoryLeafQueue>, name: &str) -> Arc<dyn Queue> {
    tree.get(name).unwrap()
}

#[test]
fn test_new_application_has_no_attempt() {
    let tree = tree();
    let app: SchedulerApplication<u32> = SchedulerApplication::new(
        queue(&tree, "root.eng.ml"),
        "alice",
        Some("s3cret".to_string()),
        Priority(5),
    );
    assert_eq!(app.queue().name(), "root.eng.ml");
    assert_eq!(app.user(), "alice");
    assert_eq!(app.user_password(), Some("s3cret"));
    assert_eq!(app.priority(), Priority(5));
    assert!(app.current_app_attempt().is_none());

    let rendered = format!("{app:?}");
    assert!(rendered.contains("alice"));
    assert!(!rendered.contains("s3cret"));
}

#[test]
fn test_attempt_replacement_returns_previous() {
    let tree = tree();
    let mut app = SchedulerApplication::new(queue(&tree, "root.ops"), "bob", None, Priority::default());
    assert_eq!(app.set_current_app_attempt(attempt(1)), None);
    assert_eq!(app.set_current_app_attempt(attempt(2)), Some(attempt(1)));
    assert_eq!(app.current_app_attempt(), Some(&attempt(2)));
}

#[test]
fn test_move_between_queues() {
    let tree = tree();
    let mut app: SchedulerApplication<u32> =
        SchedulerApplication::new(queue(&tree, "root.eng.ml"), "alice", None, Priority(1));
    app.set_queue(queue(&tree, "root.eng.web"));
    assert_eq!(app.queue().name(), "root.eng.web");
    app.stop(AppFinalState::Finished);

    assert_eq!(tree.metrics("root.eng.web").unwrap().finished_apps().len(), 1);
    assert!(tree.metrics("root.eng.ml").unwrap().finished_apps().is_empty());
}

#[test]
fn test_stop_reports_to_queue_and_ancestors() {
    let tree = tree();
    let states = [
        ("alice", AppFinalState::Finished),
        ("bob", AppFinalState::Failed),
        ("carol", AppFinalState::Finished),
    ];
    for (user, state) in states {
        let app: SchedulerApplication<u32> =
            SchedulerApplication::new(queue(&tree, "root.eng.ml"), user, None, Priority(1));
        app.stop(state);
    }
    let other: SchedulerApplication<u32> =
        SchedulerApplication::new(queue(&tree, "root.ops"), "dave", None, Priority(1));
    other.stop(AppFinalState::Killed);

    let ml = tree.metrics("root.eng.ml").unwrap();
    let finished = ml.finished_apps();
    assert_eq!(finished.len(), 3);
    assert_eq!(finished[1].user, "bob");
    assert_eq!(finished[1].state, AppFinalState::Failed);
    assert_eq!(finished[1].queue, "root.eng.ml");
    assert_eq!(ml.finished_count(AppFinalState::Finished), 2);

    let eng = tree.metrics("root.eng").unwrap();
    assert_eq!(eng.finished_apps().len(), 3);
    assert_eq!(eng.finished_count(AppFinalState::Killed), 0);

    let root = tree.metrics("root").unwrap();
    assert_eq!(root.finished_apps().len(), 4);
    assert_eq!(root.finished_count(AppFinalState::Killed), 1);
    assert_eq!(root.finished_apps()[3].queue, "root");
}

#[test]
fn test_application_follows_leaf_lifecycle() {
    let tree = tree();
    let leaf = Arc::clone(tree.leaf("root.eng.ml").unwrap());
    let mut app = SchedulerApplication::new(
        Arc::clone(&leaf) as Arc<dyn Queue>,
        "alice",
        None,
        Priority(3),
    );
    let id = attempt(42);
    app.set_current_app_attempt(id);
    assert!(leaf.submit(id, app.user()));
    assert_eq!(tree.root().num_runnable_apps(), 1);

    assert_eq!(leaf.finish(id).as_deref(), Some("alice"));
    app.stop(AppFinalState::Finished);
    assert_eq!(tree.root().num_runnable_apps(), 0);
    assert_eq!(
        tree.metrics("root").unwrap().finished_count(AppFinalState::Finished),
        1
    );
}
