//! End-to-end tests driving trees through the runtime queue.

use causeway::config::Config;
use causeway::core::{Event, EventKind, KeyPath, Node};
use causeway::dispatch::ignore;
use causeway::entity::EntityType;
use causeway::io::{IoId, IoLeaf};
use causeway::runtime::{resolve, Runtime, TaskFailed};
use causeway::ManagerError;
use causeway::task::{Task, TaskEvent, TaskState, TaskStatus};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn task_state(runtime: &Runtime, path: &str) -> Option<TaskState> {
    let node = runtime.root()?.get_in(&KeyPath::parse(path))?;
    Task::from_node(node).map(|task| task.state())
}

#[tokio::test]
async fn resolve_returns_async_output() {
    let task = Task::from_async_call(
        "hello".to_string(),
        |greeting: String, name: String| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, String>(format!("{greeting}, {name}"))
        },
        "world".to_string(),
    );

    let value = resolve(task).await.unwrap();

    assert_eq!(value, json!("hello, world"));
}

#[tokio::test]
async fn resolve_rejects_with_task_error() {
    let task = Task::from_async_call(
        (),
        |(), ()| async { Err::<i64, _>("service unavailable") },
        (),
    );

    let error = resolve(task).await.unwrap_err();

    assert_eq!(
        error,
        TaskFailed::Failure {
            error: json!("service unavailable")
        }
    );
    assert_eq!(error.to_string(), "Task failed: \"service unavailable\"");
}

#[tokio::test]
async fn synchronous_panic_settles_as_failure() {
    let task = Task::from_async_call(
        (),
        |(), ()| -> std::future::Ready<Result<i64, String>> { panic!("thrown before await") },
        (),
    );
    let mut runtime = Runtime::with_config(task, Config::default());

    runtime.start().unwrap();
    assert_eq!(task_state(&runtime, ""), Some(TaskState::Initial));

    let events = runtime.step().await.unwrap().unwrap();
    assert_eq!(events, vec![Event::from(TaskEvent::Running)]);
    assert_eq!(task_state(&runtime, ""), Some(TaskState::Running));

    let events = runtime.step().await.unwrap().unwrap();
    assert_eq!(events, vec![Event::from(TaskEvent::failure("thrown before await"))]);
    assert_eq!(
        Task::status(runtime.root().unwrap()),
        Some(TaskStatus::Failure(json!("thrown before await")))
    );
    assert!(runtime.manager().arena().is_empty());
}

#[tokio::test]
async fn panic_after_await_settles_as_failure() {
    let task = Task::from_async_call(
        (),
        |(), ()| async {
            tokio::task::yield_now().await;
            if true {
                panic!("thrown after await");
            }
            Ok::<i64, String>(0)
        },
        (),
    );

    let error = resolve(task).await.unwrap_err();

    assert_eq!(
        error,
        TaskFailed::Failure {
            error: json!("thrown after await")
        }
    );
}

#[tokio::test]
async fn tasks_in_a_list_settle_independently() {
    let fast = Task::from_resolved_call((), |(), ()| Ok::<_, String>(1), ());
    let slow = Task::from_async_call(
        (),
        |(), ()| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, String>(2)
        },
        (),
    );
    let board = EntityType::builder("Board")
        .field("tasks", Node::list([Node::from(fast), Node::from(slow)]))
        .on(EventKind::Start, ignore)
        .on("*", ignore)
        .build()
        .unwrap();
    let mut runtime = Runtime::with_config(board.create(), Config::default());

    runtime.start().unwrap();
    runtime.tick().unwrap();
    assert_eq!(task_state(&runtime, "tasks.0"), Some(TaskState::Success));
    assert_eq!(task_state(&runtime, "tasks.1"), Some(TaskState::Running));

    while task_state(&runtime, "tasks.1") != Some(TaskState::Success) {
        runtime.next().await.unwrap().unwrap();
    }

    let slow = Task::from_node(runtime.root().unwrap().get_in(&KeyPath::parse("tasks.1")).unwrap());
    assert_eq!(slow.unwrap().value(), Some(&json!(2)));
    assert!(runtime.manager().arena().is_empty());
}

#[tokio::test]
async fn journal_records_delivered_and_dropped_routes() {
    let leaf = IoLeaf::new(|push| {
        push.push(Event::custom("Clock.Tick"));
        None
    });
    let clock = EntityType::builder("Clock")
        .field("source", leaf)
        .on(EventKind::Start, ignore)
        .from("source", |clock, _, _| Ok(clock.set("source", Node::Null)?.into()))
        .build()
        .unwrap();
    let mut runtime = Runtime::with_config(clock.create(), Config::default());

    runtime.start().unwrap();
    runtime.tick().unwrap();
    runtime
        .dispatch(Event::route(IoId::new(0), Event::custom("Clock.Tick")))
        .unwrap();

    let journal = runtime.journal();
    assert_eq!(journal.len(), 2);
    assert_eq!(journal.delivered().count(), 1);
    let dropped: Vec<_> = journal.dropped().collect();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].event, "Clock.Tick");
    assert_eq!(
        journal.records().next().and_then(|record| record.path.clone()),
        Some(KeyPath::parse("source"))
    );
}

fn pushes(name: &'static str) -> IoLeaf {
    IoLeaf::new(move |push| {
        push.push(Event::custom(name));
        None
    })
}

#[tokio::test]
async fn failed_tick_keeps_events_of_applied_routes() {
    let root = EntityType::builder("Root")
        .field("a", pushes("A.Done"))
        .field("b", pushes("B.Bad"))
        .on(EventKind::Start, ignore)
        .from("a", |root, _, _| {
            Ok((root.set("a", Node::Null)?, vec![Event::custom("Root.Seen")]).into())
        })
        .build()
        .unwrap();
    let mut runtime = Runtime::with_config(root.create(), Config::default());

    runtime.start().unwrap();
    let batch = runtime.tick().unwrap_err();

    assert_eq!(batch.events, vec![Event::custom("Root.Seen")]);
    assert_eq!(batch.to_string(), "Root does not respond to B.Bad from b");
    assert!(matches!(batch.error, ManagerError::Dispatch(_)));
    let root = runtime.root().unwrap();
    assert_eq!(root.get_in(&KeyPath::parse("a")), Some(&Node::Null));
    assert!(root.get_in(&KeyPath::parse("b")).and_then(Node::as_io).is_some());
}

#[tokio::test]
async fn unsettled_start_can_be_retried_without_duplicate_effects() {
    let starts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counted = Arc::clone(&starts);
    let leaf = IoLeaf::new(move |_| {
        counted.fetch_add(1, Ordering::SeqCst);
        None
    });
    let mut runtime = Runtime::with_config(leaf.clone(), Config::default().max_settle_passes(0));

    assert!(runtime.start().is_err());
    assert!(runtime.start().is_err());
    assert_eq!(starts.load(Ordering::SeqCst), 0);

    let mut runtime = Runtime::with_config(leaf, Config::default().max_settle_passes(1));
    runtime.start().unwrap();
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert_eq!(runtime.manager().arena().len(), 1);
}

#[derive(Clone)]
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn cancelling_a_running_task_aborts_it() {
    let dropped = Arc::new(AtomicBool::new(false));
    let task = Task::from_async_call(
        DropFlag(Arc::clone(&dropped)),
        |flag: DropFlag, ()| async move {
            let _held = flag;
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, String>(())
        },
        (),
    );
    let holder = EntityType::builder("Holder")
        .field("task", task)
        .on(EventKind::Start, ignore)
        .on(EventKind::TaskRunning, |holder, _, _| {
            Ok(holder.set("task", Node::Null)?.into())
        })
        .build()
        .unwrap();
    let mut runtime = Runtime::with_config(holder.create(), Config::default());

    runtime.start().unwrap();
    runtime.step().await.unwrap().unwrap();

    assert!(runtime.manager().arena().is_empty());
    assert_eq!(runtime.manager().arena().retired_count(), 1);
    assert!(!runtime.manager().arena().is_live(IoId::new(0)));
    for _ in 0..100 {
        if dropped.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(dropped.load(Ordering::SeqCst));
}
