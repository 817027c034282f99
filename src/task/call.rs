//! Task constructors that wrap a call in a cause leaf.

use super::{Task, TaskEvent};
use crate::io::{Cancel, IoLeaf, Push};
use futures::FutureExt;
use serde::Serialize;
use std::any::{type_name, Any};
use std::fmt::Display;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

type Outcome<T, E> = Result<Result<T, E>, Box<dyn Any + Send>>;

impl Task {
    /// Task whose cause runs `operation(receiver, args)` on the tokio
    /// runtime.
    ///
    /// The cause reports `Started` as soon as it is started, then exactly one
    /// of `Success` with the serialized output or `Failure` with the error
    /// text. A panic, before or after the first await, counts as failure.
    /// Cancelling the cause aborts the spawned call.
    pub fn from_async_call<R, A, F, Fut, T, E>(receiver: R, operation: F, args: A) -> Self
    where
        R: Clone + Send + Sync + 'static,
        A: Clone + Send + Sync + 'static,
        F: Fn(R, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + Send + 'static,
        E: Display + Send + 'static,
    {
        let operation = Arc::new(operation);
        let cause = IoLeaf::new(move |push: Push| {
            push.push(TaskEvent::Started);

            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                warn!(id = %push.id(), "no tokio runtime to run the task on");
                push.push(TaskEvent::failure("no tokio runtime is running"));
                return None;
            };

            let operation = Arc::clone(&operation);
            let (receiver, args) = (receiver.clone(), args.clone());
            let call = async move { operation(receiver, args).await };
            let spawned = handle.spawn(async move {
                let outcome = AssertUnwindSafe(call).catch_unwind().await;
                push.push(outcome_event(outcome));
            });

            let abort = spawned.abort_handle();
            Some(Arc::new(move || abort.abort()) as Cancel)
        })
        .labeled(type_name::<F>());

        Self::new(cause)
    }

    /// Task whose cause runs `operation(receiver, args)` synchronously while
    /// starting. Reports the same events as [`Task::from_async_call`].
    pub fn from_resolved_call<R, A, F, T, E>(receiver: R, operation: F, args: A) -> Self
    where
        R: Clone + Send + Sync + 'static,
        A: Clone + Send + Sync + 'static,
        F: Fn(R, A) -> Result<T, E> + Send + Sync + 'static,
        T: Serialize,
        E: Display,
    {
        let cause = IoLeaf::new(move |push: Push| {
            push.push(TaskEvent::Started);
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                operation(receiver.clone(), args.clone())
            }));
            push.push(outcome_event(outcome));
            None
        })
        .labeled(type_name::<F>());

        Self::new(cause)
    }

    /// Wrap an async function so that calling it yields a task.
    ///
    /// # Example
    ///
    /// ```rust
    /// use causeway::task::{Task, TaskReturning, TaskState};
    ///
    /// fn returns_task<F: TaskReturning>(_: &F) {}
    ///
    /// let double = Task::from_async(|n: i64| async move { Ok::<_, String>(n * 2) });
    /// let task = double.call(21);
    ///
    /// returns_task(&double);
    /// assert_eq!(task.state(), TaskState::Initial);
    /// ```
    pub fn from_async<F>(operation: F) -> TaskFn<F> {
        TaskFn {
            operation: Arc::new(operation),
        }
    }
}

/// Marker for functions whose result is a [`Task`].
pub trait TaskReturning {}

/// An async function marked as task-returning.
pub struct TaskFn<F> {
    operation: Arc<F>,
}

impl<F> TaskFn<F> {
    pub fn call<A, Fut, T, E>(&self, args: A) -> Task
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + Send + 'static,
        E: Display + Send + 'static,
    {
        let operation = Arc::clone(&self.operation);
        Task::from_async_call((), move |(), args: A| operation(args), args)
    }
}

impl<F> Clone for TaskFn<F> {
    fn clone(&self) -> Self {
        Self {
            operation: Arc::clone(&self.operation),
        }
    }
}

impl<F> TaskReturning for TaskFn<F> {}

fn outcome_event<T: Serialize, E: Display>(outcome: Outcome<T, E>) -> TaskEvent {
    match outcome {
        Ok(Ok(output)) => match serde_json::to_value(output) {
            Ok(value) => TaskEvent::Success { value },
            Err(error) => TaskEvent::failure(format!("task output is not serializable: {error}")),
        },
        Ok(Err(error)) => TaskEvent::failure(error.to_string()),
        Err(panic) => TaskEvent::failure(panic_message(panic.as_ref())),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Event;
    use crate::io::IoId;
    use serde_json::json;
    use std::sync::Mutex;

    fn capture() -> (Push, Arc<Mutex<Vec<Event>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let push = Push::new(
            IoId::new(0),
            Arc::new(move |event| sink.lock().unwrap().push(event)),
        );
        (push, seen)
    }

    fn routed(events: &[TaskEvent]) -> Vec<Event> {
        events
            .iter()
            .cloned()
            .map(|event| Event::route(IoId::new(0), event.into()))
            .collect()
    }

    #[test]
    fn resolved_call_reports_success() {
        let task = Task::from_resolved_call(10, |base: i64, n: i64| Ok::<_, String>(base + n), 5);
        let (push, seen) = capture();

        let cancel = task.cause().unwrap().start(push);

        assert!(cancel.is_none());
        assert_eq!(
            *seen.lock().unwrap(),
            routed(&[TaskEvent::Started, TaskEvent::Success { value: json!(15) }])
        );
    }

    #[test]
    fn resolved_call_reports_errors_and_panics() {
        let failing = Task::from_resolved_call((), |(), ()| Err::<i64, _>("nope"), ());
        let panicking = Task::from_resolved_call(
            (),
            |(), ()| -> Result<i64, String> { panic!("exploded") },
            (),
        );

        let (push, seen) = capture();
        failing.cause().unwrap().start(push);
        let (push, panicked) = capture();
        panicking.cause().unwrap().start(push);

        assert_eq!(
            *seen.lock().unwrap(),
            routed(&[TaskEvent::Started, TaskEvent::failure("nope")])
        );
        assert_eq!(
            *panicked.lock().unwrap(),
            routed(&[TaskEvent::Started, TaskEvent::failure("exploded")])
        );
    }

    #[test]
    fn async_call_without_runtime_fails() {
        let task = Task::from_async_call((), |(), ()| async { Ok::<_, String>(1) }, ());
        let (push, seen) = capture();

        let cancel = task.cause().unwrap().start(push);

        assert!(cancel.is_none());
        assert_eq!(
            *seen.lock().unwrap(),
            routed(&[
                TaskEvent::Started,
                TaskEvent::failure("no tokio runtime is running")
            ])
        );
    }

    #[test]
    fn unserializable_output_is_a_failure() {
        struct Opaque;
        impl Serialize for Opaque {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("opaque"))
            }
        }

        let event = outcome_event::<_, String>(Ok(Ok(Opaque)));

        assert_eq!(
            event,
            TaskEvent::failure("task output is not serializable: opaque")
        );
    }

    fn marked<F: TaskReturning>(_: &F) -> bool {
        true
    }

    #[test]
    fn task_fns_are_marked() {
        let double = Task::from_async(|n: i64| async move { Ok::<_, String>(n * 2) });
        assert!(marked(&double));
        assert!(double.clone().call(2).cause().is_some());
    }
}
