//! Tasks: one asynchronous call mapped onto the entity model.
//!
//! A task starts `Initial` with a `cause` leaf that performs the call. The
//! leaf reports `Started`, then exactly one of `Success` or `Failure`:
//!
//! ```text
//! Initial --Task.Started--> Running --Task.Success--> Success
//!                                   --Task.Failure--> Failure
//! ```
//!
//! Settling clears `cause`, so the manager retires the leaf.
//!
//! # Example
//!
//! ```rust
//! use causeway::task::{Task, TaskState};
//!
//! let task = Task::from_resolved_call((), |(), n: i64| Ok::<_, String>(n * 2), 21);
//!
//! assert_eq!(task.state(), TaskState::Initial);
//! assert!(task.cause().is_some());
//! ```

mod call;

pub use call::{TaskFn, TaskReturning};

use crate::core::{Event, EventKind, KeyPath, Node, State};
use crate::dispatch::{ignore, DispatchError};
use crate::entity::{Entity, EntityType, Transition};
use crate::io::IoLeaf;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

crate::state_enum! {
    pub enum TaskState {
        Initial,
        Running,
        Success,
        Failure,
    }
    final: [Success, Failure]
    error: [Failure]
}

/// Events a task's cause reports, and the task re-emits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TaskEvent {
    Started,
    Running,
    Success { value: Value },
    Failure { error: Value },
}

impl TaskEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Started => EventKind::TaskStarted,
            Self::Running => EventKind::TaskRunning,
            Self::Success { .. } => EventKind::TaskSuccess,
            Self::Failure { .. } => EventKind::TaskFailure,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: Value::String(error.into()),
        }
    }
}

/// Snapshot of a task's progress.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskStatus {
    Initial,
    Running,
    Success(Value),
    Failure(Value),
}

impl TaskStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Failure(_))
    }
}

/// The `Task` entity type, compiled once.
pub fn task_type() -> &'static Arc<EntityType> {
    static TASK: OnceLock<Arc<EntityType>> = OnceLock::new();
    TASK.get_or_init(|| {
        EntityType::builder("Task")
            .field("cause", Node::Null)
            .field("value", Node::Null)
            .field("error", Node::Null)
            .state(TaskState::Initial, |rules| {
                rules.on(EventKind::TaskStarted, |task, _, _| {
                    let running = task.set_state(&TaskState::Running)?;
                    Ok((running, vec![Event::from(TaskEvent::Running)]).into())
                })
            })
            .state(TaskState::Running, |rules| {
                rules
                    .on(EventKind::TaskSuccess, settle)
                    .on(EventKind::TaskFailure, settle)
            })
            .state(TaskState::Success, |rules| rules)
            .state(TaskState::Failure, |rules| rules)
            .on(EventKind::Start, ignore)
            .build()
            .expect("Task declarations are valid")
    })
}

fn settle(task: &Entity, event: &Event, from: &KeyPath) -> Result<Transition, DispatchError> {
    let settled = match event {
        Event::Task(TaskEvent::Success { value }) => task
            .set_state(&TaskState::Success)?
            .set("value", value.clone())?,
        Event::Task(TaskEvent::Failure { error }) => task
            .set_state(&TaskState::Failure)?
            .set("error", error.clone())?,
        _ => {
            return Err(DispatchError::Unhandled {
                entity: task.type_name().to_string(),
                event: event.name().to_string(),
                state: task.state().map(str::to_string),
                from: from.clone(),
            })
        }
    };

    Ok((settled.set("cause", Node::Null)?, vec![event.clone()]).into())
}

/// Typed view of a `Task` entity value.
#[derive(Clone, Debug, PartialEq)]
pub struct Task(Entity);

impl Task {
    /// Task in `Initial` whose effect is `cause`.
    pub fn new(cause: IoLeaf) -> Self {
        let ty = task_type();
        let mut fields = ty.fields.clone();
        fields.insert("cause".to_string(), Node::Io(cause));
        Self(Entity::new(
            Arc::clone(ty),
            Some(TaskState::Initial.name().to_string()),
            fields,
        ))
    }

    /// The task held by `node`, if it is one.
    pub fn from_node(node: &Node) -> Option<Self> {
        node.as_entity()
            .filter(|entity| entity.is_a(task_type()))
            .cloned()
            .map(Self)
    }

    pub fn status(node: &Node) -> Option<TaskStatus> {
        Self::from_node(node).map(|task| task.to_status())
    }

    pub fn state(&self) -> TaskState {
        self.0.state_as().unwrap_or(TaskState::Initial)
    }

    pub fn to_status(&self) -> TaskStatus {
        let field = |name: &str| self.0.value(name).cloned().unwrap_or(Value::Null);
        match self.state() {
            TaskState::Initial => TaskStatus::Initial,
            TaskState::Running => TaskStatus::Running,
            TaskState::Success => TaskStatus::Success(field("value")),
            TaskState::Failure => TaskStatus::Failure(field("error")),
        }
    }

    /// The effect performing the call, until the task settles.
    pub fn cause(&self) -> Option<&IoLeaf> {
        self.0.get("cause").and_then(Node::as_io)
    }

    pub fn value(&self) -> Option<&Value> {
        self.0.value("value")
    }

    pub fn error(&self) -> Option<&Value> {
        self.0.value("error")
    }

    pub fn entity(&self) -> &Entity {
        &self.0
    }
}

impl From<Task> for Node {
    fn from(task: Task) -> Self {
        Node::Entity(task.0)
    }
}
