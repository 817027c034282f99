//! Queue-driven driver for a [`Manager`].
//!
//! Effects push from anywhere; their routes land on an unbounded queue and
//! are applied on the runtime's own turns, never on the pusher's stack. The
//! runtime is the single owner of the manager.
//!
//! # Example
//!
//! ```rust
//! use causeway::core::Event;
//! use causeway::runtime::Runtime;
//! use causeway::task::{Task, TaskEvent, TaskStatus};
//! use serde_json::json;
//!
//! let task = Task::from_resolved_call((), |(), n: i64| Ok::<_, String>(n + 1), 41);
//! let mut runtime = Runtime::new(task);
//!
//! runtime.start().unwrap();
//! let events = runtime.tick().unwrap();
//!
//! assert_eq!(events.last(), Some(&Event::from(TaskEvent::Success { value: json!(42) })));
//! assert_eq!(
//!     Task::status(runtime.root().unwrap()),
//!     Some(TaskStatus::Success(json!(42)))
//! );
//! ```

mod journal;

pub use journal::{Journal, RouteRecord};

use crate::config::Config;
use crate::core::{Event, Node};
use crate::io::{Manager, ManagerError};
use crate::task::TaskEvent;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Why [`resolve`] did not produce a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskFailed {
    #[error("Task failed: {error}")]
    Failure { error: Value },

    #[error(transparent)]
    Runtime(#[from] ManagerError),

    #[error("Task finished without settling")]
    Abandoned,
}

/// A queued event failed part way through a batch.
///
/// Events before the failing one were applied; `events` holds what they
/// sent past the root. The failing event left the manager unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct BatchError {
    pub events: Vec<Event>,
    pub error: ManagerError,
}

impl From<ManagerError> for BatchError {
    fn from(error: ManagerError) -> Self {
        Self {
            events: Vec::new(),
            error,
        }
    }
}

/// Owner of a manager and the queue its effects push onto.
pub struct Runtime {
    manager: Manager,
    inbox: mpsc::UnboundedReceiver<Event>,
    journal: Journal,
    config: Config,
}

impl Runtime {
    /// Runtime for `root`, configured from the environment.
    pub fn new(root: impl Into<Node>) -> Self {
        Self::with_config(root, Config::from_env())
    }

    pub fn with_config(root: impl Into<Node>, config: Config) -> Self {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let manager = Manager::new(root, move |event| {
            if outbox.send(event).is_err() {
                warn!("runtime queue is closed, dropping pushed event");
            }
        })
        .with_config(config.clone());

        Self {
            manager,
            inbox,
            journal: Journal::with_capacity(config.journal_capacity),
            config,
        }
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn root(&self) -> Option<&Node> {
        self.manager.root()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn is_finished(&self) -> bool {
        self.manager.is_finished()
    }

    /// Begin the tree and its effects.
    pub fn start(&mut self) -> Result<Vec<Event>, ManagerError> {
        self.dispatch(Event::Start)
    }

    /// Apply one event to the manager.
    ///
    /// On error the manager keeps its previous state.
    pub fn dispatch(&mut self, event: Event) -> Result<Vec<Event>, ManagerError> {
        if let Event::Route { id, event: routed } = &event {
            let path = self.manager.locate(*id).cloned();
            self.journal.push(RouteRecord::new(*id, routed.name(), path));
        }

        let (manager, events) = self.manager.clone().update(event)?;
        self.manager = manager;
        Ok(events)
    }

    /// Handle what is already queued, up to the configured tick budget.
    ///
    /// Stops at the first event that fails; later events stay queued.
    pub fn tick(&mut self) -> Result<Vec<Event>, BatchError> {
        let mut events = Vec::new();
        for _ in 0..self.config.tick_budget {
            let Ok(event) = self.inbox.try_recv() else {
                break;
            };
            match self.dispatch(event) {
                Ok(more) => events.extend(more),
                Err(error) => return Err(BatchError { events, error }),
            }
        }
        Ok(events)
    }

    /// Wait for one queued event and handle it.
    ///
    /// Returns `None` if the queue has closed.
    pub async fn step(&mut self) -> Option<Result<Vec<Event>, ManagerError>> {
        let event = self.inbox.recv().await?;
        Some(self.dispatch(event))
    }

    /// Wait for one queued event, then handle everything else that is queued.
    pub async fn next(&mut self) -> Option<Result<Vec<Event>, BatchError>> {
        let mut events = match self.step().await? {
            Ok(events) => events,
            Err(error) => return Some(Err(error.into())),
        };
        match self.tick() {
            Ok(more) => events.extend(more),
            Err(mut batch) => {
                events.append(&mut batch.events);
                return Some(Err(BatchError { events, ..batch }));
            }
        }
        Some(Ok(events))
    }
}

/// Run `task` as the root of a fresh runtime until it settles.
///
/// Resolves with the success value, or fails with the task's error.
pub async fn resolve(task: impl Into<Node>) -> Result<Value, TaskFailed> {
    let mut runtime = Runtime::new(task);
    let mut events = runtime.start()?;

    loop {
        if let Some(settled) = settlement(events) {
            return settled;
        }
        if runtime.is_finished() {
            return Err(TaskFailed::Abandoned);
        }

        events = match runtime.next().await {
            Some(Ok(events)) => events,
            Some(Err(batch)) => {
                return settlement(batch.events).unwrap_or(Err(batch.error.into()));
            }
            None => return Err(TaskFailed::Abandoned),
        };
    }
}

fn settlement(events: Vec<Event>) -> Option<Result<Value, TaskFailed>> {
    events.into_iter().find_map(|event| match event {
        Event::Task(TaskEvent::Success { value }) => {
            debug!("resolved task");
            Some(Ok(value))
        }
        Event::Task(TaskEvent::Failure { error }) => Some(Err(TaskFailed::Failure { error })),
        _ => None,
    })
}
