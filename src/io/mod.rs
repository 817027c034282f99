//! IO leaves and their lifecycle.
//!
//! An [`IoLeaf`] describes one external effect. The [`Manager`] reconciles a
//! tree against the effects it has started: new leaves get an identity and
//! are started, leaves that disappear are cancelled, and effect output is
//! routed back to the leaf's current position.
//!
//! # Key Concepts
//!
//! - **IoId**: stable integer identity, assigned once, never reused
//! - **Push**: the callback an effect uses to report output
//! - **IoArena**: table of running effects and their cancel callbacks
//! - **IoIndex**: pure classification of a tree's leaves

mod arena;
mod index;
mod manager;

pub use arena::IoArena;
pub use index::{IoIndex, PendingIo};
pub use manager::{Manager, ManagerError};

use crate::core::{Event, KeyPath};
use crate::dispatch::DispatchError;
use crate::entity::Transition;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of a registered effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IoId(u64);

impl IoId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stops a running effect. Called at most once.
pub type Cancel = Arc<dyn Fn() + Send + Sync>;

/// Delivers a routing event into the runtime outside the current call.
pub type Deliver = Arc<dyn Fn(Event) + Send + Sync>;

/// Begins an effect. Returns its cancel callback, if it has one.
pub type StartFn = Arc<dyn Fn(Push) -> Option<Cancel> + Send + Sync>;

/// Callback handed to a started effect, bound to its identity.
///
/// Each call requests delivery of `Route { id, event }`. Safe to call from
/// any thread, any number of times, after the leaf is gone.
#[derive(Clone)]
pub struct Push {
    id: IoId,
    deliver: Deliver,
}

impl Push {
    pub(crate) fn new(id: IoId, deliver: Deliver) -> Self {
        Self { id, deliver }
    }

    pub fn id(&self) -> IoId {
        self.id
    }

    pub fn push(&self, event: impl Into<Event>) {
        (self.deliver)(Event::route(self.id, event.into()));
    }
}

impl fmt::Debug for Push {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Push").field("id", &self.id).finish()
    }
}

/// A leaf describing one external effect.
///
/// The leaf needs registration until the manager writes an identity into
/// it with a `Register` event.
///
/// # Example
///
/// ```rust
/// use causeway::core::{Event, KeyPath};
/// use causeway::io::{IoId, IoLeaf};
///
/// let leaf = IoLeaf::new(|push| {
///     push.push(Event::custom("Clock.Tick"));
///     None
/// });
/// assert!(leaf.needs_registration());
///
/// let registered = leaf
///     .update(&Event::Register { id: IoId::new(7) }, &KeyPath::root())
///     .unwrap();
/// let registered = registered.node.as_io().unwrap();
/// assert_eq!(registered.id(), Some(IoId::new(7)));
/// assert!(!registered.needs_registration());
/// ```
#[derive(Clone)]
pub struct IoLeaf {
    start: StartFn,
    id: Option<IoId>,
    label: Option<String>,
}

impl IoLeaf {
    pub fn new<F>(start: F) -> Self
    where
        F: Fn(Push) -> Option<Cancel> + Send + Sync + 'static,
    {
        Self {
            start: Arc::new(start),
            id: None,
            label: None,
        }
    }

    /// Attach a diagnostic label.
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn id(&self) -> Option<IoId> {
        self.id
    }

    pub fn needs_registration(&self) -> bool {
        self.id.is_none()
    }

    /// Begin the effect.
    pub fn start(&self, push: Push) -> Option<Cancel> {
        (self.start)(push)
    }

    /// React to the manager's events.
    ///
    /// `Register` records the identity, `Emit` re-emits the effect's event
    /// to the parent, and `Start` is accepted without change.
    pub fn update(&self, event: &Event, from: &KeyPath) -> Result<Transition, DispatchError> {
        match event {
            Event::Register { id } => Ok(Transition::new(Self {
                id: Some(*id),
                ..self.clone()
            })),
            Event::Emit { event } => Ok(Transition::with_events(
                self.clone(),
                vec![event.as_ref().clone()],
            )),
            Event::Start => Ok(Transition::new(self.clone())),
            Event::Finished { .. }
            | Event::Route { .. }
            | Event::Descendent { .. }
            | Event::Task(_)
            | Event::Custom(_) => Err(DispatchError::Unhandled {
                entity: "IO".to_string(),
                event: event.name().to_string(),
                state: None,
                from: from.clone(),
            }),
        }
    }
}

impl PartialEq for IoLeaf {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.start, &other.start) && self.id == other.id && self.label == other.label
    }
}

impl fmt::Debug for IoLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoLeaf")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
