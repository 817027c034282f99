//! The IO lifecycle manager.
//!
//! The manager owns a tree and the table of effects the tree asked for. It
//! answers two events: `Start`, which begins the tree, and `Route`, which
//! delivers an effect's output to wherever its leaf currently sits. After
//! each structural change it reconciles the tree against the running
//! effects until nothing is left to register.

use super::{Deliver, IoArena, IoId, IoIndex, PendingIo, Push};
use crate::config::Config;
use crate::core::{Event, KeyPath, Node};
use crate::dispatch::{self, DispatchError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace};

const ROOT: &str = "root";
const ROUTING: &str = "causeway::routing";

/// Failures of a manager transition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Tree did not settle after {passes} registration passes")]
    Unsettled { passes: usize },
}

/// Owner of a tree and the effects it describes.
///
/// Transitions consume the manager and return its successor along with the
/// events the tree sent past its root.
///
/// # Example
///
/// ```rust
/// use causeway::core::{Event, Node};
/// use causeway::io::{IoId, IoLeaf, Manager};
///
/// let leaf = IoLeaf::new(|_push| None);
/// let manager = Manager::new(leaf, |_event| {});
///
/// let (manager, events) = manager.update(Event::Start).unwrap();
///
/// assert!(events.is_empty());
/// assert_eq!(manager.next_id(), IoId::new(1));
/// assert!(manager.arena().is_live(IoId::new(0)));
/// ```
#[derive(Clone)]
pub struct Manager {
    root: Option<Node>,
    arena: IoArena,
    index: IoIndex,
    deliver: Deliver,
    config: Config,
}

impl Manager {
    /// Manager for `root`. `deliver` receives every pushed `Route` event and
    /// must hand it back to [`Manager::update`] later, never synchronously.
    pub fn new<F>(root: impl Into<Node>, deliver: F) -> Self
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        Self {
            root: Some(root.into()),
            arena: IoArena::new(),
            index: IoIndex::default(),
            deliver: Arc::new(deliver),
            config: Config::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// The managed tree, `None` once it finished.
    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.root.is_none()
    }

    pub fn next_id(&self) -> IoId {
        self.arena.next_id()
    }

    pub fn arena(&self) -> &IoArena {
        &self.arena
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current path of the leaf registered under `id`, relative to the root.
    pub fn locate(&self, id: IoId) -> Option<&KeyPath> {
        self.index.path_of(id)
    }

    /// Apply one event delivered to the manager.
    pub fn update(self, event: Event) -> Result<(Self, Vec<Event>), ManagerError> {
        self.receive(event, KeyPath::root())
    }

    fn receive(self, event: Event, from: KeyPath) -> Result<(Self, Vec<Event>), ManagerError> {
        let root = root_origin();
        match event {
            Event::Descendent {
                event,
                from: inner_from,
            } => self.receive(*event, from.concat(&inner_from)),
            Event::Finished { value } if from == root => {
                debug!(value = %value, "tree finished");
                Ok((Self { root: None, ..self }, vec![Event::Finished { value }]))
            }
            event if from == root => Ok((self, vec![event])),
            Event::Start => self.inject(&KeyPath::root(), Event::Start),
            Event::Route { id, event } => self.route(id, *event),
            Event::Finished { .. }
            | Event::Register { .. }
            | Event::Emit { .. }
            | Event::Task(_)
            | Event::Custom(_) => Err(DispatchError::Unhandled {
                entity: "Manager".to_string(),
                event: event.name().to_string(),
                state: None,
                from,
            }
            .into()),
        }
    }

    fn route(self, id: IoId, event: Event) -> Result<(Self, Vec<Event>), ManagerError> {
        let Some(path) = self.index.path_of(id).cloned() else {
            trace!(target: ROUTING, %id, event = event.name(), "dropping route for retired effect");
            return Ok((self, Vec::new()));
        };

        if self.config.trace_events.admits(&event.kind()) {
            info!(target: ROUTING, %id, event = event.name(), path = %path, "routing event");
        }
        self.inject(&path, Event::emit(event))
    }

    /// Dispatch `event` at `path`, handle what the root emits, reconcile.
    fn inject(self, path: &KeyPath, event: Event) -> Result<(Self, Vec<Event>), ManagerError> {
        let Some(root) = &self.root else {
            return Err(DispatchError::Unhandled {
                entity: "Manager".to_string(),
                event: event.name().to_string(),
                state: Some("Finished".to_string()),
                from: KeyPath::root(),
            }
            .into());
        };

        let transition = dispatch::update_in(root, path, event)?;
        let mut manager = Self {
            root: Some(transition.node),
            ..self
        };
        let mut events = Vec::new();
        for emitted in transition.events {
            let (next, outgoing) = manager.receive(emitted, root_origin())?;
            manager = next;
            events.extend(outgoing);
        }

        Ok((manager.reconcile()?, events))
    }

    /// Bring the running effects in line with the tree.
    ///
    /// Only passes that start effects count against the bound. If the tree
    /// does not settle, every effect started here is cancelled again.
    fn reconcile(mut self) -> Result<Self, ManagerError> {
        let mut started = Vec::new();
        let mut passes = 0;
        loop {
            let index = self.root.as_ref().map(IoIndex::of).unwrap_or_default();
            self.cancel_absent(&index);

            if index.pending().is_empty() {
                self.index = index;
                return Ok(self);
            }
            if passes == self.config.max_settle_passes {
                self.abandon(started);
                return Err(ManagerError::Unsettled { passes });
            }
            passes += 1;

            for pending in index.pending() {
                match self.register(pending) {
                    Ok(id) => started.push(id),
                    Err(error) => {
                        self.abandon(started);
                        return Err(error);
                    }
                }
            }
        }
    }

    /// Cancel effects started by a reconciliation that failed.
    fn abandon(&mut self, started: Vec<IoId>) {
        for id in started {
            if let Some(Some(cancel)) = self.arena.retire(id) {
                debug!(%id, "cancelling effect of an unsettled tree");
                cancel();
            }
        }
    }

    fn cancel_absent(&mut self, index: &IoIndex) {
        let absent: Vec<IoId> = self
            .arena
            .live_ids()
            .filter(|id| !index.contains(*id))
            .collect();

        for id in absent {
            if let Some(cancel) = self.arena.retire(id) {
                debug!(%id, cancellable = cancel.is_some(), "retiring effect");
                if let Some(cancel) = cancel {
                    cancel();
                }
            }
        }
    }

    fn register(&mut self, pending: &PendingIo) -> Result<IoId, ManagerError> {
        let id = self.arena.allocate();
        if let Some(root) = &self.root {
            let registered = dispatch::update_in(root, &pending.path, Event::Register { id })?;
            if !registered.events.is_empty() {
                trace!(%id, count = registered.events.len(), "registration events not surfaced");
            }
            self.root = Some(registered.node);
        }

        debug!(%id, path = %pending.path, label = ?pending.leaf.label(), "starting effect");
        let cancel = pending.leaf.start(Push::new(id, Arc::clone(&self.deliver)));
        self.arena.insert(id, cancel);
        Ok(id)
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("root", &self.root)
            .field("arena", &self.arena)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn root_origin() -> KeyPath {
    KeyPath::parse(ROOT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EventKind;
    use crate::dispatch::ignore;
    use crate::entity::EntityType;
    use crate::io::{Cancel, IoLeaf};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Outbox = Arc<Mutex<Vec<Event>>>;

    fn manager(root: impl Into<Node>) -> (Manager, Outbox) {
        let outbox: Outbox = Arc::default();
        let sink = Arc::clone(&outbox);
        let manager = Manager::new(root, move |event| sink.lock().unwrap().push(event));
        (manager, outbox)
    }

    fn counted_cancel(cancels: &Arc<AtomicUsize>) -> IoLeaf {
        let cancels = Arc::clone(cancels);
        IoLeaf::new(move |_| {
            let cancels = Arc::clone(&cancels);
            Some(Arc::new(move || {
                cancels.fetch_add(1, Ordering::SeqCst);
            }) as Cancel)
        })
    }

    /// Holder whose `slot` reacts to what its effect reports.
    fn holder(slot: impl Into<Node>) -> Node {
        let holder = EntityType::builder("Holder")
            .field("slot", Node::Null)
            .on(EventKind::Start, ignore)
            .from("slot", |holder, event, _| match event.name() {
                "Timer.Done" => Ok(holder.set("slot", Node::Null)?.into()),
                "Timer.Finish" => {
                    Ok((holder.clone(), vec![Event::finished(json!("done"))]).into())
                }
                _ => Ok(holder.clone().into()),
            })
            .build()
            .unwrap();
        holder.create().set("slot", slot).unwrap().into()
    }

    #[test]
    fn start_registers_root_leaf() {
        let started = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&started);
        let leaf = IoLeaf::new(move |push| {
            assert_eq!(push.id(), IoId::new(0));
            counter.fetch_add(1, Ordering::SeqCst);
            Some(Arc::new(|| {}) as Cancel)
        });
        let (manager, _) = manager(leaf);

        let (manager, events) = manager.update(Event::Start).unwrap();

        assert!(events.is_empty());
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(manager.next_id(), IoId::new(1));
        assert!(manager.arena().has_cancel(IoId::new(0)));
        assert_eq!(manager.locate(IoId::new(0)), Some(&KeyPath::root()));
        assert_eq!(
            manager.root().and_then(Node::as_io).and_then(IoLeaf::id),
            Some(IoId::new(0))
        );
    }

    #[test]
    fn route_re_emits_at_root() {
        let leaf = IoLeaf::new(|push| {
            push.push(Event::custom("Clock.Tick"));
            None
        });
        let (manager, outbox) = manager(leaf);
        let (manager, _) = manager.update(Event::Start).unwrap();

        let pushed = outbox.lock().unwrap().clone();
        assert_eq!(
            pushed,
            vec![Event::route(IoId::new(0), Event::custom("Clock.Tick"))]
        );

        let (_, events) = manager.update(pushed[0].clone()).unwrap();
        assert_eq!(events, vec![Event::custom("Clock.Tick")]);
    }

    #[test]
    fn removed_leaf_is_cancelled_once() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let (manager, _) = manager(holder(counted_cancel(&cancels)));
        let (manager, _) = manager.update(Event::Start).unwrap();

        let noise = Event::route(IoId::new(0), Event::custom("Timer.Noise"));
        let (manager, _) = manager.update(noise).unwrap();
        assert_eq!(cancels.load(Ordering::SeqCst), 0);

        let done = Event::route(IoId::new(0), Event::custom("Timer.Done"));
        let (manager, events) = manager.update(done.clone()).unwrap();
        assert!(events.is_empty());
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
        assert!(manager.arena().is_empty());
        assert_eq!(manager.arena().retired_count(), 1);
        assert!(!manager.arena().is_live(IoId::new(0)));

        let (manager, _) = manager.update(done).unwrap();
        let manager = manager.reconcile().unwrap();
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
        assert_eq!(manager.next_id(), IoId::new(1));
    }

    #[test]
    fn stale_route_is_a_no_op() {
        let (manager, _) = manager(IoLeaf::new(|_| None));
        let (manager, _) = manager.update(Event::Start).unwrap();

        let stale = Event::route(IoId::new(99), Event::custom("Late.Result"));
        let (after, events) = manager.clone().update(stale).unwrap();

        assert!(events.is_empty());
        assert_eq!(after.root(), manager.root());
        assert_eq!(after.next_id(), manager.next_id());
    }

    #[test]
    fn reconcile_is_idempotent() {
        let root = Node::list([
            Node::from(IoLeaf::new(|_| None)),
            Node::from(IoLeaf::new(|_| None)),
        ]);
        let (manager, _) = manager(root);
        let (manager, _) = manager.update(Event::Start).unwrap();
        assert_eq!(manager.next_id(), IoId::new(2));

        let again = manager.clone().reconcile().unwrap();

        assert_eq!(again.next_id(), IoId::new(2));
        assert_eq!(again.root(), manager.root());
        assert_eq!(again.arena().len(), 2);
    }

    #[test]
    fn ids_follow_traversal_order() {
        let root = Node::map([
            ("first", Node::from(IoLeaf::new(|_| None))),
            ("second", Node::from(IoLeaf::new(|_| None))),
        ]);
        let (manager, _) = manager(root);
        let (manager, _) = manager.update(Event::Start).unwrap();

        assert_eq!(manager.locate(IoId::new(0)), Some(&KeyPath::parse("first")));
        assert_eq!(manager.locate(IoId::new(1)), Some(&KeyPath::parse("second")));
    }

    #[test]
    fn nested_registration_settles() {
        let spawner = IoLeaf::new(|push| {
            push.push(Event::custom("Spawner.Spawned"));
            None
        });
        let outer = EntityType::builder("Outer")
            .field("effects", Node::list([Node::from(spawner)]))
            .on("*", |outer, event, _| {
                let Event::Custom(custom) = event else {
                    return Ok(outer.clone().into());
                };
                if custom.name() != "Spawner.Spawned" {
                    return Ok(outer.clone().into());
                }
                let effects = outer.get("effects").and_then(Node::as_list).unwrap_or_default();
                let mut grown = effects.to_vec();
                grown.push(Node::from(IoLeaf::new(|_| None)));
                Ok(outer.set("effects", Node::list(grown))?.into())
            })
            .build()
            .unwrap();
        let (manager, outbox) = manager(outer.create());
        let (manager, _) = manager.update(Event::Start).unwrap();

        let spawned = outbox.lock().unwrap()[0].clone();
        let (manager, _) = manager.update(spawned).unwrap();

        assert_eq!(manager.next_id(), IoId::new(2));
        assert_eq!(
            manager.locate(IoId::new(1)),
            Some(&KeyPath::parse("effects.1"))
        );
    }

    #[test]
    fn one_pass_settles_every_leaf() {
        let leaves = (0..3).map(|_| Node::from(IoLeaf::new(|_| None)));
        let (manager, _) = manager(Node::list(leaves));
        let manager = manager.with_config(Config::default().max_settle_passes(1));

        let (manager, _) = manager.update(Event::Start).unwrap();

        assert_eq!(manager.arena().len(), 3);
        assert_eq!(manager.next_id(), IoId::new(3));
    }

    #[test]
    fn unsettled_tree_starts_nothing() {
        let starts = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&starts);
        let leaf = IoLeaf::new(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
            None
        });
        let (manager, _) = manager(leaf);
        let manager = manager.with_config(Config::default().max_settle_passes(0));

        let error = manager.clone().update(Event::Start).unwrap_err();
        let again = manager.update(Event::Start).unwrap_err();

        assert_eq!(error, ManagerError::Unsettled { passes: 0 });
        assert_eq!(again, error);
        assert_eq!(starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn settled_trees_need_no_passes() {
        let (manager, _) = manager(holder(Node::Null));
        let manager = manager.with_config(Config::default().max_settle_passes(0));

        let (manager, events) = manager.update(Event::Start).unwrap();

        assert!(events.is_empty());
        assert!(manager.arena().is_empty());
    }

    #[test]
    fn finished_root_cancels_everything() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let (manager, _) = manager(holder(counted_cancel(&cancels)));
        let (manager, _) = manager.update(Event::Start).unwrap();

        let finish = Event::route(IoId::new(0), Event::custom("Timer.Finish"));
        let (manager, events) = manager.update(finish).unwrap();

        assert_eq!(events, vec![Event::finished(json!("done"))]);
        assert!(manager.is_finished());
        assert!(manager.arena().is_empty());
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn start_after_finish_is_unhandled() {
        let (manager, _) = manager(holder(IoLeaf::new(|_| None)));
        let (manager, _) = manager.update(Event::Start).unwrap();
        let finish = Event::route(IoId::new(0), Event::custom("Timer.Finish"));
        let (manager, _) = manager.update(finish).unwrap();

        let error = manager.update(Event::Start).unwrap_err();

        assert_eq!(
            error.to_string(),
            "Manager does not respond to Cause.Start in state Finished"
        );
    }

    #[test]
    fn deeper_origins_are_unhandled() {
        let (manager, _) = manager(IoLeaf::new(|_| None));

        let result = manager.receive(Event::custom("X.Y"), KeyPath::parse("root.a"));

        assert!(matches!(
            result,
            Err(ManagerError::Dispatch(DispatchError::Unhandled { .. }))
        ));
    }

    #[test]
    fn direct_custom_events_are_unhandled() {
        let (manager, _) = manager(IoLeaf::new(|_| None));

        let error = manager.update(Event::custom("X.Y")).unwrap_err();

        assert_eq!(error.to_string(), "Manager does not respond to X.Y");
    }
}
