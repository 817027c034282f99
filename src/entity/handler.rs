//! Compiled event handlers and their results.

use super::value::Entity;
use crate::core::{Event, EventKind, KeyPath, Node};
use crate::dispatch::DispatchError;
use std::fmt;
use std::sync::Arc;

/// Handler body: current value, event, origin path relative to the value.
pub type HandlerFn =
    Arc<dyn Fn(&Entity, &Event, &KeyPath) -> Result<Transition, DispatchError> + Send + Sync>;

/// Result of dispatching one event: the replacement node plus the events
/// it emits upward.
///
/// Handlers returning only a value convert through `From`, which normalizes
/// to an empty event list.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub node: Node,
    pub events: Vec<Event>,
}

impl Transition {
    pub fn new(node: impl Into<Node>) -> Self {
        Self {
            node: node.into(),
            events: Vec::new(),
        }
    }

    pub fn with_events(node: impl Into<Node>, events: Vec<Event>) -> Self {
        Self {
            node: node.into(),
            events,
        }
    }

    /// Append an outgoing event.
    pub fn emit(mut self, event: impl Into<Event>) -> Self {
        self.events.push(event.into());
        self
    }
}

impl From<Node> for Transition {
    fn from(node: Node) -> Self {
        Self::new(node)
    }
}

impl From<Entity> for Transition {
    fn from(entity: Entity) -> Self {
        Self::new(entity)
    }
}

impl From<(Node, Vec<Event>)> for Transition {
    fn from((node, events): (Node, Vec<Event>)) -> Self {
        Self::with_events(node, events)
    }
}

impl From<(Entity, Vec<Event>)> for Transition {
    fn from((entity, events): (Entity, Vec<Event>)) -> Self {
        Self::with_events(entity, events)
    }
}

/// Which event kinds a handler accepts.
#[derive(Clone, Debug, PartialEq)]
pub enum EventMatch {
    Any,
    Kind(EventKind),
}

/// A compiled rule: predicates plus body.
#[derive(Clone)]
pub struct Handler {
    pub(crate) on: EventMatch,
    pub(crate) from: Option<KeyPath>,
    pub(crate) in_state: Option<String>,
    pub(crate) run: HandlerFn,
}

impl Handler {
    /// Check every predicate against an unwrapped event (pure).
    pub fn matches(&self, kind: &EventKind, from: &KeyPath, state: Option<&str>) -> bool {
        let kind_matches = match &self.on {
            EventMatch::Any => true,
            EventMatch::Kind(expected) => expected == kind,
        };

        kind_matches
            && self.from.as_ref().is_none_or(|expected| expected == from)
            && self
                .in_state
                .as_deref()
                .is_none_or(|expected| Some(expected) == state)
    }

    pub fn in_state(&self) -> Option<&str> {
        self.in_state.as_deref()
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("on", &self.on)
            .field("from", &self.from)
            .field("in_state", &self.in_state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(on: EventMatch, from: Option<&str>, in_state: Option<&str>) -> Handler {
        Handler {
            on,
            from: from.map(KeyPath::parse),
            in_state: in_state.map(str::to_string),
            run: Arc::new(|entity: &Entity, _: &Event, _: &KeyPath| Ok(entity.clone().into())),
        }
    }

    #[test]
    fn kind_predicate() {
        let h = handler(EventMatch::Kind(EventKind::Start), None, None);

        assert!(h.matches(&EventKind::Start, &KeyPath::root(), None));
        assert!(!h.matches(&EventKind::Finished, &KeyPath::root(), None));
    }

    #[test]
    fn any_matches_every_kind() {
        let h = handler(EventMatch::Any, None, None);

        assert!(h.matches(&EventKind::Custom("A.B".into()), &KeyPath::root(), None));
        assert!(h.matches(&EventKind::TaskSuccess, &KeyPath::parse("x"), Some("S")));
    }

    #[test]
    fn from_predicate_requires_exact_path() {
        let h = handler(EventMatch::Any, Some("child"), None);

        assert!(h.matches(&EventKind::Start, &KeyPath::parse("child"), None));
        assert!(!h.matches(&EventKind::Start, &KeyPath::parse("child.inner"), None));
        assert!(!h.matches(&EventKind::Start, &KeyPath::root(), None));
    }

    #[test]
    fn state_predicate() {
        let h = handler(EventMatch::Any, None, Some("Running"));

        assert!(h.matches(&EventKind::Start, &KeyPath::root(), Some("Running")));
        assert!(!h.matches(&EventKind::Start, &KeyPath::root(), Some("Initial")));
        assert!(!h.matches(&EventKind::Start, &KeyPath::root(), None));
    }

    #[test]
    fn matching_is_deterministic() {
        let h = handler(EventMatch::Kind(EventKind::Start), Some("a"), Some("S"));
        let path = KeyPath::parse("a");

        assert_eq!(
            h.matches(&EventKind::Start, &path, Some("S")),
            h.matches(&EventKind::Start, &path, Some("S"))
        );
    }
}
