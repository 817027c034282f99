//! Events flowing through the tree.
//!
//! The runtime's own vocabulary is a closed set of variants, matched
//! exhaustively wherever the runtime consumes them. Application-declared
//! events use the [`Event::Custom`] fallback and are matched by name.

use super::key_path::KeyPath;
use crate::io::IoId;
use crate::task::TaskEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

const READY: &str = "Cause.Ready";

/// An immutable event value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Asks a tree to begin.
    Start,
    /// A root reports that it is done.
    Finished { value: Value },
    /// Writes a manager-assigned identity into an IO leaf.
    Register { id: IoId },
    /// Delivers an effect's output to its IO leaf.
    Emit { event: Box<Event> },
    /// Manager-internal: carries an effect's output back to the leaf with `id`.
    Route { id: IoId, event: Box<Event> },
    /// An event bubbling upward from the descendant at `from`.
    Descendent { event: Box<Event>, from: KeyPath },
    Task(TaskEvent),
    Custom(CustomEvent),
}

impl Event {
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(CustomEvent::new(name))
    }

    pub fn finished(value: impl Into<Value>) -> Self {
        Self::Finished {
            value: value.into(),
        }
    }

    /// Announces that a cause became ready.
    pub fn ready() -> Self {
        Self::custom(READY)
    }

    pub fn emit(event: Event) -> Self {
        Self::Emit {
            event: Box::new(event),
        }
    }

    pub fn route(id: IoId, event: Event) -> Self {
        Self::Route {
            id,
            event: Box::new(event),
        }
    }

    pub fn descendent(event: Event, from: KeyPath) -> Self {
        Self::Descendent {
            event: Box::new(event),
            from,
        }
    }

    /// Type identity used for handler matching.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Start => EventKind::Start,
            Self::Finished { .. } => EventKind::Finished,
            Self::Register { .. } => EventKind::Register,
            Self::Emit { .. } => EventKind::Emit,
            Self::Route { .. } => EventKind::Route,
            Self::Descendent { .. } => EventKind::Descendent,
            Self::Task(event) => event.kind(),
            Self::Custom(event) => EventKind::Custom(event.name.clone()),
        }
    }

    /// Qualified name of this event's kind.
    pub fn name(&self) -> &str {
        match self {
            Self::Custom(event) => event.name(),
            Self::Task(event) => event.kind().static_name(),
            other => other.kind().static_name(),
        }
    }

    /// Payload of a custom event.
    pub fn field(&self, field: &str) -> Option<&Value> {
        match self {
            Self::Custom(event) => event.get(field),
            _ => None,
        }
    }
}

impl From<CustomEvent> for Event {
    fn from(event: CustomEvent) -> Self {
        Self::Custom(event)
    }
}

impl From<TaskEvent> for Event {
    fn from(event: TaskEvent) -> Self {
        Self::Task(event)
    }
}

/// Type identity of an [`Event`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    Finished,
    Register,
    Emit,
    Route,
    Descendent,
    TaskStarted,
    TaskRunning,
    TaskSuccess,
    TaskFailure,
    Custom(String),
}

impl EventKind {
    pub fn name(&self) -> &str {
        match self {
            Self::Custom(name) => name,
            other => other.static_name(),
        }
    }

    /// Name without its declaring namespace (`"Task.Success"` -> `"Success"`).
    pub fn short_name(&self) -> &str {
        let name = self.name();
        name.rsplit_once('.').map_or(name, |(_, short)| short)
    }

    fn static_name(&self) -> &'static str {
        match self {
            Self::Start => "Cause.Start",
            Self::Finished => "Cause.Finished",
            Self::Register => "IO.Register",
            Self::Emit => "IO.Emit",
            Self::Route => "Manager.Route",
            Self::Descendent => "DescendentEvent",
            Self::TaskStarted => "Task.Started",
            Self::TaskRunning => "Task.Running",
            Self::TaskSuccess => "Task.Success",
            Self::TaskFailure => "Task.Failure",
            Self::Custom(_) => "Custom",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Application-declared event: a qualified name plus payload fields.
///
/// # Example
///
/// ```rust
/// use causeway::core::{CustomEvent, Event, EventKind};
///
/// let event: Event = CustomEvent::new("Counter.Add").with("amount", 5).into();
///
/// assert_eq!(event.kind(), EventKind::Custom("Counter.Add".to_string()));
/// assert_eq!(event.field("amount"), Some(&serde_json::json!(5)));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomEvent {
    name: String,
    fields: BTreeMap<String, Value>,
}

impl CustomEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub(crate) fn with_fields(name: impl Into<String>, fields: BTreeMap<String, Value>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Copy of this event with `field` set.
    pub fn with(&self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut fields = self.fields.clone();
        fields.insert(field.into(), value.into());
        Self {
            name: self.name.clone(),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kinds_of_builtin_events() {
        assert_eq!(Event::Start.kind(), EventKind::Start);
        assert_eq!(Event::finished(json!(1)).kind(), EventKind::Finished);
        assert_eq!(
            Event::route(IoId::new(3), Event::Start).kind(),
            EventKind::Route
        );
        assert_eq!(Event::Task(TaskEvent::Started).kind(), EventKind::TaskStarted);
    }

    #[test]
    fn custom_kind_is_qualified_name() {
        let event = Event::custom("Counter.Increment");

        assert_eq!(event.name(), "Counter.Increment");
        assert_eq!(event.kind().short_name(), "Increment");
    }

    #[test]
    fn builtin_names_are_namespaced() {
        assert_eq!(Event::Start.name(), "Cause.Start");
        assert_eq!(Event::ready().name(), "Cause.Ready");
        assert_eq!(EventKind::TaskFailure.short_name(), "Failure");
        assert_eq!(EventKind::Descendent.short_name(), "DescendentEvent");
    }

    #[test]
    fn with_does_not_touch_original() {
        let base = CustomEvent::new("Form.Typed");
        let typed = base.with("text", "hello");

        assert!(base.get("text").is_none());
        assert_eq!(typed.get("text"), Some(&json!("hello")));
    }

    #[test]
    fn events_serialize() {
        let event = Event::descendent(Event::custom("A.B"), KeyPath::parse("x.0"));
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
