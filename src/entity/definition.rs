//! Compiled entity types.

use super::builder::EntityTypeBuilder;
use super::handler::{Handler, Transition};
use super::value::Entity;
use crate::core::{CustomEvent, Event, EventKind, KeyPath, Node, State};
use crate::dispatch::DispatchError;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Transform applied to constructor arguments before defaults are filled.
pub type InitFn = Arc<dyn Fn(IndexMap<String, Node>) -> IndexMap<String, Node> + Send + Sync>;

/// A declared event: its qualified name and default payload.
#[derive(Clone, Debug, PartialEq)]
pub struct EventDecl {
    name: String,
    defaults: BTreeMap<String, Value>,
}

impl EventDecl {
    pub(crate) fn new(name: String, defaults: BTreeMap<String, Value>) -> Self {
        Self { name, defaults }
    }

    /// Qualified name, `"<Type>.<Event>"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EventKind {
        EventKind::Custom(self.name.clone())
    }

    /// Event carrying the default payload.
    pub fn create(&self) -> Event {
        Event::Custom(CustomEvent::with_fields(
            self.name.clone(),
            self.defaults.clone(),
        ))
    }

    /// Event carrying the default payload with `field` overridden.
    pub fn with(&self, field: impl Into<String>, value: impl Into<Value>) -> Event {
        let mut fields = self.defaults.clone();
        fields.insert(field.into(), value.into());
        Event::Custom(CustomEvent::with_fields(self.name.clone(), fields))
    }
}

/// A compiled family of immutable entity values.
///
/// Built once with [`EntityType::builder`] and shared as `Arc<EntityType>`.
/// Holds the field defaults, the declared states and events, and the
/// compiled handlers used by [`EntityType::update`].
///
/// # Example
///
/// ```rust
/// use causeway::core::{Event, KeyPath};
/// use causeway::entity::EntityType;
///
/// let counter = EntityType::builder("Counter")
///     .field("count", 0)
///     .event_in("Increment")
///     .on("Increment", |counter, _, _| {
///         let count = counter.value("count").and_then(|v| v.as_i64()).unwrap_or(0);
///         Ok(counter.set("count", count + 1)?.into())
///     })
///     .build()
///     .unwrap();
///
/// let increment = counter.event("Increment").unwrap().create();
/// let transition = counter.create().update(&increment, &KeyPath::root()).unwrap();
///
/// let next = transition.node.as_entity().unwrap();
/// assert_eq!(next.value("count"), Some(&serde_json::json!(1)));
/// assert!(transition.events.is_empty());
/// ```
pub struct EntityType {
    pub(crate) name: String,
    pub(crate) fields: IndexMap<String, Node>,
    pub(crate) states: Vec<String>,
    pub(crate) events_in: IndexMap<String, EventDecl>,
    pub(crate) events_out: IndexMap<String, EventDecl>,
    pub(crate) stateful: Vec<Handler>,
    pub(crate) stateless: Vec<Handler>,
    pub(crate) init: Option<InitFn>,
}

impl EntityType {
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn is_stateful(&self) -> bool {
        !self.states.is_empty()
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.states.iter().any(|state| state == name)
    }

    /// The first declared state.
    pub fn initial_state(&self) -> Option<&str> {
        self.states.first().map(String::as_str)
    }

    /// Declared event by short name, incoming first.
    pub fn event(&self, name: &str) -> Option<&EventDecl> {
        self.events_in
            .get(name)
            .or_else(|| self.events_out.get(name))
    }

    pub fn event_in(&self, name: &str) -> Option<&EventDecl> {
        self.events_in.get(name)
    }

    pub fn event_out(&self, name: &str) -> Option<&EventDecl> {
        self.events_out.get(name)
    }

    /// Value holding the field defaults, in the initial state.
    pub fn create(self: &Arc<Self>) -> Entity {
        Entity::new(
            Arc::clone(self),
            self.initial_state().map(str::to_string),
            self.fields.clone(),
        )
    }

    /// Value built from constructor arguments.
    ///
    /// Arguments pass through the `init` transform first; the result
    /// overrides the defaults. Undeclared fields are rejected.
    pub fn create_with<K: Into<String>>(
        self: &Arc<Self>,
        args: impl IntoIterator<Item = (K, Node)>,
    ) -> Result<Entity, DispatchError> {
        let args: IndexMap<String, Node> = args
            .into_iter()
            .map(|(key, node)| (key.into(), node))
            .collect();
        let args = match &self.init {
            Some(init) => init(args),
            None => args,
        };

        let mut fields = self.fields.clone();
        for (key, node) in args {
            match fields.get_mut(&key) {
                Some(slot) => *slot = node,
                None => {
                    return Err(DispatchError::UnknownField {
                        entity: self.name.clone(),
                        field: key,
                    })
                }
            }
        }

        Ok(Entity::new(
            Arc::clone(self),
            self.initial_state().map(str::to_string),
            fields,
        ))
    }

    /// Default value in `state`.
    pub fn create_in<S: State>(self: &Arc<Self>, state: &S) -> Result<Entity, DispatchError> {
        self.create().set_state(state)
    }

    /// The compiled dispatch function.
    ///
    /// Descendant events are unwrapped first, extending `from` with the
    /// path they were recorded at. State-scoped handlers are tried before
    /// stateless ones; the first whose predicates hold runs.
    pub fn update(
        &self,
        entity: &Entity,
        event: &Event,
        from: &KeyPath,
    ) -> Result<Transition, DispatchError> {
        if let Event::Descendent {
            event: inner,
            from: inner_from,
        } = event
        {
            return self.update(entity, inner, &from.concat(inner_from));
        }

        let kind = event.kind();
        let state = entity.state();
        let handler = self
            .stateful
            .iter()
            .chain(self.stateless.iter())
            .find(|handler| handler.matches(&kind, from, state))
            .ok_or_else(|| DispatchError::Unhandled {
                entity: self.name.clone(),
                event: kind.name().to_string(),
                state: if self.is_stateful() {
                    state.map(str::to_string)
                } else {
                    None
                },
                from: from.clone(),
            })?;

        (handler.run)(entity, event, from)
    }

    /// Compiled handlers in match order.
    pub fn handlers(&self) -> impl Iterator<Item = &Handler> {
        self.stateful.iter().chain(self.stateless.iter())
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("states", &self.states)
            .field("events_in", &self.events_in.keys().collect::<Vec<_>>())
            .field("events_out", &self.events_out.keys().collect::<Vec<_>>())
            .field("handlers", &(self.stateful.len() + self.stateless.len()))
            .finish()
    }
}
