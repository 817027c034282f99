//! Builder for declaring entity types.
//!
//! Declarations are collected fluently and compiled by `build()`. Every
//! declaration problem is reported at that point, before any value of the
//! type exists; `build()` accumulates all of them rather than stopping at
//! the first.

use super::definition::{EntityType, EventDecl, InitFn};
use super::error::{DeclarationError, DeclarationErrors};
use super::handler::{EventMatch, Handler, HandlerFn, Transition};
use super::value::Entity;
use crate::core::{Event, EventKind, KeyPath, Node, State};
use crate::dispatch::DispatchError;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use stillwater::validation::Validation;

type Check = Validation<(), Vec<DeclarationError>>;

/// Which events a rule listens to.
#[derive(Clone, Debug, PartialEq)]
pub enum Selector {
    /// An incoming event declared on the same type, by short name.
    Name(String),
    /// Any event (`"*"`).
    Any,
    /// A built-in or foreign event kind.
    Kind(EventKind),
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        if name == "*" {
            Self::Any
        } else {
            Self::Name(name.to_string())
        }
    }
}

impl From<EventKind> for Selector {
    fn from(kind: EventKind) -> Self {
        Self::Kind(kind)
    }
}

struct Rule {
    on: Selector,
    from: Option<KeyPath>,
    run: HandlerFn,
}

/// Ordered rules for one state, or for the stateless group.
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Handle events matching `selector` from any origin.
    pub fn on<F>(mut self, selector: impl Into<Selector>, handler: F) -> Self
    where
        F: Fn(&Entity, &Event, &KeyPath) -> Result<Transition, DispatchError>
            + Send
            + Sync
            + 'static,
    {
        self.rules.push(Rule {
            on: selector.into(),
            from: None,
            run: Arc::new(handler),
        });
        self
    }

    /// Handle events matching `selector` whose origin is exactly `from`.
    pub fn on_from<F>(
        mut self,
        selector: impl Into<Selector>,
        from: impl Into<KeyPath>,
        handler: F,
    ) -> Self
    where
        F: Fn(&Entity, &Event, &KeyPath) -> Result<Transition, DispatchError>
            + Send
            + Sync
            + 'static,
    {
        self.rules.push(Rule {
            on: selector.into(),
            from: Some(from.into()),
            run: Arc::new(handler),
        });
        self
    }

    /// Handle any event whose origin is exactly `from`.
    pub fn from<F>(self, from: impl Into<KeyPath>, handler: F) -> Self
    where
        F: Fn(&Entity, &Event, &KeyPath) -> Result<Transition, DispatchError>
            + Send
            + Sync
            + 'static,
    {
        self.on_from(Selector::Any, from, handler)
    }
}

/// Builder for [`EntityType`] with a fluent API.
///
/// # Example
///
/// ```rust
/// use causeway::dispatch::{ignore, passthrough};
/// use causeway::entity::EntityType;
/// use causeway::state_enum;
///
/// state_enum! {
///     pub enum Door {
///         Closed,
///         Open,
///     }
/// }
///
/// let door = EntityType::builder("Door")
///     .field("opened", 0)
///     .event_in("Push")
///     .event_out("Opened")
///     .state(Door::Closed, |rules| {
///         rules.on("Push", |door, _, _| Ok(door.set_state(&Door::Open)?.into()))
///     })
///     .state(Door::Open, |rules| rules.on("Push", ignore))
///     .on("*", passthrough)
///     .build()
///     .unwrap();
///
/// assert_eq!(door.initial_state(), Some("Closed"));
/// assert!(door.event_out("Opened").is_some());
/// ```
pub struct EntityTypeBuilder {
    name: String,
    fields: Vec<(String, Node)>,
    events_in: Vec<(String, BTreeMap<String, Value>)>,
    events_out: Vec<(String, BTreeMap<String, Value>)>,
    states: Vec<(String, RuleSet)>,
    stateless: RuleSet,
    init: Option<InitFn>,
}

impl EntityTypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            events_in: Vec::new(),
            events_out: Vec::new(),
            states: Vec::new(),
            stateless: RuleSet::default(),
            init: None,
        }
    }

    /// Declare a field with its default value.
    pub fn field(mut self, name: impl Into<String>, default: impl Into<Node>) -> Self {
        self.fields.push((name.into(), default.into()));
        self
    }

    /// Declare an incoming event without payload.
    pub fn event_in(self, name: impl Into<String>) -> Self {
        self.event_in_with(name, std::iter::empty::<(String, Value)>())
    }

    /// Declare an incoming event with default payload fields.
    pub fn event_in_with<K: Into<String>>(
        mut self,
        name: impl Into<String>,
        defaults: impl IntoIterator<Item = (K, Value)>,
    ) -> Self {
        self.events_in.push((name.into(), collect_payload(defaults)));
        self
    }

    /// Declare an outgoing event without payload.
    pub fn event_out(self, name: impl Into<String>) -> Self {
        self.event_out_with(name, std::iter::empty::<(String, Value)>())
    }

    /// Declare an outgoing event with default payload fields.
    pub fn event_out_with<K: Into<String>>(
        mut self,
        name: impl Into<String>,
        defaults: impl IntoIterator<Item = (K, Value)>,
    ) -> Self {
        self.events_out.push((name.into(), collect_payload(defaults)));
        self
    }

    /// Declare a state and the rules that apply only while in it.
    ///
    /// The first declared state is the initial state.
    pub fn state<S: State>(mut self, state: S, rules: impl FnOnce(RuleSet) -> RuleSet) -> Self {
        self.states
            .push((state.name().to_string(), rules(RuleSet::default())));
        self
    }

    /// Stateless rule: applies in every state.
    pub fn on<F>(mut self, selector: impl Into<Selector>, handler: F) -> Self
    where
        F: Fn(&Entity, &Event, &KeyPath) -> Result<Transition, DispatchError>
            + Send
            + Sync
            + 'static,
    {
        self.stateless = self.stateless.on(selector, handler);
        self
    }

    /// Stateless rule constrained to one origin.
    pub fn on_from<F>(
        mut self,
        selector: impl Into<Selector>,
        from: impl Into<KeyPath>,
        handler: F,
    ) -> Self
    where
        F: Fn(&Entity, &Event, &KeyPath) -> Result<Transition, DispatchError>
            + Send
            + Sync
            + 'static,
    {
        self.stateless = self.stateless.on_from(selector, from, handler);
        self
    }

    /// Stateless rule for any event from one origin.
    pub fn from<F>(mut self, from: impl Into<KeyPath>, handler: F) -> Self
    where
        F: Fn(&Entity, &Event, &KeyPath) -> Result<Transition, DispatchError>
            + Send
            + Sync
            + 'static,
    {
        self.stateless = self.stateless.from(from, handler);
        self
    }

    /// Transform applied to `create_with` arguments.
    pub fn init<F>(mut self, init: F) -> Self
    where
        F: Fn(IndexMap<String, Node>) -> IndexMap<String, Node> + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(init));
        self
    }

    /// Compile the declarations.
    ///
    /// Returns every declaration problem at once.
    pub fn build(self) -> Result<Arc<EntityType>, DeclarationErrors> {
        match Validation::all_vec(self.checks()) {
            Validation::Success(_) => Ok(Arc::new(self.compile())),
            Validation::Failure(errors) => Err(DeclarationErrors {
                entity: self.name.clone(),
                errors,
            }),
        }
    }

    fn checks(&self) -> Vec<Check> {
        let mut checks = vec![check(!self.name.is_empty(), DeclarationError::MissingTypeName)];

        let field_names = self.fields.iter().map(|(name, _)| name.as_str());
        checks.extend(unique_names(field_names, "field", DeclarationError::DuplicateField));

        let event_names = self
            .events_in
            .iter()
            .chain(self.events_out.iter())
            .map(|(name, _)| name.as_str());
        checks.extend(unique_names(event_names, "event", DeclarationError::DuplicateEvent));

        let state_names = self.states.iter().map(|(name, _)| name.as_str());
        checks.extend(unique_names(state_names, "state", DeclarationError::DuplicateState));

        let declared: HashSet<&str> = self.events_in.iter().map(|(name, _)| name.as_str()).collect();
        for rule in self.rules() {
            if let Selector::Name(name) = &rule.on {
                checks.push(check(
                    declared.contains(name.as_str()),
                    DeclarationError::UnknownEvent(name.clone()),
                ));
            }
            if let Some(from) = &rule.from {
                checks.push(check(!from.is_empty(), DeclarationError::EmptyFromPath));
            }
        }

        checks
    }

    fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.states
            .iter()
            .flat_map(|(_, set)| set.rules.iter())
            .chain(self.stateless.rules.iter())
    }

    fn compile(self) -> EntityType {
        let qualify = |name: &str| format!("{}.{}", self.name, name);
        let declare = |events: &[(String, BTreeMap<String, Value>)]| {
            events
                .iter()
                .map(|(name, defaults)| {
                    (
                        name.clone(),
                        EventDecl::new(qualify(name), defaults.clone()),
                    )
                })
                .collect::<IndexMap<_, _>>()
        };
        let events_in = declare(&self.events_in);
        let events_out = declare(&self.events_out);

        let resolve = |rule: &Rule, in_state: Option<&str>| Handler {
            on: match &rule.on {
                Selector::Any => EventMatch::Any,
                Selector::Kind(kind) => EventMatch::Kind(kind.clone()),
                Selector::Name(name) => EventMatch::Kind(EventKind::Custom(qualify(name))),
            },
            from: rule.from.clone(),
            in_state: in_state.map(str::to_string),
            run: Arc::clone(&rule.run),
        };

        let stateful = self
            .states
            .iter()
            .flat_map(|(state, set)| set.rules.iter().map(move |rule| (state, rule)))
            .map(|(state, rule)| resolve(rule, Some(state.as_str())))
            .collect();
        let stateless = self
            .stateless
            .rules
            .iter()
            .map(|rule| resolve(rule, None))
            .collect();

        EntityType {
            name: self.name.clone(),
            fields: self.fields.iter().cloned().collect(),
            states: self.states.iter().map(|(name, _)| name.clone()).collect(),
            events_in,
            events_out,
            stateful,
            stateless,
            init: self.init.clone(),
        }
    }
}

fn check(ok: bool, error: DeclarationError) -> Check {
    if ok {
        Validation::Success(())
    } else {
        Validation::Failure(vec![error])
    }
}

fn unique_names<'a>(
    names: impl Iterator<Item = &'a str>,
    kind: &'static str,
    duplicate: fn(String) -> DeclarationError,
) -> Vec<Check> {
    let mut seen = HashSet::new();
    names
        .map(|name| {
            if name.is_empty() {
                check(false, DeclarationError::EmptyName { kind })
            } else {
                check(seen.insert(name), duplicate(name.to_string()))
            }
        })
        .collect()
}

fn collect_payload<K: Into<String>>(
    defaults: impl IntoIterator<Item = (K, Value)>,
) -> BTreeMap<String, Value> {
    defaults
        .into_iter()
        .map(|(key, value)| (key.into(), value))
        .collect()
}
