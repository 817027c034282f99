//! Entity values: immutable snapshots of an entity type's fields.

use super::definition::EntityType;
use super::handler::Transition;
use crate::core::{Event, KeyPath, Node, State};
use crate::dispatch::DispatchError;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// An immutable record produced by an [`EntityType`].
///
/// Every setter returns a new value; the receiver is never changed.
#[derive(Clone)]
pub struct Entity {
    ty: Arc<EntityType>,
    state: Option<String>,
    fields: Arc<IndexMap<String, Node>>,
}

impl Entity {
    pub(crate) fn new(
        ty: Arc<EntityType>,
        state: Option<String>,
        fields: IndexMap<String, Node>,
    ) -> Self {
        Self {
            ty,
            state,
            fields: Arc::new(fields),
        }
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.ty
    }

    pub fn type_name(&self) -> &str {
        self.ty.name()
    }

    /// Whether this value was created by `ty`.
    pub fn is_a(&self, ty: &Arc<EntityType>) -> bool {
        Arc::ptr_eq(&self.ty, ty)
    }

    /// Current state discriminant, if the type declares states.
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Current state read back into the vocabulary `S`.
    pub fn state_as<S: State>(&self) -> Option<S> {
        self.state().and_then(S::from_name)
    }

    pub fn in_state<S: State>(&self, state: &S) -> bool {
        self.state() == Some(state.name())
    }

    pub fn get(&self, field: &str) -> Option<&Node> {
        self.fields.get(field)
    }

    /// Plain data stored in `field`.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.get(field).and_then(Node::as_value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.fields.iter().map(|(key, node)| (key.as_str(), node))
    }

    /// Copy with `field` replaced. Only declared fields can be set.
    pub fn set(&self, field: &str, node: impl Into<Node>) -> Result<Entity, DispatchError> {
        self.replace_field(field, node.into())
            .ok_or_else(|| DispatchError::UnknownField {
                entity: self.type_name().to_string(),
                field: field.to_string(),
            })
    }

    /// Copy in another declared state.
    pub fn set_state<S: State>(&self, state: &S) -> Result<Entity, DispatchError> {
        let name = state.name();
        if !self.ty.has_state(name) {
            return Err(DispatchError::UnknownState {
                entity: self.type_name().to_string(),
                state: name.to_string(),
            });
        }

        Ok(Self {
            ty: Arc::clone(&self.ty),
            state: Some(name.to_string()),
            fields: Arc::clone(&self.fields),
        })
    }

    /// Apply one event with this value's compiled handlers.
    pub fn update(&self, event: &Event, from: &KeyPath) -> Result<Transition, DispatchError> {
        self.ty.update(self, event, from)
    }

    pub(crate) fn replace_field(&self, field: &str, node: Node) -> Option<Entity> {
        if !self.fields.contains_key(field) {
            return None;
        }

        let mut fields = Arc::clone(&self.fields);
        Arc::make_mut(&mut fields).insert(field.to_string(), node);
        Some(Self {
            ty: Arc::clone(&self.ty),
            state: self.state.clone(),
            fields,
        })
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.ty, &other.ty)
            && self.state == other.state
            && (Arc::ptr_eq(&self.fields, &other.fields) || self.fields == other.fields)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct(self.type_name());
        if let Some(state) = &self.state {
            debug.field("state", state);
        }
        for (key, node) in self.fields.iter() {
            debug.field(key, node);
        }
        debug.finish()
    }
}
