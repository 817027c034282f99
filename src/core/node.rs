//! Tree nodes.
//!
//! A tree is built from plain data, persistent aggregates, entity values and
//! IO leaves. Aggregates share structure through `Arc`; writing a child
//! produces a new node and leaves the original untouched.

use super::key_path::{KeyPath, Step};
use crate::entity::Entity;
use crate::io::IoLeaf;
use indexmap::IndexMap;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// A node of a state tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Node {
    #[default]
    Null,
    /// Plain data. Never contains IO.
    Value(Value),
    List(Arc<Vec<Node>>),
    Map(Arc<IndexMap<String, Node>>),
    Entity(Entity),
    Io(IoLeaf),
}

impl Node {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn list(items: impl IntoIterator<Item = Node>) -> Self {
        Self::List(Arc::new(items.into_iter().collect()))
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Node)>) -> Self {
        Self::Map(Arc::new(
            entries
                .into_iter()
                .map(|(key, node)| (key.into(), node))
                .collect(),
        ))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_io(&self) -> Option<&IoLeaf> {
        match self {
            Self::Io(io) => Some(io),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Name used in diagnostics.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "Null",
            Self::Value(_) => "Value",
            Self::List(_) => "List",
            Self::Map(_) => "Map",
            Self::Entity(entity) => entity.type_name(),
            Self::Io(_) => "IO",
        }
    }

    pub fn get(&self, step: &Step) -> Option<&Node> {
        match (self, step) {
            (Self::List(items), Step::Index(index)) => items.get(*index),
            (Self::Map(entries), Step::Key(key)) => entries.get(key),
            (Self::Entity(entity), Step::Key(key)) => entity.get(key),
            _ => None,
        }
    }

    pub fn get_in(&self, path: &KeyPath) -> Option<&Node> {
        path.steps()
            .iter()
            .try_fold(self, |node, step| node.get(step))
    }

    /// Copy of this node with the child at `step` replaced.
    ///
    /// Returns `None` when `step` does not name an existing child.
    pub fn with_child(&self, step: &Step, child: Node) -> Option<Node> {
        match (self, step) {
            (Self::List(items), Step::Index(index)) if *index < items.len() => {
                let mut items = Arc::clone(items);
                Arc::make_mut(&mut items)[*index] = child;
                Some(Self::List(items))
            }
            (Self::Map(entries), Step::Key(key)) if entries.contains_key(key) => {
                let mut entries = Arc::clone(entries);
                Arc::make_mut(&mut entries).insert(key.clone(), child);
                Some(Self::Map(entries))
            }
            (Self::Entity(entity), Step::Key(key)) => {
                entity.replace_field(key, child).map(Self::Entity)
            }
            _ => None,
        }
    }

    /// Direct children in traversal order.
    pub fn children(&self) -> Vec<(Step, &Node)> {
        match self {
            Self::List(items) => items
                .iter()
                .enumerate()
                .map(|(index, node)| (Step::Index(index), node))
                .collect(),
            Self::Map(entries) => entries
                .iter()
                .map(|(key, node)| (Step::Key(key.clone()), node))
                .collect(),
            Self::Entity(entity) => entity
                .fields()
                .map(|(key, node)| (Step::Key(key.to_string()), node))
                .collect(),
            Self::Null | Self::Value(_) | Self::Io(_) => Vec::new(),
        }
    }

    /// Whether this node may hold IO leaves.
    ///
    /// Aggregates are judged by their first element, so homogeneous
    /// collections of plain data are skipped without a full scan.
    pub fn can_contain_io(&self) -> bool {
        match self {
            Self::Io(_) | Self::Entity(_) => true,
            Self::List(items) => items.first().is_some_and(Node::can_contain_io),
            Self::Map(entries) => entries
                .first()
                .is_some_and(|(_, node)| node.can_contain_io()),
            Self::Null | Self::Value(_) => false,
        }
    }

    /// Whether this node counts as ready.
    ///
    /// Only an entity with a `ready` field can be unready, and only while
    /// that field holds `null`, `false`, zero or an empty string.
    pub fn is_ready(&self) -> bool {
        match self {
            Self::Entity(entity) => entity.get("ready").map_or(true, is_truthy),
            _ => true,
        }
    }

    /// Whether every node in `nodes` is ready. True for no nodes.
    pub fn all_ready<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> bool {
        nodes.into_iter().all(Node::is_ready)
    }
}

fn is_truthy(node: &Node) -> bool {
    match node {
        Node::Null => false,
        Node::Value(Value::Null) => false,
        Node::Value(Value::Bool(flag)) => *flag,
        Node::Value(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Node::Value(Value::String(text)) => !text.is_empty(),
        _ => true,
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

macro_rules! node_from_plain {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Node {
                fn from(value: $ty) -> Self {
                    Self::Value(Value::from(value))
                }
            }
        )*
    };
}

node_from_plain!(bool, i32, i64, u32, u64, f64, &str, String);

impl From<Entity> for Node {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}

impl From<IoLeaf> for Node {
    fn from(io: IoLeaf) -> Self {
        Self::Io(io)
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Self::List(Arc::new(items))
    }
}

/// Snapshot form: entities become maps with `type`/`state` entries, IO
/// leaves become `{"io": id}`.
impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Value(value) => value.serialize(serializer),
            Self::List(items) => serializer.collect_seq(items.iter()),
            Self::Map(entries) => serializer.collect_map(entries.iter()),
            Self::Entity(entity) => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("type", entity.type_name())?;
                if let Some(state) = entity.state() {
                    map.serialize_entry("state", state)?;
                }
                for (key, node) in entity.fields() {
                    map.serialize_entry(key, node)?;
                }
                map.end()
            }
            Self::Io(io) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("io", &io.id())?;
                map.end()
            }
        }
    }
}
