//! The dispatch engine: routes one event through one node, and through a
//! tree by key-path.
//!
//! # Key Concepts
//!
//! - **update**: apply an event to a single node, unwrapping descendant
//!   events so origin paths accumulate outer-to-inner
//! - **update_in**: apply an event deep in a tree and bubble the emitted
//!   events up through every ancestor
//! - **Strategies**: `ignore` and `passthrough` for composite entities that
//!   only forward child activity

mod error;

pub use error::DispatchError;

use crate::core::{Event, KeyPath, Node};
use crate::entity::{Entity, Transition};

/// Apply `event`, originating at `from` relative to `node`.
///
/// Entities use their compiled handlers; IO leaves react to the manager's
/// events; plain lists and maps pass every event through to their parent.
/// Plain data responds to nothing.
pub fn update(node: &Node, event: &Event, from: &KeyPath) -> Result<Transition, DispatchError> {
    if let Event::Descendent {
        event: inner,
        from: inner_from,
    } = event
    {
        return update(node, inner, &from.concat(inner_from));
    }

    match node {
        Node::Entity(entity) => entity.update(event, from),
        Node::Io(io) => io.update(event, from),
        Node::List(_) | Node::Map(_) => Ok(Transition::with_events(
            node.clone(),
            vec![Event::descendent(event.clone(), from.clone())],
        )),
        Node::Null | Node::Value(_) => Err(DispatchError::Unhandled {
            entity: node.type_name().to_string(),
            event: event.name().to_string(),
            state: None,
            from: from.clone(),
        }),
    }
}

/// Apply `event` to the node at `path` inside `root`.
///
/// The updated child is written back into each ancestor, and every event it
/// emits is dispatched to that ancestor with the child's step as origin.
/// Returns the new root and the events the root itself emits.
///
/// # Example
///
/// ```rust
/// use causeway::core::{Event, KeyPath, Node};
/// use causeway::dispatch::{passthrough, update_in};
/// use causeway::entity::EntityType;
///
/// let leaf = EntityType::builder("Leaf")
///     .field("pokes", 0)
///     .event_in("Poke")
///     .event_out("Poked")
///     .on("Poke", |leaf, _, _| {
///         let poked = leaf.entity_type().event("Poked").unwrap().create();
///         Ok((leaf.set("pokes", 1)?, vec![poked]).into())
///     })
///     .build()
///     .unwrap();
/// let parent = EntityType::builder("Parent")
///     .field("child", leaf.create())
///     .on("*", passthrough)
///     .build()
///     .unwrap();
///
/// let poke = leaf.event("Poke").unwrap().create();
/// let root = Node::from(parent.create());
/// let result = update_in(&root, &KeyPath::parse("child"), poke).unwrap();
///
/// assert_eq!(
///     result.node.get_in(&KeyPath::parse("child.pokes")),
///     Some(&Node::from(1))
/// );
/// assert_eq!(
///     result.events,
///     vec![Event::descendent(
///         leaf.event("Poked").unwrap().create(),
///         KeyPath::parse("child"),
///     )]
/// );
/// ```
pub fn update_in(root: &Node, path: &KeyPath, event: Event) -> Result<Transition, DispatchError> {
    let Some((step, rest)) = path.split_first() else {
        return update(root, &event, &KeyPath::root());
    };

    let child = root.get(step).ok_or_else(|| DispatchError::MissingPath {
        path: path.clone(),
    })?;
    let updated = update_in(child, &rest, event)?;
    let mut current = root
        .with_child(step, updated.node)
        .ok_or_else(|| DispatchError::MissingPath { path: path.clone() })?;

    let origin = KeyPath::from(step.clone());
    let mut events = Vec::new();
    for emitted in updated.events {
        let transition = update(&current, &emitted, &origin)?;
        current = transition.node;
        events.extend(transition.events);
    }

    Ok(Transition::with_events(current, events))
}

/// Consume the event and emit nothing.
pub fn ignore(entity: &Entity, _event: &Event, _from: &KeyPath) -> Result<Transition, DispatchError> {
    Ok(Transition::new(entity.clone()))
}

/// Keep the current value and re-emit the event, tagged with its origin,
/// so an ancestor can match on the full path later.
pub fn passthrough(
    entity: &Entity,
    event: &Event,
    from: &KeyPath,
) -> Result<Transition, DispatchError> {
    Ok(Transition::with_events(
        entity.clone(),
        vec![Event::descendent(event.clone(), from.clone())],
    ))
}
