//! Classification of a tree's IO leaves.

use super::{IoId, IoLeaf};
use crate::core::{KeyPath, Node};
use std::collections::BTreeMap;

/// A leaf that has not been registered yet.
#[derive(Clone, Debug)]
pub struct PendingIo {
    pub path: KeyPath,
    pub leaf: IoLeaf,
}

/// Where every IO leaf in a tree sits.
///
/// Computed by a pure traversal. Subtrees that cannot hold IO are skipped.
#[derive(Clone, Debug, Default)]
pub struct IoIndex {
    pending: Vec<PendingIo>,
    present: BTreeMap<IoId, KeyPath>,
}

impl IoIndex {
    /// Index of `root`, with paths relative to it.
    pub fn of(root: &Node) -> Self {
        let mut index = Self::default();
        index.collect(root, &KeyPath::root());
        index
    }

    fn collect(&mut self, node: &Node, path: &KeyPath) {
        if !node.can_contain_io() {
            return;
        }

        match node {
            Node::Io(leaf) => match leaf.id() {
                Some(id) => {
                    self.present.insert(id, path.clone());
                }
                None => self.pending.push(PendingIo {
                    path: path.clone(),
                    leaf: leaf.clone(),
                }),
            },
            _ => {
                for (step, child) in node.children() {
                    self.collect(child, &path.child(step));
                }
            }
        }
    }

    /// Leaves awaiting an identity, in traversal order.
    pub fn pending(&self) -> &[PendingIo] {
        &self.pending
    }

    pub fn path_of(&self, id: IoId) -> Option<&KeyPath> {
        self.present.get(&id)
    }

    pub fn contains(&self, id: IoId) -> bool {
        self.present.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = IoId> + '_ {
        self.present.keys().copied()
    }
}
