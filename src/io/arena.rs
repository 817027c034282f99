//! Registry of started effects.

use super::{Cancel, IoId};
use std::collections::BTreeMap;
use std::fmt;

/// Running effects keyed by identity.
///
/// Identities come from a counter that only moves forward, so an id is
/// never handed out twice, even after its effect is retired.
#[derive(Clone, Default)]
pub struct IoArena {
    next: u64,
    live: BTreeMap<IoId, Option<Cancel>>,
    retired: usize,
}

impl IoArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity the next registration will receive.
    pub fn next_id(&self) -> IoId {
        IoId::new(self.next)
    }

    pub(crate) fn allocate(&mut self) -> IoId {
        let id = self.next_id();
        self.next += 1;
        id
    }

    pub(crate) fn insert(&mut self, id: IoId, cancel: Option<Cancel>) {
        self.live.insert(id, cancel);
    }

    /// Remove `id` from the live set. Returns its cancel slot if it was live.
    pub(crate) fn retire(&mut self, id: IoId) -> Option<Option<Cancel>> {
        let slot = self.live.remove(&id)?;
        self.retired += 1;
        Some(slot)
    }

    pub fn is_live(&self, id: IoId) -> bool {
        self.live.contains_key(&id)
    }

    /// Whether the effect registered under `id` supplied a cancel callback.
    pub fn has_cancel(&self, id: IoId) -> bool {
        matches!(self.live.get(&id), Some(Some(_)))
    }

    pub fn live_ids(&self) -> impl Iterator<Item = IoId> + '_ {
        self.live.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of effects retired so far.
    pub fn retired_count(&self) -> usize {
        self.retired
    }
}

impl fmt::Debug for IoArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoArena")
            .field("next", &self.next)
            .field("live", &self.live.keys().collect::<Vec<_>>())
            .field("retired", &self.retired)
            .finish()
    }
}
