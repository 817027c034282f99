//! Routing journal.
//!
//! Records every `Route` the runtime handles: which effect sent it, what it
//! carried, and where the leaf sat at that moment. Routes for retired
//! effects are recorded with no path.

use crate::core::KeyPath;
use crate::io::IoId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// One routed event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    /// Effect that pushed the event.
    pub id: IoId,
    /// Qualified event name.
    pub event: String,
    /// Leaf position when the route was handled, `None` if it was dropped.
    pub path: Option<KeyPath>,
    pub timestamp: DateTime<Utc>,
}

impl RouteRecord {
    pub fn new(id: IoId, event: impl Into<String>, path: Option<KeyPath>) -> Self {
        Self {
            id,
            event: event.into(),
            path,
            timestamp: Utc::now(),
        }
    }

    pub fn was_delivered(&self) -> bool {
        self.path.is_some()
    }
}

/// Bounded, ordered record of routed events.
///
/// `record` returns a new journal and leaves the receiver untouched. Once
/// `capacity` is reached the oldest record is dropped.
///
/// # Example
///
/// ```rust
/// use causeway::core::KeyPath;
/// use causeway::io::IoId;
/// use causeway::runtime::{Journal, RouteRecord};
///
/// let journal = Journal::with_capacity(2)
///     .record(RouteRecord::new(IoId::new(0), "Task.Started", Some(KeyPath::parse("cause"))))
///     .record(RouteRecord::new(IoId::new(0), "Task.Success", None));
///
/// assert_eq!(journal.records().count(), 2);
/// assert_eq!(journal.dropped().count(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    capacity: usize,
    records: VecDeque<RouteRecord>,
}

impl Default for Journal {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}

impl Journal {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            records: VecDeque::new(),
        }
    }

    /// Journal with `record` appended.
    pub fn record(&self, record: RouteRecord) -> Self {
        let mut next = self.clone();
        next.push(record);
        next
    }

    pub(crate) fn push(&mut self, record: RouteRecord) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Records oldest first.
    pub fn records(&self) -> impl Iterator<Item = &RouteRecord> {
        self.records.iter()
    }

    pub fn delivered(&self) -> impl Iterator<Item = &RouteRecord> {
        self.records.iter().filter(|record| record.was_delivered())
    }

    /// Routes that arrived after their effect was retired.
    pub fn dropped(&self) -> impl Iterator<Item = &RouteRecord> {
        self.records.iter().filter(|record| !record.was_delivered())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Time between the oldest and newest record.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.records.front()?, self.records.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }
}
