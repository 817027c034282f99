//! Runtime tunables.
//!
//! `Config` is plain data: build it with the fluent setters, deserialize it
//! from a settings file, or read the event-trace toggle from the
//! environment with [`Config::from_env`].

use crate::core::EventKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Environment variable holding the event-trace toggle.
///
/// `true` (or `*`) traces every routed event; a comma-separated list of
/// event kind names traces only those kinds.
pub const EVENTS_ENV: &str = "CAUSEWAY_EVENTS";

/// Which routed events are logged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFilter {
    #[default]
    Off,
    All,
    /// Qualified (`Task.Success`) or short (`Success`) kind names.
    Kinds(BTreeSet<String>),
}

impl EventFilter {
    /// Parse the environment toggle format.
    pub fn parse(text: &str) -> Self {
        match text.trim() {
            "" | "false" | "0" => Self::Off,
            "true" | "*" => Self::All,
            list => {
                let kinds: BTreeSet<String> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|kind| !kind.is_empty())
                    .map(str::to_string)
                    .collect();
                if kinds.is_empty() {
                    Self::Off
                } else {
                    Self::Kinds(kinds)
                }
            }
        }
    }

    /// Filter from [`EVENTS_ENV`]; off when unset.
    pub fn from_env() -> Self {
        std::env::var(EVENTS_ENV)
            .map(|text| Self::parse(&text))
            .unwrap_or_default()
    }

    pub fn admits(&self, kind: &EventKind) -> bool {
        match self {
            Self::Off => false,
            Self::All => true,
            Self::Kinds(kinds) => kinds.contains(kind.name()) || kinds.contains(kind.short_name()),
        }
    }
}

/// Runtime configuration.
///
/// # Example
///
/// ```rust
/// use causeway::config::{Config, EventFilter};
///
/// let config = Config::default()
///     .max_settle_passes(8)
///     .trace_events(EventFilter::All);
///
/// assert_eq!(config.max_settle_passes, 8);
/// assert_eq!(config.tick_budget, 1024);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reconciliation passes that may start effects before a tree counts as
    /// unsettled. Leaves register in a single pass, so 0 is the only bound a
    /// tree of plain leaves can exceed.
    pub max_settle_passes: usize,
    /// Queued messages handled per tick.
    pub tick_budget: usize,
    pub trace_events: EventFilter,
    /// Routing records kept by the journal.
    pub journal_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_settle_passes: 64,
            tick_budget: 1024,
            trace_events: EventFilter::Off,
            journal_capacity: 256,
        }
    }
}

impl Config {
    /// Defaults, with the trace toggle read from [`EVENTS_ENV`].
    pub fn from_env() -> Self {
        Self::default().trace_events(EventFilter::from_env())
    }

    pub fn max_settle_passes(mut self, passes: usize) -> Self {
        self.max_settle_passes = passes;
        self
    }

    pub fn tick_budget(mut self, budget: usize) -> Self {
        self.tick_budget = budget;
        self
    }

    pub fn trace_events(mut self, filter: EventFilter) -> Self {
        self.trace_events = filter;
        self
    }

    pub fn journal_capacity(mut self, capacity: usize) -> Self {
        self.journal_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toggle_values() {
        assert_eq!(EventFilter::parse(""), EventFilter::Off);
        assert_eq!(EventFilter::parse("false"), EventFilter::Off);
        assert_eq!(EventFilter::parse("true"), EventFilter::All);
        assert_eq!(EventFilter::parse(" , "), EventFilter::Off);
        assert_eq!(
            EventFilter::parse("Task.Success, Tick"),
            EventFilter::Kinds(["Task.Success", "Tick"].map(String::from).into())
        );
    }

    #[test]
    fn kinds_match_full_or_short_names() {
        let filter = EventFilter::parse("Success,Clock.Tick");

        assert!(filter.admits(&EventKind::TaskSuccess));
        assert!(filter.admits(&EventKind::Custom("Clock.Tick".to_string())));
        assert!(!filter.admits(&EventKind::TaskFailure));
        assert!(!EventFilter::Off.admits(&EventKind::Start));
        assert!(EventFilter::All.admits(&EventKind::Start));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"tick_budget": 16, "trace_events": {"kinds": ["Start"]}}"#)
                .unwrap();

        assert_eq!(config.tick_budget, 16);
        assert_eq!(config.max_settle_passes, 64);
        assert!(config.trace_events.admits(&EventKind::Start));
    }
}
