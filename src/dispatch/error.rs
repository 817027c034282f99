//! Dispatch errors.

use crate::core::KeyPath;
use thiserror::Error;

/// Errors raised while applying an event to a node.
///
/// These signal a gap in a type's declarations or a malformed tree. They are
/// never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("{entity} does not respond to {event}{}", describe_origin(.state, .from))]
    Unhandled {
        entity: String,
        event: String,
        state: Option<String>,
        from: KeyPath,
    },

    #[error("No node at '{path}'")]
    MissingPath { path: KeyPath },

    #[error("{entity} has no field '{field}'")]
    UnknownField { entity: String, field: String },

    #[error("{entity} has no state '{state}'")]
    UnknownState { entity: String, state: String },
}

fn describe_origin(state: &Option<String>, from: &KeyPath) -> String {
    let mut details = String::new();
    if let Some(state) = state {
        details.push_str(&format!(" in state {state}"));
    }
    if !from.is_empty() {
        details.push_str(&format!(" from {from}"));
    }
    details
}
