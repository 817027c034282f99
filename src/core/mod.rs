//! Core vocabulary shared by every layer.
//!
//! - Key-paths locating nodes in a tree
//! - Events, with a closed set of runtime variants and a custom fallback
//! - Tree nodes with persistent aggregates
//! - The `State` trait naming entity states
//!
//! Everything here is a plain immutable value.

mod event;
mod key_path;
mod node;
mod state;

pub use event::{CustomEvent, Event, EventKind};
pub use key_path::{KeyPath, Step};
pub use node::Node;
pub use state::State;
