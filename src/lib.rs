//! Causeway: a declarative effect runtime
//!
//! Application state is an immutable tree of typed state-machine values.
//! The tree says which external effects should be running; a reconciler
//! compares it against what is actually running, starts what is new,
//! cancels what disappeared, and routes each effect's output back into the
//! tree as an event.
//!
//! # Core Concepts
//!
//! - **Entities**: immutable values of declared types with per-state handlers
//! - **Dispatch**: events applied by key-path, bubbling up through ancestors
//! - **IO leaves**: descriptions of effects, registered and cancelled by the
//!   [`Manager`]
//! - **Tasks**: one asynchronous call as a four-state machine
//!
//! # Example
//!
//! ```rust
//! use causeway::core::{Event, KeyPath, Node};
//! use causeway::dispatch::update_in;
//! use causeway::entity::EntityType;
//! use causeway::state_enum;
//!
//! state_enum! {
//!     pub enum Switch {
//!         Off,
//!         On,
//!     }
//! }
//!
//! let switch = EntityType::builder("Switch")
//!     .event_in("Toggle")
//!     .state(Switch::Off, |rules| {
//!         rules.on("Toggle", |switch, _, _| Ok(switch.set_state(&Switch::On)?.into()))
//!     })
//!     .state(Switch::On, |rules| {
//!         rules.on("Toggle", |switch, _, _| Ok(switch.set_state(&Switch::Off)?.into()))
//!     })
//!     .build()
//!     .unwrap();
//!
//! let toggle = switch.event("Toggle").unwrap().create();
//! let result = update_in(&Node::from(switch.create()), &KeyPath::root(), toggle).unwrap();
//!
//! assert!(result.node.as_entity().unwrap().in_state(&Switch::On));
//! ```

pub mod config;
pub mod core;
pub mod dispatch;
pub mod entity;
pub mod io;
pub mod runtime;
pub mod task;

// Re-export commonly used types
pub use config::Config;
pub use core::{Event, EventKind, KeyPath, Node, State};
pub use dispatch::DispatchError;
pub use entity::{Entity, EntityType, Transition};
pub use io::{IoLeaf, Manager, ManagerError};
pub use runtime::{resolve, BatchError, Runtime, TaskFailed};
pub use task::{Task, TaskEvent, TaskState};
