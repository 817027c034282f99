//! Entity types: declared fields, events and per-state handlers compiled
//! into immutable record types with a dispatch function.
//!
//! # Key Concepts
//!
//! - **EntityType**: built once from declarations, shared as `Arc`
//! - **Entity**: an immutable value of a type; transitions return new values
//! - **Handlers**: ordered rules matched by event kind, origin path and state
//! - **Declaration errors**: reported by `build()`, all at once

mod builder;
mod definition;
mod error;
mod handler;
pub mod macros;
mod value;

pub use builder::{EntityTypeBuilder, RuleSet, Selector};
pub use definition::{EntityType, EventDecl, InitFn};
pub use error::{DeclarationError, DeclarationErrors};
pub use handler::{EventMatch, Handler, HandlerFn, Transition};
pub use value::Entity;
