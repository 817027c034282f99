//! Declaration errors for entity type builders.

use thiserror::Error;

/// A single problem found while compiling an entity type's declarations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeclarationError {
    #[error("Entity type name is empty. Pass a name to EntityType::builder()")]
    MissingTypeName,

    #[error("A declared {kind} has an empty name")]
    EmptyName { kind: &'static str },

    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("Event '{0}' is declared more than once")]
    DuplicateEvent(String),

    #[error("State '{0}' is declared more than once")]
    DuplicateState(String),

    #[error("Rule refers to undeclared event '{0}'. Declare it with .event_in()")]
    UnknownEvent(String),

    #[error("Rule has an empty 'from' path. Use a rule without .from() to match any origin")]
    EmptyFromPath,
}

/// Every problem found in one entity type's declarations.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid declaration of '{entity}': {}", join(.errors))]
pub struct DeclarationErrors {
    pub entity: String,
    pub errors: Vec<DeclarationError>,
}

impl DeclarationErrors {
    pub fn errors(&self) -> &[DeclarationError] {
        &self.errors
    }

    pub fn contains(&self, error: &DeclarationError) -> bool {
        self.errors.contains(error)
    }
}

fn join(errors: &[DeclarationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
