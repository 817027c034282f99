//! Typed state vocabularies for entity types.
//!
//! Stateful entity types name their states with a type implementing
//! [`State`]; the entity value stores the state's name as its discriminant.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A named state of an entity type.
///
/// All methods are pure. The name is what an entity value records as its
/// current state, so it must be unique within one type.
///
/// # Example
///
/// ```rust
/// use causeway::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum Connection {
///     Idle,
///     Connecting,
///     Open,
///     Closed,
/// }
///
/// impl State for Connection {
///     fn name(&self) -> &str {
///         match self {
///             Self::Idle => "Idle",
///             Self::Connecting => "Connecting",
///             Self::Open => "Open",
///             Self::Closed => "Closed",
///         }
///     }
///
///     fn is_final(&self) -> bool {
///         matches!(self, Self::Closed)
///     }
/// }
///
/// assert_eq!(Connection::Open.name(), "Open");
/// assert!(Connection::Closed.is_final());
/// ```
pub trait State:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync
{
    /// Name recorded as the entity's discriminant.
    fn name(&self) -> &str;

    /// Terminal states expect no further transitions.
    ///
    /// Default implementation returns `false`.
    fn is_final(&self) -> bool {
        false
    }

    /// Error states represent failure. Usually also final.
    ///
    /// Default implementation returns `false`.
    fn is_error(&self) -> bool {
        false
    }

    /// The state recorded under `name`, if this vocabulary has one.
    ///
    /// Default implementation knows no names.
    fn from_name(name: &str) -> Option<Self>
    where
        Self: Sized,
    {
        let _ = name;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum Lease {
        Held,
        Expired,
        Revoked,
    }

    impl State for Lease {
        fn name(&self) -> &str {
            match self {
                Self::Held => "Held",
                Self::Expired => "Expired",
                Self::Revoked => "Revoked",
            }
        }

        fn is_final(&self) -> bool {
            !matches!(self, Self::Held)
        }

        fn is_error(&self) -> bool {
            matches!(self, Self::Revoked)
        }
    }

    #[test]
    fn names_are_discriminants() {
        let names: Vec<_> = [Lease::Held, Lease::Expired, Lease::Revoked]
            .iter()
            .map(|lease| lease.name().to_string())
            .collect();
        assert_eq!(names, vec!["Held", "Expired", "Revoked"]);
    }

    #[test]
    fn error_states_are_final() {
        assert!(!Lease::Held.is_final());
        assert!(Lease::Expired.is_final() && !Lease::Expired.is_error());
        assert!(Lease::Revoked.is_final() && Lease::Revoked.is_error());
    }

    #[test]
    fn lookup_by_name_defaults_to_none() {
        assert_eq!(Lease::from_name("Held"), None);
    }

    #[test]
    fn states_survive_a_snapshot() {
        let json = serde_json::to_string(&Lease::Expired).unwrap();
        let restored: Lease = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, Lease::Expired);
    }
}
