//! Macros for declaring state vocabularies.

/// Declare a unit enum as an entity state vocabulary.
///
/// Generates the enum, its [`State`](crate::core::State) implementation with
/// name lookup, and an `ALL` constant listing the states in declaration
/// order, which is the order to hand them to the entity builder. The first
/// one declared is the initial state.
///
/// # Example
///
/// ```
/// use causeway::state_enum;
/// use causeway::core::State;
///
/// state_enum! {
///     pub enum Upload {
///         Queued,
///         Sending,
///         Done,
///         Rejected,
///     }
///     final: [Done, Rejected]
///     error: [Rejected]
/// }
///
/// assert_eq!(Upload::Sending.name(), "Sending");
/// assert_eq!(Upload::from_name("Rejected"), Some(Upload::Rejected));
/// assert_eq!(Upload::ALL.len(), 4);
/// assert!(Upload::Rejected.is_error());
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }

        $(final: [$($final:ident),* $(,)?])?
        $(error: [$($error:ident),* $(,)?])?
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $name {
            /// Every state, in declaration order.
            #[allow(dead_code)]
            $vis const ALL: &'static [Self] = &[$(Self::$variant),*];
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            fn is_final(&self) -> bool {
                match self {
                    $($(Self::$final => true,)*)?
                    _ => false,
                }
            }

            fn is_error(&self) -> bool {
                match self {
                    $($(Self::$error => true,)*)?
                    _ => false,
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($variant) => Some(Self::$variant),)*
                    _ => None,
                }
            }
        }
    };
}
