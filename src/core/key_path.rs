//! Key-paths locating nodes inside a tree.
//!
//! A key-path is an ordered list of steps, outermost first. The empty path
//! refers to the node a dispatch starts from.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step into a composite node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    /// Entity field or map key.
    Key(String),
    /// List position.
    Index(usize),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Step {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for Step {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for Step {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Ordered, immutable list of steps.
///
/// Equality is structural and order-sensitive.
///
/// # Example
///
/// ```rust
/// use causeway::core::{KeyPath, Step};
///
/// let path = KeyPath::parse("root.tasks.0");
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.steps()[2], Step::Index(0));
/// assert_eq!(path.to_string(), "root.tasks.0");
///
/// let joined = KeyPath::parse("root").concat(&KeyPath::parse("tasks.0"));
/// assert_eq!(joined, path);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyPath {
    steps: Vec<Step>,
}

impl KeyPath {
    /// The empty path.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    /// Parse a dotted path. Segments made only of digits become list indices.
    pub fn parse(text: &str) -> Self {
        Self::from_steps(
            text.split('.')
                .filter(|segment| !segment.is_empty())
                .map(|segment| match segment.parse::<usize>() {
                    Ok(index) => Step::Index(index),
                    Err(_) => Step::Key(segment.to_string()),
                }),
        )
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Path extended by one step at the inner end.
    pub fn child(&self, step: impl Into<Step>) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step.into());
        Self { steps }
    }

    /// Path extended by one step at the outer end.
    pub fn prefixed(&self, step: impl Into<Step>) -> Self {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.push(step.into());
        steps.extend(self.steps.iter().cloned());
        Self { steps }
    }

    /// `self` followed by `inner`.
    pub fn concat(&self, inner: &KeyPath) -> Self {
        let mut steps = self.steps.clone();
        steps.extend(inner.steps.iter().cloned());
        Self { steps }
    }

    /// First step and the remaining path, if any.
    pub fn split_first(&self) -> Option<(&Step, KeyPath)> {
        self.steps
            .split_first()
            .map(|(first, rest)| (first, Self::from_steps(rest.iter().cloned())))
    }

    pub fn starts_with(&self, prefix: &KeyPath) -> bool {
        self.steps.starts_with(&prefix.steps)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, step) in self.steps.iter().enumerate() {
            if position > 0 {
                f.write_str(".")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

impl From<&str> for KeyPath {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<Step> for KeyPath {
    fn from(step: Step) -> Self {
        Self { steps: vec![step] }
    }
}

impl FromIterator<Step> for KeyPath {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self::from_steps(iter)
    }
}
