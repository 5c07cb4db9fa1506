//! Hierarchical Tags
//!
//! Dot-separated names (`Gameplay.Zone.Head`) carried by surface materials
//! and used as keys for material damage multipliers.

use std::fmt;
use serde::{Serialize, Deserialize};

/// A hierarchical, dot-separated tag.
///
/// Ordered so tag sets iterate deterministically.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Create a tag from its full name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Full tag name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if this tag equals `parent` or lives underneath it.
    ///
    /// `Gameplay.Zone.Head` matches `Gameplay.Zone`; `Gameplay.ZoneX` does not.
    pub fn matches_tag(&self, parent: &Tag) -> bool {
        match self.0.strip_prefix(parent.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('.'),
            None => false,
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_tag() {
        let zone = Tag::new("Gameplay.Zone");
        assert!(Tag::new("Gameplay.Zone.Head").matches_tag(&zone));
        assert!(Tag::new("Gameplay.Zone").matches_tag(&zone));
        assert!(!Tag::new("Gameplay.ZoneX").matches_tag(&zone));
        assert!(!Tag::new("Gameplay").matches_tag(&zone));
    }
}
