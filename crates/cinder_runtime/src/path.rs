//! Response paths.
//!
//! A [`Path`] is a persistent list: extending it allocates one node and shares
//! the prefix with every other path derived from the same parent.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// A path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        Self::Field(name.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

struct PathNode {
    segment: PathSegment,
    parent: Path,
    len: usize,
}

/// A position in the result tree.
#[derive(Clone, Default)]
pub struct Path(Option<Arc<PathNode>>);

impl Path {
    /// The empty path.
    #[must_use]
    pub fn root() -> Self {
        Self(None)
    }

    /// Returns a new path extended by a segment.
    #[must_use]
    pub fn push(&self, segment: PathSegment) -> Self {
        Self(Some(Arc::new(PathNode {
            segment,
            parent: self.clone(),
            len: self.len() + 1,
        })))
    }

    /// Returns a new path extended by a field name.
    #[must_use]
    pub fn field(&self, name: &str) -> Self {
        self.push(PathSegment::Field(name.to_string()))
    }

    /// Returns a new path extended by a list index.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        self.push(PathSegment::Index(index))
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.as_ref().map_or(0, |node| node.len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// The last segment, if any.
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.as_ref().map(|node| &node.segment)
    }

    /// Segments from the root to this position.
    #[must_use]
    pub fn segments(&self) -> Vec<PathSegment> {
        let mut segments = Vec::with_capacity(self.len());
        let mut current = self;
        while let Some(node) = &current.0 {
            segments.push(node.segment.clone());
            current = &node.parent;
        }
        segments.reverse();
        segments
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        let (mut a, mut b) = (self, other);
        loop {
            match (&a.0, &b.0) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if Arc::ptr_eq(x, y) {
                        return true;
                    }
                    if x.len != y.len || x.segment != y.segment {
                        return false;
                    }
                    a = &x.parent;
                    b = &y.parent;
                }
                _ => return false,
            }
        }
    }
}

impl Eq for Path {}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.segments()).finish()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments().iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.segments().serialize(serializer)
    }
}

impl From<&Path> for Vec<PathSegment> {
    fn from(path: &Path) -> Self {
        path.segments()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_shares_prefix() {
        let user = Path::root().field("user");
        let first = user.field("friends").index(0);
        let second = user.field("friends").index(1);

        assert_eq!(first.len(), 3);
        assert_eq!(
            first.segments(),
            vec![
                PathSegment::from("user"),
                PathSegment::from("friends"),
                PathSegment::Index(0),
            ]
        );
        assert_eq!(second.last(), Some(&PathSegment::Index(1)));
        assert_eq!(user.len(), 1);
    }

    #[test]
    fn test_structural_equality() {
        let a = Path::root().field("a").index(2);
        let b = Path::root().field("a").index(2);
        let c = Path::root().field("a").index(3);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, Path::root().field("a"));
        assert_eq!(Path::root(), Path::default());
    }

    #[test]
    fn test_display_and_serialize() {
        let path = Path::root().field("items").index(4).field("name");
        assert_eq!(path.to_string(), "items.4.name");
        assert_eq!(
            serde_json::to_value(&path).unwrap(),
            serde_json::json!(["items", 4, "name"])
        );
    }
}
