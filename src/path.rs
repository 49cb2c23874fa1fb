//! Locations inside JSON values and schema documents.
//!
//! A [`JsonPath`] is an ordered list of object keys and array indices leading
//! from a root value to a nested one. Validation errors carry the path of the
//! offending element, and schema loading errors carry the path of the offending
//! keyword.

use std::fmt::{self, Display};

use serde_json::Value;

/// A single step in a [`JsonPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// An object key.
    Key(String),
    /// An array index.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// A path from the root of a JSON value to a nested element.
///
/// Paths are immutable: [`key`](JsonPath::key) and [`index`](JsonPath::index)
/// return extended copies, so a parent path can be shared by every child.
///
/// # Example
///
/// ```rust
/// use gbnf_json::JsonPath;
///
/// let path = JsonPath::root().key("users").index(0).key("display name");
///
/// assert_eq!(path.to_string(), r#"users[0]["display name"]"#);
/// assert_eq!(path.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct JsonPath {
    segments: Vec<PathSegment>,
}

impl JsonPath {
    /// The empty path, pointing at the root value.
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns this path extended with an object key.
    pub fn key(&self, name: impl Into<String>) -> Self {
        self.with(PathSegment::Key(name.into()))
    }

    /// Returns this path extended with an array index.
    pub fn index(&self, index: usize) -> Self {
        self.with(PathSegment::Index(index))
    }

    fn with(&self, segment: PathSegment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(segment);
        Self { segments }
    }

    /// Returns true if this path has no segments.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Same as [`is_root`](JsonPath::is_root).
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Iterates over the segments from the root outwards.
    pub fn segments(&self) -> impl Iterator<Item = &PathSegment> {
        self.segments.iter()
    }

    /// The innermost segment, or `None` at the root.
    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Renders the path as a JSON array of keys (strings) and indices (numbers).
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.segments
                .iter()
                .map(|segment| match segment {
                    PathSegment::Key(key) => Value::String(key.clone()),
                    PathSegment::Index(index) => Value::from(*index),
                })
                .collect(),
        )
    }
}

impl<S: Into<PathSegment>> FromIterator<S> for JsonPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }
}

fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '-')
}

impl Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if is_plain_key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathSegment::Key(key) => {
                    write!(f, "[{}]", Value::String(key.clone()))?;
                }
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}
