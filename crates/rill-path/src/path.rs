//! Ordered element sequences.

use serde::{Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use crate::key::Element;

/// An ordered sequence of [`Element`]s. The empty path denotes the root
/// and prints as `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<Element>);

impl Path {
    /// The empty path.
    pub fn root() -> Path {
        Path(Vec::new())
    }

    pub fn from_elements(elements: Vec<Element>) -> Path {
        Path(elements)
    }

    /// Builds a path of string elements.
    pub fn from_strings<I, S>(parts: I) -> Path
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Path(parts.into_iter().map(|s| Element::Str(s.into())).collect())
    }

    /// Returns a new path with `element` appended.
    pub fn append(&self, element: impl Into<Element>) -> Path {
        let mut elements = self.0.clone();
        elements.push(element.into());
        Path(elements)
    }

    /// Returns the concatenation `self ++ other`.
    pub fn join(&self, other: &Path) -> Path {
        let mut elements = self.0.clone();
        elements.extend(other.0.iter().cloned());
        Path(elements)
    }

    pub fn as_slice(&self) -> &[Element] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Element> {
        self.0.iter()
    }

    /// `true` when any element is [`Element::Wildcard`].
    pub fn has_wildcard(&self) -> bool {
        self.0.iter().any(|el| matches!(el, Element::Wildcard))
    }
}

impl Deref for Path {
    type Target = [Element];

    fn deref(&self) -> &[Element] {
        &self.0
    }
}

impl From<Vec<Element>> for Path {
    fn from(elements: Vec<Element>) -> Path {
        Path(elements)
    }
}

impl FromIterator<Element> for Path {
    fn from_iter<I: IntoIterator<Item = Element>>(iter: I) -> Path {
        Path(iter.into_iter().collect())
    }
}

impl IntoIterator for Path {
    type Item = Element;
    type IntoIter = std::vec::IntoIter<Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Element;
    type IntoIter = std::slice::Iter<'a, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for el in &self.0 {
            write!(f, "/{el}")?;
        }
        Ok(())
    }
}

/// Parses a `/`-separated path into string elements. `/` alone is the
/// empty path. Wildcards and typed elements have no string spelling and
/// are built with the [`Path`] constructors instead.
impl FromStr for Path {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Path, Infallible> {
        let trimmed = s.strip_prefix('/').unwrap_or(s);
        if trimmed.is_empty() {
            return Ok(Path::root());
        }
        Ok(Path(
            trimmed
                .split('/')
                .map(|part| Element::Str(part.to_string()))
                .collect(),
        ))
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
