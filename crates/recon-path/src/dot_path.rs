//! Dotted key paths over JSON objects
//!
//! Provides [`DotPath`] for addressing values nested inside object trees.
//! Reads are lenient (anything unresolvable is `None`); writes are strict and
//! never partially apply.

use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Segment label used in conflict errors when the document root itself is not an object
const ROOT_SEGMENT: &str = "$";

/// Path into a JSON object tree
///
/// Segments are trimmed on parse and must be non-empty.
///
/// # Examples
/// - `rateLimit.rpm` → `["rateLimit", "rpm"]`
/// - ` rules . mode ` → `["rules", "mode"]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DotPath(Vec<String>);

impl DotPath {
    /// Parse a dotted path
    ///
    /// # Errors
    /// Returns [`PathError::InvalidPath`] for a blank path or any blank segment
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PathError::InvalidPath {
                path: raw.to_string(),
            });
        }

        let segments = trimmed
            .split('.')
            .map(|seg| {
                let seg = seg.trim();
                if seg.is_empty() {
                    Err(PathError::InvalidPath {
                        path: raw.to_string(),
                    })
                } else {
                    Ok(seg.to_string())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self(segments))
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a parsed path; kept for clippy's `len_without_is_empty`
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve the value at this path
    ///
    /// Traverses strictly through objects. A missing key or a non-object
    /// intermediate yields `None`. An explicit `null` leaf is returned as-is.
    #[must_use]
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.0 {
            match current {
                Value::Object(map) => current = map.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Write `value` at this path
    ///
    /// Missing (or `null`) intermediates become empty objects. The leaf is
    /// always overwritten.
    ///
    /// # Errors
    /// Returns [`PathError::Conflict`] when the root or an existing
    /// intermediate is not an object. The document is left untouched.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<(), PathError> {
        self.check_writable(root)?;

        let Some((leaf, parents)) = self.0.split_last() else {
            return Err(PathError::InvalidPath {
                path: self.to_string(),
            });
        };

        let mut current = root;
        for segment in parents {
            let Value::Object(map) = current else {
                return Err(self.conflict(segment));
            };
            current = map.entry(segment.clone()).or_insert(Value::Null);
            if current.is_null() {
                *current = Value::Object(Map::new());
            }
        }

        match current {
            Value::Object(map) => {
                map.insert(leaf.clone(), value);
                Ok(())
            }
            _ => Err(self.conflict(leaf)),
        }
    }

    /// Read-only walk that finds the first blocking intermediate, if any
    fn check_writable(&self, root: &Value) -> Result<(), PathError> {
        let mut map = match root {
            Value::Object(map) => map,
            _ => return Err(self.conflict(ROOT_SEGMENT)),
        };

        let parents = &self.0[..self.0.len().saturating_sub(1)];
        for segment in parents {
            match map.get(segment) {
                None | Some(Value::Null) => return Ok(()),
                Some(Value::Object(next)) => map = next,
                Some(_) => return Err(self.conflict(segment)),
            }
        }
        Ok(())
    }

    fn conflict(&self, segment: &str) -> PathError {
        PathError::Conflict {
            segment: segment.to_string(),
            path: self.to_string(),
        }
    }
}

impl Display for DotPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for DotPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Resolve `path` in `root`
///
/// Blank paths and blank segments resolve to `None` rather than erroring.
#[must_use]
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    DotPath::parse(path).ok()?.get(root)
}

/// Write `value` at `path` in `root`
///
/// # Errors
/// See [`DotPath::parse`] and [`DotPath::set`]
pub fn set(root: &mut Value, path: &str, value: Value) -> Result<(), PathError> {
    DotPath::parse(path)?.set(root, value)
}

/// Errors related to dot paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Blank path or blank segment
    #[error("invalid path: '{path}'")]
    InvalidPath { path: String },

    /// Existing intermediate value is not an object
    #[error("path segment is not an object: {segment} in {path}")]
    Conflict { segment: String, path: String },
}

impl PathError {
    /// Check if this is a data-integrity conflict (as opposed to a malformed path)
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
