//! Path patterns: `/api/restaurants/:id` parsed into typed segments.

use std::collections::HashMap;
use std::fmt;

use crate::RouterError;

/// Marks a parameter segment in a pattern.
pub const PARAM_MARKER: char = ':';

/// One `/`-separated piece of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the request segment exactly.
    Literal(String),
    /// Matches any request segment and binds it under this name.
    Param(String),
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parses a pattern such as `/api/menu/:id`.
    ///
    /// Empty segments are ignored, so `/api//menu/` is `/api/menu`.
    ///
    /// # Errors
    /// [`RouterError::InvalidPattern`] if the pattern doesn't start with
    /// `/`, carries a query string, has a parameter without a name, or
    /// binds the same name twice.
    pub fn parse(raw: &str) -> Result<Self, RouterError> {
        let invalid = |reason: &str| RouterError::InvalidPattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        if !raw.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }
        if raw.contains('?') {
            return Err(invalid("must not contain a query string"));
        }

        let mut segments = Vec::new();
        for part in split_path(raw) {
            match part.strip_prefix(PARAM_MARKER) {
                Some("") => return Err(invalid("parameter without a name")),
                Some(name) => {
                    let taken = segments
                        .iter()
                        .any(|s| matches!(s, Segment::Param(n) if n == name));
                    if taken {
                        return Err(invalid("parameter name bound twice"));
                    }
                    segments.push(Segment::Param(name.to_string()));
                }
                None => segments.push(Segment::Literal(part.to_string())),
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The pattern as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// `true` when the pattern has no parameters.
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// The pattern with parameter names erased, e.g. `/api/menu/:`.
    ///
    /// Two patterns with the same shape match exactly the same paths.
    pub(crate) fn shape(&self) -> String {
        let mut shape = String::new();
        for segment in &self.segments {
            shape.push('/');
            match segment {
                Segment::Literal(lit) => shape.push_str(lit),
                Segment::Param(_) => shape.push(PARAM_MARKER),
            }
        }
        if shape.is_empty() {
            shape.push('/');
        }
        shape
    }

    /// Tests the pattern against already-split request segments.
    ///
    /// Returns the bound parameters on a match.
    pub fn match_segments(
        &self,
        parts: &[&str],
    ) -> Option<HashMap<String, String>> {
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit.as_str() == *part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }
        Some(params)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Splits a path on `/`, dropping empty pieces.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|p| !p.is_empty()).collect()
}

/// The path without its query string.
pub(crate) fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(path, _)| path)
}

/// Rebuilds a path from its segments: `/a/b`, or `/` when empty.
pub(crate) fn join_path(parts: &[&str]) -> String {
    if parts.is_empty() {
        return "/".to_string();
    }
    parts.iter().fold(String::new(), |mut path, part| {
        path.push('/');
        path.push_str(part);
        path
    })
}
