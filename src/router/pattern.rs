//! Route path patterns.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::router::error::Error;

/// One `/`-separated piece of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the path segment exactly (case-sensitive).
    Literal(String),
    /// `{name}`: matches any non-empty segment and captures it under `name`.
    Param(String),
}

impl Segment {
    fn is_literal(&self) -> bool {
        matches!(self, Segment::Literal(_))
    }
}

/// A parsed route pattern such as `/users/{id}/posts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parse a pattern string.
    ///
    /// A pattern starts with `/`. Each segment is either literal text or a
    /// whole-segment variable `{name}` where `name` is made of ASCII
    /// alphanumerics and `_`. Empty segments are rejected, except that the
    /// pattern may end in a single trailing slash.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let parts = split_path(raw).ok_or_else(|| Error::invalid(raw, "pattern must start with '/'"))?;

        let mut segments = Vec::with_capacity(parts.len());
        let last = parts.len().saturating_sub(1);
        for (index, part) in parts.iter().enumerate() {
            if part.is_empty() {
                if index == last && index > 0 {
                    segments.push(Segment::Literal(String::new()));
                    continue;
                }
                return Err(Error::invalid(raw, "empty segment"));
            }
            segments.push(parse_segment(raw, part)?);
        }

        let mut seen = Vec::new();
        for segment in &segments {
            if let Segment::Param(name) = segment {
                if seen.contains(&name) {
                    return Err(Error::invalid(raw, format!("duplicate variable {{{name}}}")));
                }
                seen.push(name);
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

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn literal_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_literal()).count()
    }

    /// Match already-split path segments, returning the captured variables.
    pub fn matches(&self, parts: &[&str]) -> Option<HashMap<String, String>> {
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }
        Some(params)
    }

    /// Order two patterns of equal depth by match priority.
    ///
    /// Position by position, a literal segment beats a variable; the first
    /// position where they differ decides. `Less` means `self` is tried first.
    pub fn specificity_cmp(&self, other: &Pattern) -> Ordering {
        for (a, b) in self.segments.iter().zip(&other.segments) {
            match (a.is_literal(), b.is_literal()) {
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                _ => {}
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_segment(raw: &str, part: &str) -> Result<Segment, Error> {
    if let Some(inner) = part.strip_prefix('{') {
        let name = inner
            .strip_suffix('}')
            .ok_or_else(|| Error::invalid(raw, format!("unmatched '{{' in segment {part:?}")))?;
        if name.is_empty() {
            return Err(Error::invalid(raw, "empty variable name"));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid(raw, format!("invalid variable name {name:?}")));
        }
        return Ok(Segment::Param(name.to_string()));
    }

    if part.contains(['{', '}']) {
        return Err(Error::invalid(raw, format!("unmatched brace in segment {part:?}")));
    }
    Ok(Segment::Literal(part.to_string()))
}

/// Split a path into its segments. `/` has no segments, `/a/` has `["a", ""]`.
/// Returns `None` if the path is not absolute.
pub(crate) fn split_path(path: &str) -> Option<Vec<&str>> {
    let rest = path.strip_prefix('/')?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    Some(rest.split('/').collect())
}
