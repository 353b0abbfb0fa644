//! Slot path resolution.
//!
//! Paths address values inside the slot map with dots and bracket indices,
//! e.g. `user.name`, `items[0]`, `result.rows[2].id`. Resolution walks the
//! JSON value tree; any miss (unknown key, index out of bounds, indexing a
//! non-array) resolves to nothing.

use serde_json::Value;

use crate::common::Slots;

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A tokenized slot path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPath {
    segments: Vec<PathSegment>,
}

impl SlotPath {
    /// Parse a dot/bracket path. Returns `None` for malformed input
    /// (empty segments, unclosed brackets, non-numeric indices).
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }

        let mut segments = Vec::new();
        let mut rest = raw;

        while !rest.is_empty() {
            if let Some(stripped) = rest.strip_prefix('[') {
                let close = stripped.find(']')?;
                let index: usize = stripped[..close].parse().ok()?;
                segments.push(PathSegment::Index(index));
                rest = &stripped[close + 1..];
                rest = rest.strip_prefix('.').unwrap_or(rest);
                continue;
            }

            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            if end == 0 {
                return None;
            }
            segments.push(PathSegment::Key(rest[..end].to_string()));
            match rest.as_bytes().get(end) {
                Some(b'.') => rest = &rest[end + 1..],
                _ => rest = &rest[end..],
            }
        }

        if segments.is_empty() { None } else { Some(Self { segments }) }
    }

    /// Walk this path down a JSON value tree.
    pub fn resolve<'a>(
        &self,
        root: &'a Value,
    ) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
                (PathSegment::Index(i), Value::Array(items)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Resolve a dot/bracket path against a slot map.
pub fn resolve_path<'a>(
    slots: &'a Slots,
    path: &str,
) -> Option<&'a Value> {
    let parsed = SlotPath::parse(path)?;
    let mut segments = parsed.segments.iter();

    let first = match segments.next()? {
        PathSegment::Key(key) => slots.get(key)?,
        PathSegment::Index(_) => return None,
    };

    let mut current = first;
    for segment in segments {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
            (PathSegment::Index(i), Value::Array(items)) => items.get(*i)?,
            _ => return None,
        };
    }
    Some(current)
}
