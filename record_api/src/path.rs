use std::fmt;

use crate::StoreError;

const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']'];

/// Location in the record tree, e.g. `conversations/abc/participants`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RecordPath(String);

impl RecordPath {
    /// The root of the tree.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse a `/`-separated path. Leading and trailing slashes are ignored.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        for segment in trimmed.split('/') {
            validate_segment(segment).map_err(|_| StoreError::InvalidPath(raw.to_string()))?;
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Build a path from individual segments.
    pub fn from_segments(segments: &[&str]) -> Result<Self, StoreError> {
        segments
            .iter()
            .try_fold(Self::root(), |path, segment| path.child(segment))
    }

    /// Path of the child `key` below this one.
    pub fn child(&self, key: &str) -> Result<Self, StoreError> {
        validate_segment(key)?;
        if self.0.is_empty() {
            Ok(Self(key.to_string()))
        } else {
            Ok(Self(format!("{}/{}", self.0, key)))
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Last segment, `None` for the root.
    pub fn key(&self) -> Option<&str> {
        if self.0.is_empty() {
            None
        } else {
            self.0.rsplit('/').next()
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `other` lies strictly below this path.
    pub fn is_ancestor_of(&self, other: &RecordPath) -> bool {
        if self.0.is_empty() {
            return !other.0.is_empty();
        }
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }

    /// True when the paths are equal or one lies below the other.
    pub fn overlaps(&self, other: &RecordPath) -> bool {
        self == other || self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

fn validate_segment(segment: &str) -> Result<(), StoreError> {
    if segment.is_empty() || segment.contains('/') || segment.contains(FORBIDDEN) {
        return Err(StoreError::InvalidPath(segment.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_navigate() {
        let p = RecordPath::parse("/messages/c1/u1/").unwrap();
        assert_eq!(p.as_str(), "messages/c1/u1");
        assert_eq!(p.key(), Some("u1"));
        assert_eq!(p.parent().unwrap().as_str(), "messages/c1");
        assert_eq!(p.segments().collect::<Vec<_>>(), ["messages", "c1", "u1"]);
        assert_eq!(RecordPath::parse("a").unwrap().parent(), Some(RecordPath::root()));
        assert!(RecordPath::root().parent().is_none());
    }

    #[test]
    fn rejects_bad_segments() {
        assert!(RecordPath::parse("a//b").is_err());
        assert!(RecordPath::parse("a/b.c").is_err());
        assert!(RecordPath::root().child("x$").is_err());
        assert!(RecordPath::root().child("").is_err());
        assert!(RecordPath::from_segments(&["users", "a/b"]).is_err());
    }

    #[test]
    fn ancestry() {
        let conv = RecordPath::parse("conversations/c1").unwrap();
        let flag = RecordPath::parse("conversations/c1/participants/u1").unwrap();
        let other = RecordPath::parse("conversations/c10").unwrap();
        assert!(conv.is_ancestor_of(&flag));
        assert!(!flag.is_ancestor_of(&conv));
        assert!(!conv.is_ancestor_of(&other));
        assert!(!conv.is_ancestor_of(&conv));
        assert!(conv.overlaps(&flag) && flag.overlaps(&conv));
        assert!(!conv.overlaps(&other));
        assert!(RecordPath::root().is_ancestor_of(&conv));
    }
}
