use std::fmt::{Display, Formatter};

use crate::error::{invalid_argument, DocstoreResult};

/// A slash-delimited path into the document store.
///
/// Paths alternate collection and document segments: an odd number of
/// segments identifies a collection, an even number a document.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(segments.into_iter().map(Into::into).collect())
    }

    pub fn from_string(path: &str) -> DocstoreResult<Self> {
        if path.trim().is_empty() {
            return Err(invalid_argument("Resource path must not be empty"));
        }
        if path.contains("//") {
            return Err(invalid_argument("Found empty segment in resource path"));
        }
        Ok(Self::from_segments(
            path.split('/').filter(|segment| !segment.is_empty()),
        ))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether the path identifies a collection (odd segment count).
    pub fn is_collection(&self) -> bool {
        !self.is_empty() && self.len() % 2 == 1
    }

    /// Whether the path identifies a document (even, non-zero segment count).
    pub fn is_document(&self) -> bool {
        !self.is_empty() && self.len() % 2 == 0
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self::new(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self::new(self.segments[..self.segments.len() - 1].to_vec()))
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn canonical_string(&self) -> String {
        self.segments.join("/")
    }
}

impl Display for ResourcePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_string())
    }
}

/// Rejects segments that would shift path parity when joined.
pub(crate) fn validate_segment(segment: &str, what: &str) -> DocstoreResult<()> {
    if segment.is_empty() {
        return Err(invalid_argument(format!("{what} must not be empty")));
    }
    if segment.contains('/') {
        return Err(invalid_argument(format!("{what} cannot contain '/'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_render_path() {
        let path = ResourcePath::from_string("games/chess/moves/e4").unwrap();
        assert_eq!(path.len(), 4);
        assert!(path.is_document());
        assert_eq!(path.last_segment(), Some("e4"));
        assert_eq!(path.canonical_string(), "games/chess/moves/e4");
    }

    #[test]
    fn parent_walks_up_one_segment() {
        let path = ResourcePath::from_string("games/chess/moves").unwrap();
        assert!(path.is_collection());
        let parent = path.parent().unwrap();
        assert_eq!(parent.canonical_string(), "games/chess");
    }

    #[test]
    fn rejects_empty_segments() {
        let err = ResourcePath::from_string("games//chess").unwrap_err();
        assert_eq!(err.code_str(), "docstore/invalid-argument");
    }

    #[test]
    fn rejects_slash_in_segment() {
        assert!(validate_segment("a/b", "Document id").is_err());
        assert!(validate_segment("", "Document id").is_err());
        assert!(validate_segment("e4", "Document id").is_ok());
    }
}
