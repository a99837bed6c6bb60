use crate::error::{invalid_argument, DocstoreResult};
use crate::model::ResourcePath;

/// Fully-qualified path to a single document.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    path: ResourcePath,
}

impl DocumentKey {
    pub fn from_path(path: ResourcePath) -> DocstoreResult<Self> {
        if !path.is_document() {
            return Err(invalid_argument(
                "Document keys must point to a document (even number of segments)",
            ));
        }
        Ok(Self { path })
    }

    pub fn from_string(path: &str) -> DocstoreResult<Self> {
        Self::from_path(ResourcePath::from_string(path)?)
    }

    /// The collection that contains this document.
    pub fn collection_path(&self) -> ResourcePath {
        self.path
            .parent()
            .expect("DocumentKey path always has a parent collection")
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// The document identifier (last path segment).
    pub fn id(&self) -> &str {
        self.path
            .last_segment()
            .expect("DocumentKey path always has id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_even_segments() {
        let err = DocumentKey::from_string("games").unwrap_err();
        assert_eq!(err.code_str(), "docstore/invalid-argument");
    }

    #[test]
    fn parses_valid_path() {
        let key = DocumentKey::from_string("games/chess").unwrap();
        assert_eq!(key.id(), "chess");
        assert_eq!(key.collection_path().canonical_string(), "games");
    }
}
