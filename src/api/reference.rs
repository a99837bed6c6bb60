use std::fmt::{Display, Formatter};

use crate::error::{incomplete_reference, DocstoreResult};
use crate::model::{validate_segment, DocumentKey, ResourcePath};

/// Logical pointer to a collection, possibly nested under a parent document.
///
/// A nested reference carries the parent reference plus an optional parent
/// document id. The id must be bound before the reference can be resolved;
/// resolution never falls back to the bare root collection, since that would
/// silently break the isolation between parent documents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reference {
    Root {
        collection: String,
    },
    Nested {
        parent: Box<Reference>,
        parent_id: Option<String>,
        collection: String,
    },
}

impl Reference {
    /// A top-level collection.
    pub fn root(collection: impl Into<String>) -> Self {
        Reference::Root {
            collection: collection.into(),
        }
    }

    /// A collection nested under one document of `parent`. Pass `None` when
    /// the parent id is not known yet and bind it later with
    /// [`Reference::with_parent_id`].
    pub fn nested(
        parent: Reference,
        parent_id: Option<String>,
        collection: impl Into<String>,
    ) -> Self {
        Reference::Nested {
            parent: Box::new(parent),
            parent_id,
            collection: collection.into(),
        }
    }

    /// The collection name this reference points at (the last path segment).
    pub fn collection_name(&self) -> &str {
        match self {
            Reference::Root { collection } | Reference::Nested { collection, .. } => collection,
        }
    }

    /// Returns a copy of this reference with the parent id bound.
    ///
    /// Binding the id of a root reference is a no-op.
    pub fn with_parent_id(&self, id: impl Into<String>) -> Self {
        match self {
            Reference::Root { .. } => self.clone(),
            Reference::Nested {
                parent, collection, ..
            } => Reference::Nested {
                parent: parent.clone(),
                parent_id: Some(id.into()),
                collection: collection.clone(),
            },
        }
    }

    /// Resolves this reference to the fully-qualified collection path.
    ///
    /// # Errors
    /// `IncompleteReference` when any ancestor declares a parent without a
    /// bound id; `InvalidArgument` when a collection name or parent id is
    /// empty or contains `/`.
    pub fn resolve(&self) -> DocstoreResult<ResourcePath> {
        match self {
            Reference::Root { collection } => {
                validate_segment(collection, "Collection name")?;
                Ok(ResourcePath::from_segments([collection.clone()]))
            }
            Reference::Nested {
                parent,
                parent_id,
                collection,
            } => {
                validate_segment(collection, "Collection name")?;
                let id = parent_id
                    .as_deref()
                    .ok_or_else(|| incomplete_reference(collection.clone()))?;
                validate_segment(id, "Parent id")?;
                Ok(parent.resolve()?.child(id).child(collection.clone()))
            }
        }
    }

    /// Resolves the path of the document `id` inside this collection.
    pub fn resolve_document(&self, id: &str) -> DocstoreResult<DocumentKey> {
        validate_segment(id, "Document id")?;
        DocumentKey::from_path(self.resolve()?.child(id))
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.resolve() {
            Ok(path) => write!(f, "Reference({path})"),
            Err(_) => write!(f, "Reference(unbound:{})", self.collection_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_reference_resolves_to_collection() {
        let games = Reference::root("games");
        assert_eq!(games.resolve().unwrap().canonical_string(), "games");
        assert_eq!(
            games.resolve_document("chess").unwrap().path().canonical_string(),
            "games/chess"
        );
    }

    #[test]
    fn nested_reference_requires_parent_id() {
        let moves = Reference::nested(Reference::root("games"), None, "moves");
        let err = moves.resolve().unwrap_err();
        assert_eq!(err.code_str(), "docstore/incomplete-reference");

        let bound = moves.with_parent_id("chess");
        assert_eq!(bound.resolve().unwrap().canonical_string(), "games/chess/moves");
    }

    #[test]
    fn deep_nesting_resolves_recursively() {
        let comments = Reference::nested(
            Reference::nested(Reference::root("games"), Some("chess".into()), "moves"),
            Some("e4".into()),
            "comments",
        );
        assert_eq!(
            comments.resolve().unwrap().canonical_string(),
            "games/chess/moves/e4/comments"
        );
    }

    #[test]
    fn unbound_ancestor_is_an_error() {
        let comments = Reference::nested(
            Reference::nested(Reference::root("games"), None, "moves"),
            Some("e4".into()),
            "comments",
        );
        let err = comments.resolve().unwrap_err();
        assert_eq!(err.code_str(), "docstore/incomplete-reference");
    }

    #[test]
    fn rejects_invalid_segments() {
        let err = Reference::root("games").resolve_document("a/b").unwrap_err();
        assert_eq!(err.code_str(), "docstore/invalid-argument");
    }
}
