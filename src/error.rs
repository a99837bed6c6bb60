use std::error::Error;
use std::fmt::{Display, Formatter};

/// The backend operation that produced an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendAction {
    Create,
    BatchCreate,
    Read,
    Update,
    Delete,
}

impl BackendAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendAction::Create => "create",
            BackendAction::BatchCreate => "batch-create",
            BackendAction::Read => "read",
            BackendAction::Update => "update",
            BackendAction::Delete => "delete",
        }
    }
}

impl Display for BackendAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DocstoreError {
    /// A reference or argument was structurally invalid (empty segment,
    /// slash in a document id, empty update payload).
    InvalidArgument { message: String },
    /// A nested reference lacked a bound parent id at resolution time.
    ///
    /// Never silently falls back to the bare collection; callers must bind
    /// the parent id before resolving.
    IncompleteReference { collection: String },
    /// A raw document could not be decoded into the target model. Carries
    /// the offending document id when one is available.
    Decoding { id: Option<String>, message: String },
    /// The backend rejected or could not complete an operation. Not retried
    /// by this layer.
    Backend {
        action: BackendAction,
        path: String,
        id: Option<String>,
        message: String,
    },
    /// A point lookup found no document at the given path. Distinguished
    /// from `Backend` so callers can treat "absent" differently from
    /// "backend unreachable".
    NotFound { path: String },
}

impl DocstoreError {
    pub fn code_str(&self) -> &'static str {
        match self {
            DocstoreError::InvalidArgument { .. } => "docstore/invalid-argument",
            DocstoreError::IncompleteReference { .. } => "docstore/incomplete-reference",
            DocstoreError::Decoding { .. } => "docstore/decoding",
            DocstoreError::Backend { .. } => "docstore/backend",
            DocstoreError::NotFound { .. } => "docstore/not-found",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DocstoreError::NotFound { .. })
    }

    pub fn is_decoding(&self) -> bool {
        matches!(self, DocstoreError::Decoding { .. })
    }
}

impl Display for DocstoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DocstoreError::InvalidArgument { message } => {
                write!(f, "{} ({})", message, self.code_str())
            }
            DocstoreError::IncompleteReference { collection } => write!(
                f,
                "Reference to '{}' declares a parent without a bound id ({})",
                collection,
                self.code_str()
            ),
            DocstoreError::Decoding { id, message } => write!(
                f,
                "Failed to decode document '{}': {} ({})",
                id.as_deref().unwrap_or("unknown"),
                message,
                self.code_str()
            ),
            DocstoreError::Backend {
                action,
                path,
                id,
                message,
            } => write!(
                f,
                "Backend error on {} at /{}/ (id: {}): {} ({})",
                action,
                path,
                id.as_deref().unwrap_or("unknown"),
                message,
                self.code_str()
            ),
            DocstoreError::NotFound { path } => {
                write!(f, "Document {} not found ({})", path, self.code_str())
            }
        }
    }
}

impl Error for DocstoreError {}

pub type DocstoreResult<T> = Result<T, DocstoreError>;

pub fn invalid_argument(message: impl Into<String>) -> DocstoreError {
    DocstoreError::InvalidArgument {
        message: message.into(),
    }
}

pub fn incomplete_reference(collection: impl Into<String>) -> DocstoreError {
    DocstoreError::IncompleteReference {
        collection: collection.into(),
    }
}

pub fn decoding_failure(id: Option<String>, message: impl Into<String>) -> DocstoreError {
    DocstoreError::Decoding {
        id,
        message: message.into(),
    }
}

pub fn backend_failure(
    action: BackendAction,
    path: impl Into<String>,
    id: Option<String>,
    message: impl Into<String>,
) -> DocstoreError {
    DocstoreError::Backend {
        action,
        path: path.into(),
        id,
        message: message.into(),
    }
}

pub fn not_found(path: impl Into<String>) -> DocstoreError {
    DocstoreError::NotFound { path: path.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_carries_context() {
        let err = backend_failure(
            BackendAction::Update,
            "games/abc",
            Some("42".into()),
            "connection reset",
        );
        assert_eq!(err.code_str(), "docstore/backend");
        let rendered = err.to_string();
        assert!(rendered.contains("update"));
        assert!(rendered.contains("games/abc"));
        assert!(rendered.contains("42"));
    }

    #[test]
    fn not_found_is_distinguishable() {
        let err = not_found("users/7");
        assert!(err.is_not_found());
        assert_eq!(err.code_str(), "docstore/not-found");
    }
}
