mod document_key;
mod resource_path;
mod timestamp;

pub use document_key::DocumentKey;
pub use resource_path::ResourcePath;
pub use timestamp::Timestamp;

pub(crate) use resource_path::validate_segment;
