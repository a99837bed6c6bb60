//! Backend-agnostic realtime document repository client.
//!
//! The crate wraps an external document backend (queries, point lookups,
//! realtime push, writes) behind the [`backend::DocumentBackend`] trait and
//! layers three things on top:
//!
//! - a fetch/decode pipeline ([`DocstoreClient`]) that decodes each returned
//!   record independently and tolerates partial failures,
//! - per-query listener lifecycle management ([`ListenerRegistry`]) keyed by
//!   a deterministic query cache key, with cancel-then-replace semantics so
//!   duplicate subscriptions can never stack,
//! - reactive repositories ([`CollectionRepository`], [`ObjectRepository`])
//!   that hold the latest decoded snapshot and publish it as a value stream.

pub mod api;
pub mod backend;
pub mod error;
pub mod model;
pub mod registry;
pub mod repository;
pub mod value;

pub use api::{
    DataConverter, DecodedBatch, DecodedRecord, DocstoreClient, Filter, FilterOperator,
    PassthroughConverter, QueryDescriptor, RawDocument, Reference, SerdeConverter,
};
pub use backend::{DocumentBackend, InMemoryBackend};
pub use error::{BackendAction, DocstoreError, DocstoreResult};
pub use registry::{ListenerRegistry, WatchRegistration};
pub use repository::{CollectionRepository, ObjectRepository, RepositoryState};
