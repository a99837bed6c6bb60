mod client;
mod converter;
mod query;
mod reference;
mod snapshot;

pub use client::{CollectionUpdateCallback, DocstoreClient, DocumentUpdateCallback};
pub use converter::{DataConverter, PassthroughConverter, SerdeConverter};
pub use query::{Filter, FilterOperator, QueryDescriptor};
pub use reference::Reference;
pub use snapshot::{DecodedBatch, DecodedRecord, RawDocument};
