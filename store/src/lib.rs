//! Abstract storage traits for DocVerify.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits, and receives
//! store instances explicitly (usually as `Arc<dyn ... + Send + Sync>`).

pub mod document;
pub mod error;
pub mod meta;
pub mod query;
pub mod verification;

pub use document::{
    Document, DocumentFilter, DocumentMetadata, DocumentPatch, DocumentStore, NewDocument,
    VerificationResults,
};
pub use error::StoreError;
pub use meta::MetaStore;
pub use query::{sort_and_page, Pagination, SortOrder, Sortable};
pub use verification::{
    StepState, VerificationFilter, VerificationPatch, VerificationRecord, VerificationStore,
};
