//! Nullable infrastructure for deterministic testing.
//!
//! External dependencies of the verification engine (storage and step
//! execution) sit behind traits. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be scripted and inspected programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod executor;
pub mod fixtures;
pub mod store;

pub use executor::{NullStepExecutor, ScriptedStep};
pub use fixtures::{sample_document, sample_new_document};
pub use store::{
    FlakyDocumentStore, FlakyVerificationStore, NullDocumentStore, NullMetaStore,
    NullVerificationStore,
};
