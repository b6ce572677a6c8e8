//! Fundamental types for DocVerify.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! record identifiers, requester identities, timestamps, lifecycle statuses and the
//! fixed ordered set of verification steps.

pub mod error;
pub mod id;
pub mod requester;
pub mod state;
pub mod step;
pub mod time;

pub use error::TypesError;
pub use id::{DocumentId, VerificationId};
pub use requester::{RequesterIdentity, RequesterType, UserId};
pub use state::{DocumentStatus, StepStatus, VerificationStatus};
pub use step::StepName;
pub use time::Timestamp;
