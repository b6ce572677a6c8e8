//! HTTP API for the DocVerify node.
//!
//! Provides endpoints for:
//! - Document upload records (single and bulk)
//! - Starting, polling and cancelling verifications
//! - Dashboard views scoped by requester type
//! - Prometheus metrics
//!
//! Authentication happens upstream; requests arrive with the resolved
//! identity in the `x-requester-id` / `x-requester-type` headers.

pub mod auth;
pub mod dashboard;
pub mod error;
pub mod handlers;
pub mod pagination;
pub mod server;

pub use auth::Requester;
pub use error::RpcError;
pub use server::{RpcServer, RpcState};
