//! Parse and validation errors for the fundamental types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    #[error("unknown verification step: {0}")]
    UnknownStep(String),

    #[error("unknown requester type: {0}")]
    UnknownRequesterType(String),
}
