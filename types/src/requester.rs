//! Requester identities supplied by the external auth layer.
//!
//! The core trusts these identities without re-validating them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// Opaque identifier of a user as issued by the auth collaborator.
///
/// Must be non-empty and free of NUL bytes (NUL is the separator in the
/// requester index keys).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Result<Self, TypesError> {
        let s = raw.into();
        if s.is_empty() || s.contains('\0') {
            return Err(TypesError::InvalidUserId(s));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

/// The kind of party making a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequesterType {
    University,
    Student,
    Company,
    Government,
}

impl RequesterType {
    /// Whether this party may issue (upload) documents.
    pub fn can_issue(&self) -> bool {
        matches!(self, Self::University | Self::Government)
    }

    /// Whether this party sees every record rather than only its own.
    pub fn sees_everything(&self) -> bool {
        matches!(self, Self::Government)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::University => "university",
            Self::Student => "student",
            Self::Company => "company",
            Self::Government => "government",
        }
    }
}

impl FromStr for RequesterType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "university" => Ok(Self::University),
            "student" => Ok(Self::Student),
            "company" => Ok(Self::Company),
            "government" => Ok(Self::Government),
            _ => Err(TypesError::UnknownRequesterType(s.to_string())),
        }
    }
}

/// A resolved requester: who is asking, and what kind of party they are.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterIdentity {
    pub id: UserId,
    pub kind: RequesterType,
}

impl RequesterIdentity {
    pub fn new(id: UserId, kind: RequesterType) -> Self {
        Self { id, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rejects_empty_and_nul() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("a\0b").is_err());
        assert_eq!(UserId::new("u-1").unwrap().as_str(), "u-1");
    }

    #[test]
    fn only_university_and_government_issue() {
        assert!(RequesterType::University.can_issue());
        assert!(RequesterType::Government.can_issue());
        assert!(!RequesterType::Student.can_issue());
        assert!(!RequesterType::Company.can_issue());
    }

    #[test]
    fn requester_type_parse_is_case_insensitive() {
        assert_eq!("Company".parse::<RequesterType>().unwrap(), RequesterType::Company);
        assert!("admin".parse::<RequesterType>().is_err());
    }
}
