//! Record identifiers for documents and verification records.
//!
//! Identifiers are 128 bits of randomness. On the wire (JSON) they are rendered
//! as 32 lowercase hex characters; in binary encodings (LMDB values) they are
//! stored as the raw 16 bytes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name([u8; 16]);

        impl $name {
            pub const LEN: usize = 16;

            pub fn new(bytes: [u8; 16]) -> Self {
                Self(bytes)
            }

            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(rand::random())
            }

            pub fn as_bytes(&self) -> &[u8; 16] {
                &self.0
            }

            /// Rebuild an identifier from a raw 16-byte slice (e.g. an LMDB key).
            pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
                let arr: [u8; 16] = bytes
                    .try_into()
                    .map_err(|_| TypesError::InvalidId(format!("expected 16 bytes, got {}", bytes.len())))?;
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(&self.0[..4]))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = hex::decode(s).map_err(|_| TypesError::InvalidId(s.to_string()))?;
                Self::from_slice(&bytes).map_err(|_| TypesError::InvalidId(s.to_string()))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_string())
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    s.parse().map_err(serde::de::Error::custom)
                } else {
                    <[u8; 16]>::deserialize(deserializer).map(Self)
                }
            }
        }
    };
}

record_id! {
    /// Identifier of an issued document.
    DocumentId
}

record_id! {
    /// Identifier of a single verification attempt.
    VerificationId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_lowercase_hex() {
        let id = DocumentId::new([0xAB; 16]);
        assert_eq!(id.to_string(), "ab".repeat(16));
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!("abcd".parse::<VerificationId>().is_err());
        assert!("zz".repeat(16).parse::<VerificationId>().is_err());
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(VerificationId::generate(), VerificationId::generate());
    }

    #[test]
    fn json_uses_hex_string() {
        let id = VerificationId::new([1; 16]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(16)));
        let back: VerificationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn bincode_uses_raw_bytes() {
        let id = DocumentId::new([7; 16]);
        let bytes = bincode::serialize(&id).unwrap();
        assert_eq!(bytes.len(), 16);
        let back: DocumentId = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, id);
    }
}
