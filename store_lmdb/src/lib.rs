//! LMDB storage backend for DocVerify.
//!
//! Implements the storage traits from `docverify-store` using the `heed` LMDB
//! bindings. Each logical store maps to one or more named databases within a
//! single environment.

pub mod document;
pub mod environment;
pub mod error;
pub mod meta;
pub mod migration;
pub mod verification;

pub use document::LmdbDocumentStore;
pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use meta::LmdbMetaStore;
pub use migration::{Migrator, CURRENT_SCHEMA_VERSION};
pub use verification::LmdbVerificationStore;

/// Turn `prefix` into the smallest key greater than every key starting with
/// it, for use as an exclusive upper range bound.
pub(crate) fn increment_prefix(prefix: &mut Vec<u8>) {
    while let Some(last) = prefix.last_mut() {
        if *last == u8::MAX {
            prefix.pop();
        } else {
            *last += 1;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::increment_prefix;

    #[test]
    fn increment_carries_over_max_bytes() {
        let mut p = vec![b'a', 0x00];
        increment_prefix(&mut p);
        assert_eq!(p, vec![b'a', 0x01]);

        let mut p = vec![b'a', 0xFF];
        increment_prefix(&mut p);
        assert_eq!(p, vec![b'b']);
    }
}
