//! LMDB implementation of VerificationStore.
//!
//! Records are keyed by their raw 16-byte id. A secondary index keyed by
//! `requester_bytes ++ 0x00 ++ id_bytes` (empty value) lets queries narrowed
//! by requester run as a prefix range-scan instead of a full scan. The
//! requester of a record never changes, so the index is written once on
//! create.

use std::ops::Bound;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use docverify_store::{
    sort_and_page, Pagination, SortOrder, StoreError, VerificationFilter, VerificationPatch,
    VerificationRecord, VerificationStore,
};
use docverify_types::{Timestamp, UserId, VerificationId};

use crate::{increment_prefix, LmdbError};

pub struct LmdbVerificationStore {
    pub(crate) env: Arc<Env>,
    pub(crate) verifications_db: Database<Bytes, Bytes>,
    pub(crate) requester_index_db: Database<Bytes, Bytes>,
}

fn requester_prefix(requester: &UserId) -> Vec<u8> {
    let r = requester.as_str().as_bytes();
    let mut key = Vec::with_capacity(r.len() + 1 + VerificationId::LEN);
    key.extend_from_slice(r);
    key.push(0x00);
    key
}

/// Build composite key `requester_bytes ++ 0x00 ++ id_bytes`.
fn requester_key(requester: &UserId, id: &VerificationId) -> Vec<u8> {
    let mut key = requester_prefix(requester);
    key.extend_from_slice(id.as_bytes());
    key
}

impl LmdbVerificationStore {
    /// Ids of every record requested by `requester`.
    fn ids_for_requester(&self, requester: &UserId) -> Result<Vec<VerificationId>, LmdbError> {
        let prefix = requester_prefix(requester);
        let mut upper = prefix.clone();
        increment_prefix(&mut upper);

        let rtxn = self.env.read_txn()?;
        let bounds = (
            Bound::Included(prefix.as_slice()),
            Bound::Excluded(upper.as_slice()),
        );
        let mut ids = Vec::new();
        for entry in self.requester_index_db.range(&rtxn, &bounds)? {
            let (key, _) = entry?;
            let raw = &key[prefix.len()..];
            let id = VerificationId::from_slice(raw)
                .map_err(|e| LmdbError::Schema(format!("bad requester index key: {e}")))?;
            ids.push(id);
        }
        Ok(ids)
    }

    fn scan(&self, filter: &VerificationFilter) -> Result<Vec<VerificationRecord>, LmdbError> {
        if let Some(requester) = &filter.requested_by {
            let ids = self.ids_for_requester(requester)?;
            let rtxn = self.env.read_txn()?;
            let mut out = Vec::with_capacity(ids.len());
            for id in ids {
                let bytes = self
                    .verifications_db
                    .get(&rtxn, id.as_bytes())?
                    .ok_or_else(|| {
                        LmdbError::Schema(format!("requester index points at missing record {id}"))
                    })?;
                let record: VerificationRecord = bincode::deserialize(bytes)?;
                if filter.matches(&record) {
                    out.push(record);
                }
            }
            return Ok(out);
        }

        let rtxn = self.env.read_txn()?;
        let mut out = Vec::new();
        for entry in self.verifications_db.iter(&rtxn)? {
            let (_key, bytes) = entry?;
            let record: VerificationRecord = bincode::deserialize(bytes)?;
            if filter.matches(&record) {
                out.push(record);
            }
        }
        Ok(out)
    }
}

impl VerificationStore for LmdbVerificationStore {
    fn create(&self, record: &VerificationRecord) -> Result<(), StoreError> {
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .verifications_db
            .get(&wtxn, record.id.as_bytes())
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(record.id.to_string()));
        }
        self.verifications_db
            .put(&mut wtxn, record.id.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        self.requester_index_db
            .put(
                &mut wtxn,
                &requester_key(&record.requested_by, &record.id),
                b"",
            )
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_by_id(&self, id: &VerificationId) -> Result<VerificationRecord, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bytes = self
            .verifications_db
            .get(&rtxn, id.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("verification {id}")))?;
        let record = bincode::deserialize(bytes).map_err(LmdbError::from)?;
        Ok(record)
    }

    fn update(
        &self,
        id: &VerificationId,
        patch: &VerificationPatch,
    ) -> Result<VerificationRecord, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut record: VerificationRecord = {
            let bytes = self
                .verifications_db
                .get(&wtxn, id.as_bytes())
                .map_err(LmdbError::from)?
                .ok_or_else(|| LmdbError::NotFound(format!("verification {id}")))?;
            bincode::deserialize(bytes).map_err(LmdbError::from)?
        };
        patch.apply(&mut record, Timestamp::now())?;
        let bytes = bincode::serialize(&record).map_err(LmdbError::from)?;
        self.verifications_db
            .put(&mut wtxn, id.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(record)
    }

    fn find(
        &self,
        filter: &VerificationFilter,
        pagination: Pagination,
        sort: SortOrder,
    ) -> Result<Vec<VerificationRecord>, StoreError> {
        let records = self.scan(filter)?;
        Ok(sort_and_page(records, sort, pagination))
    }

    fn count(&self, filter: &VerificationFilter) -> Result<u64, StoreError> {
        if *filter == VerificationFilter::default() {
            let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
            return Ok(self.verifications_db.len(&rtxn).map_err(LmdbError::from)?);
        }
        Ok(self.scan(filter)?.len() as u64)
    }
}
