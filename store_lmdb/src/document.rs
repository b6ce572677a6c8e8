//! LMDB implementation of DocumentStore.
//!
//! Documents are keyed by their raw 16-byte id and stored bincode-encoded.
//! There is no secondary index: document queries are dashboard-only and scan.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use docverify_store::{
    sort_and_page, Document, DocumentFilter, DocumentPatch, DocumentStore, Pagination, SortOrder,
    StoreError,
};
use docverify_types::{DocumentId, Timestamp};

use crate::LmdbError;

pub struct LmdbDocumentStore {
    pub(crate) env: Arc<Env>,
    pub(crate) documents_db: Database<Bytes, Bytes>,
}

impl LmdbDocumentStore {
    fn scan(&self, filter: &DocumentFilter) -> Result<Vec<Document>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        let mut out = Vec::new();
        if let Some(ids) = &filter.ids {
            for id in ids {
                if let Some(bytes) = self.documents_db.get(&rtxn, id.as_bytes())? {
                    let doc: Document = bincode::deserialize(bytes)?;
                    if filter.matches(&doc) {
                        out.push(doc);
                    }
                }
            }
            return Ok(out);
        }
        for entry in self.documents_db.iter(&rtxn)? {
            let (_key, bytes) = entry?;
            let doc: Document = bincode::deserialize(bytes)?;
            if filter.matches(&doc) {
                out.push(doc);
            }
        }
        Ok(out)
    }
}

impl DocumentStore for LmdbDocumentStore {
    fn create(&self, doc: &Document) -> Result<(), StoreError> {
        let bytes = bincode::serialize(doc).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .documents_db
            .get(&wtxn, doc.id.as_bytes())
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(doc.id.to_string()));
        }
        self.documents_db
            .put(&mut wtxn, doc.id.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_by_id(&self, id: &DocumentId) -> Result<Document, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bytes = self
            .documents_db
            .get(&rtxn, id.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("document {id}")))?;
        let doc = bincode::deserialize(bytes).map_err(LmdbError::from)?;
        Ok(doc)
    }

    fn update(&self, id: &DocumentId, patch: &DocumentPatch) -> Result<Document, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut doc: Document = {
            let bytes = self
                .documents_db
                .get(&wtxn, id.as_bytes())
                .map_err(LmdbError::from)?
                .ok_or_else(|| LmdbError::NotFound(format!("document {id}")))?;
            bincode::deserialize(bytes).map_err(LmdbError::from)?
        };
        patch.apply(&mut doc, Timestamp::now());
        let bytes = bincode::serialize(&doc).map_err(LmdbError::from)?;
        self.documents_db
            .put(&mut wtxn, id.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(doc)
    }

    fn find(
        &self,
        filter: &DocumentFilter,
        pagination: Pagination,
        sort: SortOrder,
    ) -> Result<Vec<Document>, StoreError> {
        let docs = self.scan(filter)?;
        Ok(sort_and_page(docs, sort, pagination))
    }

    fn count(&self, filter: &DocumentFilter) -> Result<u64, StoreError> {
        if *filter == DocumentFilter::default() {
            let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
            return Ok(self.documents_db.len(&rtxn).map_err(LmdbError::from)?);
        }
        Ok(self.scan(filter)?.len() as u64)
    }
}
