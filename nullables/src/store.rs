//! Nullable stores: thread-safe in-memory storage for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use docverify_store::{
    sort_and_page, Document, DocumentFilter, DocumentPatch, DocumentStore, MetaStore, Pagination,
    SortOrder, StoreError, VerificationFilter, VerificationPatch, VerificationRecord,
    VerificationStore,
};
use docverify_types::{DocumentId, Timestamp, VerificationId};

/// An in-memory document store for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
#[derive(Default)]
pub struct NullDocumentStore {
    docs: Mutex<HashMap<DocumentId, Document>>,
}

impl NullDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document, replacing any existing one with the same id.
    pub fn insert(&self, doc: Document) {
        self.docs.lock().unwrap().insert(doc.id, doc);
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for NullDocumentStore {
    fn create(&self, doc: &Document) -> Result<(), StoreError> {
        let mut docs = self.docs.lock().unwrap();
        if docs.contains_key(&doc.id) {
            return Err(StoreError::Duplicate(doc.id.to_string()));
        }
        docs.insert(doc.id, doc.clone());
        Ok(())
    }

    fn get_by_id(&self, id: &DocumentId) -> Result<Document, StoreError> {
        self.docs
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("document {id}")))
    }

    fn update(&self, id: &DocumentId, patch: &DocumentPatch) -> Result<Document, StoreError> {
        let mut docs = self.docs.lock().unwrap();
        let doc = docs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("document {id}")))?;
        patch.apply(doc, Timestamp::now());
        Ok(doc.clone())
    }

    fn find(
        &self,
        filter: &DocumentFilter,
        pagination: Pagination,
        sort: SortOrder,
    ) -> Result<Vec<Document>, StoreError> {
        let matching = self
            .docs
            .lock()
            .unwrap()
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        Ok(sort_and_page(matching, sort, pagination))
    }

    fn count(&self, filter: &DocumentFilter) -> Result<u64, StoreError> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .values()
            .filter(|d| filter.matches(d))
            .count() as u64)
    }
}

/// An in-memory verification store for testing.
///
/// Every successful write is also appended to a history log so tests can
/// check properties of the whole sequence of transitions, not just the
/// final state.
#[derive(Default)]
pub struct NullVerificationStore {
    records: Mutex<HashMap<VerificationId, VerificationRecord>>,
    history: Mutex<Vec<VerificationRecord>>,
}

impl NullVerificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing `create`.
    pub fn insert(&self, record: VerificationRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    /// Delete a record, as an external actor might.
    pub fn remove(&self, id: &VerificationId) -> Option<VerificationRecord> {
        self.records.lock().unwrap().remove(id)
    }

    /// Every state `id` has been written in, oldest first.
    pub fn history(&self, id: &VerificationId) -> Vec<VerificationRecord> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.id == id)
            .cloned()
            .collect()
    }
}

impl VerificationStore for NullVerificationStore {
    fn create(&self, record: &VerificationRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id.to_string()));
        }
        records.insert(record.id, record.clone());
        self.history.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn get_by_id(&self, id: &VerificationId) -> Result<VerificationRecord, StoreError> {
        self.records
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("verification {id}")))
    }

    fn update(
        &self,
        id: &VerificationId,
        patch: &VerificationPatch,
    ) -> Result<VerificationRecord, StoreError> {
        let mut records = self.records.lock().unwrap();
        let current = records
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("verification {id}")))?;
        // Patch a copy so a rejected patch leaves the stored record untouched.
        let mut next = current.clone();
        patch.apply(&mut next, Timestamp::now())?;
        records.insert(*id, next.clone());
        self.history.lock().unwrap().push(next.clone());
        Ok(next)
    }

    fn find(
        &self,
        filter: &VerificationFilter,
        pagination: Pagination,
        sort: SortOrder,
    ) -> Result<Vec<VerificationRecord>, StoreError> {
        let matching = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        Ok(sort_and_page(matching, sort, pagination))
    }

    fn count(&self, filter: &VerificationFilter) -> Result<u64, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| filter.matches(r))
            .count() as u64)
    }
}

/// Counts down injected write failures. `u32::MAX` fails forever.
#[derive(Default)]
struct FaultInjector {
    failing: AtomicU32,
    injected: AtomicU32,
}

impl FaultInjector {
    fn arm(&self, n: u32) {
        self.failing.store(n, Ordering::SeqCst);
    }

    fn injected(&self) -> u32 {
        self.injected.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        let taken = self
            .failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                u32::MAX => Some(u32::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if taken {
            self.injected.fetch_add(1, Ordering::SeqCst);
        }
        taken
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.should_fail() {
            return Err(StoreError::Backend("injected write failure".into()));
        }
        Ok(())
    }
}

/// Wraps a verification store and makes `update` fail with a transient
/// backend error on demand.
pub struct FlakyVerificationStore {
    inner: Arc<dyn VerificationStore + Send + Sync>,
    faults: FaultInjector,
}

impl FlakyVerificationStore {
    pub fn new(inner: Arc<dyn VerificationStore + Send + Sync>) -> Self {
        Self {
            inner,
            faults: FaultInjector::default(),
        }
    }

    /// Fail the next `n` updates.
    pub fn fail_next_updates(&self, n: u32) {
        self.faults.arm(n);
    }

    /// Fail every update until [`FlakyVerificationStore::heal`] is called.
    pub fn fail_all_updates(&self) {
        self.faults.arm(u32::MAX);
    }

    pub fn heal(&self) {
        self.faults.arm(0);
    }

    /// Number of failures injected so far.
    pub fn injected_failures(&self) -> u32 {
        self.faults.injected()
    }
}

impl VerificationStore for FlakyVerificationStore {
    fn create(&self, record: &VerificationRecord) -> Result<(), StoreError> {
        self.inner.create(record)
    }

    fn get_by_id(&self, id: &VerificationId) -> Result<VerificationRecord, StoreError> {
        self.inner.get_by_id(id)
    }

    fn update(
        &self,
        id: &VerificationId,
        patch: &VerificationPatch,
    ) -> Result<VerificationRecord, StoreError> {
        self.faults.check()?;
        self.inner.update(id, patch)
    }

    fn find(
        &self,
        filter: &VerificationFilter,
        pagination: Pagination,
        sort: SortOrder,
    ) -> Result<Vec<VerificationRecord>, StoreError> {
        self.inner.find(filter, pagination, sort)
    }

    fn count(&self, filter: &VerificationFilter) -> Result<u64, StoreError> {
        self.inner.count(filter)
    }
}

/// Wraps a document store and makes `update` fail with a transient backend
/// error on demand.
pub struct FlakyDocumentStore {
    inner: Arc<dyn DocumentStore + Send + Sync>,
    faults: FaultInjector,
}

impl FlakyDocumentStore {
    pub fn new(inner: Arc<dyn DocumentStore + Send + Sync>) -> Self {
        Self {
            inner,
            faults: FaultInjector::default(),
        }
    }

    /// Fail the next `n` updates.
    pub fn fail_next_updates(&self, n: u32) {
        self.faults.arm(n);
    }

    /// Fail every update until [`FlakyDocumentStore::heal`] is called.
    pub fn fail_all_updates(&self) {
        self.faults.arm(u32::MAX);
    }

    pub fn heal(&self) {
        self.faults.arm(0);
    }

    pub fn injected_failures(&self) -> u32 {
        self.faults.injected()
    }
}

impl DocumentStore for FlakyDocumentStore {
    fn create(&self, doc: &Document) -> Result<(), StoreError> {
        self.inner.create(doc)
    }

    fn get_by_id(&self, id: &DocumentId) -> Result<Document, StoreError> {
        self.inner.get_by_id(id)
    }

    fn update(&self, id: &DocumentId, patch: &DocumentPatch) -> Result<Document, StoreError> {
        self.faults.check()?;
        self.inner.update(id, patch)
    }

    fn find(
        &self,
        filter: &DocumentFilter,
        pagination: Pagination,
        sort: SortOrder,
    ) -> Result<Vec<Document>, StoreError> {
        self.inner.find(filter, pagination, sort)
    }

    fn count(&self, filter: &DocumentFilter) -> Result<u64, StoreError> {
        self.inner.count(filter)
    }
}

/// An in-memory meta store for testing migrations.
#[derive(Default)]
pub struct NullMetaStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
    schema_version: Mutex<u32>,
}

impl NullMetaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetaStore for NullMetaStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.values
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("meta key '{key}'")))
    }

    fn get_schema_version(&self) -> Result<u32, StoreError> {
        Ok(*self.schema_version.lock().unwrap())
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        *self.schema_version.lock().unwrap() = version;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample_document;
    use docverify_types::{UserId, VerificationStatus};

    fn record() -> VerificationRecord {
        VerificationRecord::new(
            DocumentId::new([7; 16]),
            UserId::new("company-1").unwrap(),
            Timestamp::from_millis(5),
        )
    }

    #[test]
    fn document_roundtrip_and_duplicate() {
        let store = NullDocumentStore::new();
        let doc = sample_document("uni-1");
        store.create(&doc).unwrap();
        assert_eq!(store.get_by_id(&doc.id).unwrap(), doc);
        assert!(matches!(store.create(&doc), Err(StoreError::Duplicate(_))));
        assert_eq!(store.count(&DocumentFilter::default()).unwrap(), 1);
    }

    #[test]
    fn rejected_patch_leaves_record_untouched() {
        let store = NullVerificationStore::new();
        let r = record();
        store.create(&r).unwrap();
        let failed = store
            .update(&r.id, &VerificationPatch::status(VerificationStatus::Failed))
            .unwrap();
        let err = store
            .update(&r.id, &VerificationPatch::status(VerificationStatus::Completed))
            .unwrap_err();
        assert!(matches!(err, StoreError::Immutable(_)));
        assert_eq!(store.get_by_id(&r.id).unwrap(), failed);
        assert_eq!(store.history(&r.id).len(), 2);
    }

    #[test]
    fn removed_record_is_not_found() {
        let store = NullVerificationStore::new();
        let r = record();
        store.create(&r).unwrap();
        store.remove(&r.id);
        assert!(matches!(
            store.update(&r.id, &VerificationPatch::default()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn flaky_store_fails_exactly_n_updates() {
        let inner = Arc::new(NullVerificationStore::new());
        let flaky = FlakyVerificationStore::new(inner.clone());
        let r = record();
        flaky.create(&r).unwrap();
        flaky.fail_next_updates(2);
        for _ in 0..2 {
            let err = flaky.update(&r.id, &VerificationPatch::default()).unwrap_err();
            assert!(err.is_retryable());
        }
        flaky.update(&r.id, &VerificationPatch::default()).unwrap();
        assert_eq!(flaky.injected_failures(), 2);
    }

    #[test]
    fn flaky_store_fails_until_healed() {
        let flaky = FlakyVerificationStore::new(Arc::new(NullVerificationStore::new()));
        let r = record();
        flaky.create(&r).unwrap();
        flaky.fail_all_updates();
        for _ in 0..10 {
            assert!(flaky.update(&r.id, &VerificationPatch::default()).is_err());
        }
        flaky.heal();
        assert!(flaky.update(&r.id, &VerificationPatch::default()).is_ok());
    }

    #[test]
    fn flaky_document_store_only_breaks_writes() {
        let flaky = FlakyDocumentStore::new(Arc::new(NullDocumentStore::new()));
        let doc = sample_document("uni-1");
        flaky.create(&doc).unwrap();
        flaky.fail_next_updates(1);
        let err = flaky.update(&doc.id, &DocumentPatch::default()).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(flaky.get_by_id(&doc.id).unwrap(), doc);
        flaky.update(&doc.id, &DocumentPatch::default()).unwrap();
        assert_eq!(flaky.injected_failures(), 1);
    }

    #[test]
    fn meta_store_defaults_to_version_zero() {
        let meta = NullMetaStore::new();
        assert_eq!(meta.get_schema_version().unwrap(), 0);
        meta.set_schema_version(3).unwrap();
        assert_eq!(meta.get_schema_version().unwrap(), 3);
        assert!(meta.get_meta("nope").is_err());
    }
}
