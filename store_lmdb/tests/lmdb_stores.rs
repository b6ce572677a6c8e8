use std::collections::BTreeMap;

use docverify_store::{
    Document, DocumentFilter, DocumentMetadata, DocumentPatch, DocumentStore, MetaStore,
    NewDocument, Pagination, SortOrder, StoreError, VerificationFilter, VerificationPatch,
    VerificationRecord, VerificationResults, VerificationStore,
};
use docverify_store_lmdb::{LmdbEnvironment, Migrator, CURRENT_SCHEMA_VERSION};
use docverify_types::{DocumentStatus, StepStatus, Timestamp, UserId, VerificationStatus};
use proptest::prelude::*;

fn open_env() -> (tempfile::TempDir, LmdbEnvironment) {
    let dir = tempfile::tempdir().unwrap();
    let env = LmdbEnvironment::open(dir.path(), 10 * 1024 * 1024).unwrap();
    (dir, env)
}

fn user(s: &str) -> UserId {
    UserId::new(s).unwrap()
}

fn document(issuer: &str, created: u64) -> Document {
    Document::issue(
        NewDocument {
            title: "Transcript".into(),
            doc_type: "transcript".into(),
            is_governmental: false,
            file_url: "https://files.example/t.pdf".into(),
            issued_to: Some(user("student-7")),
            issue_date: None,
            metadata: DocumentMetadata {
                document_number: "T-7".into(),
                institution: "Uni".into(),
                additional_info: BTreeMap::from([("faculty".into(), "science".into())]),
            },
        },
        user(issuer),
        Timestamp::from_millis(created),
    )
}

#[test]
fn document_create_get_update() {
    let (_dir, env) = open_env();
    let store = env.document_store();
    let doc = document("uni-1", 100);
    store.create(&doc).unwrap();
    assert_eq!(store.get_by_id(&doc.id).unwrap(), doc);

    let mut results = VerificationResults::default();
    results.ocr_verification = Some(true);
    let updated = store
        .update(
            &doc.id,
            &DocumentPatch {
                status: Some(DocumentStatus::Verified),
                verification_results: Some(results),
            },
        )
        .unwrap();
    assert_eq!(updated.status, DocumentStatus::Verified);
    assert_eq!(store.get_by_id(&doc.id).unwrap(), updated);
    assert_eq!(updated.title, doc.title);
}

#[test]
fn duplicate_document_is_rejected() {
    let (_dir, env) = open_env();
    let store = env.document_store();
    let doc = document("uni-1", 100);
    store.create(&doc).unwrap();
    assert!(matches!(store.create(&doc), Err(StoreError::Duplicate(_))));
}

#[test]
fn missing_document_is_not_found() {
    let (_dir, env) = open_env();
    let store = env.document_store();
    let doc = document("uni-1", 100);
    assert!(matches!(
        store.get_by_id(&doc.id),
        Err(StoreError::NotFound(_))
    ));
    assert!(!store.exists(&doc.id).unwrap());
    assert!(matches!(
        store.update(&doc.id, &DocumentPatch::default()),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn document_find_filters_and_counts() {
    let (_dir, env) = open_env();
    let store = env.document_store();
    let a = document("uni-1", 100);
    let b = document("uni-1", 200);
    let c = document("uni-2", 300);
    for d in [&a, &b, &c] {
        store.create(d).unwrap();
    }

    let by_uni1 = DocumentFilter {
        issued_by: Some(user("uni-1")),
        ..Default::default()
    };
    let found = store
        .find(&by_uni1, Pagination::ALL, SortOrder::NewestFirst)
        .unwrap();
    assert_eq!(found, vec![b.clone(), a.clone()]);
    assert_eq!(store.count(&by_uni1).unwrap(), 2);
    assert_eq!(store.count(&DocumentFilter::default()).unwrap(), 3);

    let by_ids = DocumentFilter {
        ids: Some(vec![c.id, a.id]),
        ..Default::default()
    };
    let found = store
        .find(&by_ids, Pagination::ALL, SortOrder::OldestFirst)
        .unwrap();
    assert_eq!(found, vec![a, c]);
}

#[test]
fn verification_lifecycle_and_immutability() {
    let (_dir, env) = open_env();
    let store = env.verification_store();
    let record = VerificationRecord::new(
        document("uni-1", 1).id,
        user("company-1"),
        Timestamp::from_millis(10),
    );
    store.create(&record).unwrap();

    let mut step = record.steps[0].clone();
    step.mark_in_progress(Timestamp::from_millis(11));
    let updated = store
        .update(&record.id, &VerificationPatch::step(step))
        .unwrap();
    assert_eq!(updated.steps[0].status, StepStatus::InProgress);

    store
        .update(
            &record.id,
            &VerificationPatch::status(VerificationStatus::Failed)
                .with_completed_at(Timestamp::from_millis(12)),
        )
        .unwrap();
    let err = store
        .update(
            &record.id,
            &VerificationPatch::status(VerificationStatus::Completed),
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Immutable(_)));

    let first = store.get_by_id(&record.id).unwrap();
    let second = store.get_by_id(&record.id).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.status, VerificationStatus::Failed);
}

#[test]
fn verification_find_by_requester_uses_index() {
    let (_dir, env) = open_env();
    let store = env.verification_store();
    let doc = document("uni-1", 1).id;
    let mine: Vec<VerificationRecord> = (0..3)
        .map(|i| VerificationRecord::new(doc, user("company-1"), Timestamp::from_millis(10 + i)))
        .collect();
    // A requester whose id is a prefix of another must not see its records.
    let other = VerificationRecord::new(doc, user("company-10"), Timestamp::from_millis(50));
    for r in mine.iter().chain(std::iter::once(&other)) {
        store.create(r).unwrap();
    }

    let filter = VerificationFilter::requested_by(user("company-1"));
    let found = store
        .find(&filter, Pagination::ALL, SortOrder::OldestFirst)
        .unwrap();
    assert_eq!(found, mine);
    assert_eq!(store.count(&filter).unwrap(), 3);

    let page = store
        .find(&filter, Pagination::new(2, 2), SortOrder::NewestFirst)
        .unwrap();
    assert_eq!(page, vec![mine[0].clone()]);

    let in_progress = VerificationFilter::default().with_status(VerificationStatus::InProgress);
    assert_eq!(store.count(&in_progress).unwrap(), 4);
}

#[test]
fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let record = VerificationRecord::new(
        document("uni-1", 1).id,
        user("company-1"),
        Timestamp::from_millis(10),
    );
    {
        let env = LmdbEnvironment::open(dir.path(), 10 * 1024 * 1024).unwrap();
        env.verification_store().create(&record).unwrap();
        env.force_sync().unwrap();
    }
    let env = LmdbEnvironment::open(dir.path(), 10 * 1024 * 1024).unwrap();
    assert_eq!(env.verification_store().get_by_id(&record.id).unwrap(), record);
}

#[test]
fn migrator_stamps_fresh_database() {
    let (_dir, env) = open_env();
    let meta = env.meta_store();
    assert_eq!(meta.get_schema_version().unwrap(), 0);
    Migrator::run(&meta).unwrap();
    assert_eq!(meta.get_schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
    // Second run is a no-op.
    Migrator::run(&meta).unwrap();
}

#[test]
fn migrator_refuses_newer_schema() {
    let (_dir, env) = open_env();
    let meta = env.meta_store();
    meta.set_schema_version(CURRENT_SCHEMA_VERSION + 1).unwrap();
    assert!(Migrator::run(&meta).is_err());
}

#[test]
fn meta_values_roundtrip() {
    let (_dir, env) = open_env();
    let meta = env.meta_store();
    meta.put_meta("node_id", b"abc").unwrap();
    assert_eq!(meta.get_meta("node_id").unwrap(), b"abc".to_vec());
    assert!(matches!(
        meta.get_meta("missing"),
        Err(StoreError::NotFound(_))
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn paging_covers_every_record_once(n in 1usize..20, limit in 1u32..6) {
        let (_dir, env) = open_env();
        let store = env.verification_store();
        let doc = document("uni-1", 1).id;
        let mut ids = Vec::new();
        for i in 0..n {
            let r = VerificationRecord::new(doc, user("company-1"), Timestamp::from_millis(i as u64 % 4));
            store.create(&r).unwrap();
            ids.push(r.id);
        }
        let filter = VerificationFilter::requested_by(user("company-1"));
        let pages = Pagination::new(1, limit).page_count(n as u64) as u32;
        let mut seen = Vec::new();
        for page in 1..=pages {
            let chunk = store
                .find(&filter, Pagination::new(page, limit), SortOrder::NewestFirst)
                .unwrap();
            prop_assert!(chunk.len() <= limit as usize);
            seen.extend(chunk.into_iter().map(|r| r.id));
        }
        seen.sort();
        ids.sort();
        prop_assert_eq!(seen, ids);
    }
}
