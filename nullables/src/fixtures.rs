//! Canned records for tests.

use std::collections::BTreeMap;

use docverify_store::{Document, DocumentMetadata, NewDocument};
use docverify_types::{Timestamp, UserId};

/// Upload payload for a plain university degree.
pub fn sample_new_document() -> NewDocument {
    NewDocument {
        title: "Bachelor of Science".into(),
        doc_type: "degree".into(),
        is_governmental: false,
        file_url: "https://files.example/degree.pdf".into(),
        issued_to: UserId::new("student-1").ok(),
        issue_date: None,
        metadata: DocumentMetadata {
            document_number: "BSC-0001".into(),
            institution: "Example University".into(),
            additional_info: BTreeMap::new(),
        },
    }
}

/// A `pending` document issued by `issuer`.
///
/// # Panics
/// If `issuer` is not a valid user id.
pub fn sample_document(issuer: &str) -> Document {
    let issuer = UserId::new(issuer).expect("valid issuer id");
    Document::issue(sample_new_document(), issuer, Timestamp::now())
}
