//! Document records and the document storage trait.

use std::collections::BTreeMap;

use docverify_types::{DocumentId, DocumentStatus, StepName, Timestamp, UserId};
use serde::{Deserialize, Serialize};

use crate::query::{Pagination, SortOrder, Sortable};
use crate::verification::StepState;
use crate::StoreError;

/// Issuer-supplied metadata attached to a document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub document_number: String,
    pub institution: String,
    /// Free-form extras supplied at upload time.
    #[serde(default)]
    pub additional_info: BTreeMap<String, String>,
}

/// Per-check outcome mapping. `None` means the check has not produced a result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResults {
    pub ocr_verification: Option<bool>,
    pub database_validation: Option<bool>,
    pub keyword_scanning: Option<bool>,
    pub text_alignment_check: Option<bool>,
    pub watermark_font_check: Option<bool>,
}

impl VerificationResults {
    pub fn get(&self, step: StepName) -> Option<bool> {
        match step {
            StepName::OcrVerification => self.ocr_verification,
            StepName::DatabaseValidation => self.database_validation,
            StepName::KeywordScanning => self.keyword_scanning,
            StepName::TextAlignmentCheck => self.text_alignment_check,
            StepName::WatermarkFontCheck => self.watermark_font_check,
        }
    }

    pub fn set(&mut self, step: StepName, result: Option<bool>) {
        let slot = match step {
            StepName::OcrVerification => &mut self.ocr_verification,
            StepName::DatabaseValidation => &mut self.database_validation,
            StepName::KeywordScanning => &mut self.keyword_scanning,
            StepName::TextAlignmentCheck => &mut self.text_alignment_check,
            StepName::WatermarkFontCheck => &mut self.watermark_font_check,
        };
        *slot = result;
    }

    /// Collect the results recorded on a verification's steps.
    pub fn from_steps(steps: &[StepState]) -> Self {
        let mut results = Self::default();
        for state in steps {
            results.set(state.step, state.result);
        }
        results
    }
}

/// Upload payload handed over by the storage collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(default)]
    pub is_governmental: bool,
    pub file_url: String,
    #[serde(default)]
    pub issued_to: Option<UserId>,
    #[serde(default)]
    pub issue_date: Option<Timestamp>,
    pub metadata: DocumentMetadata,
}

/// An issued document and its verification lifecycle status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub is_governmental: bool,
    /// Where the storage collaborator put the file.
    pub file_url: String,
    pub issued_by: UserId,
    pub issued_to: Option<UserId>,
    pub issue_date: Timestamp,
    pub metadata: DocumentMetadata,
    pub status: DocumentStatus,
    pub verification_results: VerificationResults,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Document {
    /// Build a fresh `pending` document issued by `issuer`.
    pub fn issue(new: NewDocument, issuer: UserId, now: Timestamp) -> Self {
        Self {
            id: DocumentId::generate(),
            title: new.title,
            doc_type: new.doc_type,
            is_governmental: new.is_governmental,
            file_url: new.file_url,
            issued_by: issuer,
            issued_to: new.issued_to,
            issue_date: new.issue_date.unwrap_or(now),
            metadata: new.metadata,
            status: DocumentStatus::Pending,
            verification_results: VerificationResults::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Sortable for Document {
    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn sort_key(&self) -> [u8; 16] {
        *self.id.as_bytes()
    }
}

/// A partial update to a document. Unset fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentPatch {
    pub status: Option<DocumentStatus>,
    pub verification_results: Option<VerificationResults>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.verification_results.is_none()
    }

    /// Apply the patch in place and bump `updated_at`.
    pub fn apply(&self, doc: &mut Document, now: Timestamp) {
        if let Some(status) = self.status {
            doc.status = status;
        }
        if let Some(results) = self.verification_results {
            doc.verification_results = results;
        }
        doc.updated_at = now.max(doc.updated_at);
    }
}

/// Filter for [`DocumentStore::find`] / [`DocumentStore::count`].
/// Every set field must match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub issued_by: Option<UserId>,
    pub issued_to: Option<UserId>,
    /// Restrict to this id set. `Some(vec![])` matches nothing.
    pub ids: Option<Vec<DocumentId>>,
}

impl DocumentFilter {
    pub fn matches(&self, doc: &Document) -> bool {
        self.status.map_or(true, |s| doc.status == s)
            && self
                .issued_by
                .as_ref()
                .map_or(true, |u| &doc.issued_by == u)
            && self
                .issued_to
                .as_ref()
                .map_or(true, |u| doc.issued_to.as_ref() == Some(u))
            && self.ids.as_ref().map_or(true, |ids| ids.contains(&doc.id))
    }
}

/// Trait for document storage operations.
pub trait DocumentStore {
    /// Persist a new document. Fails with `Duplicate` if the id is taken.
    fn create(&self, doc: &Document) -> Result<(), StoreError>;

    /// Fetch a document. Fails with `NotFound` if absent.
    fn get_by_id(&self, id: &DocumentId) -> Result<Document, StoreError>;

    /// Read-modify-write a single document and return the updated record.
    fn update(&self, id: &DocumentId, patch: &DocumentPatch) -> Result<Document, StoreError>;

    /// Matching documents, ordered and paged.
    fn find(
        &self,
        filter: &DocumentFilter,
        pagination: Pagination,
        sort: SortOrder,
    ) -> Result<Vec<Document>, StoreError>;

    /// Number of matching documents.
    fn count(&self, filter: &DocumentFilter) -> Result<u64, StoreError>;

    fn exists(&self, id: &DocumentId) -> Result<bool, StoreError> {
        match self.get_by_id(id) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
