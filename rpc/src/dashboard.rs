//! Read-only dashboard views over the two stores.
//!
//! Every view is scoped by the requester: universities see what they issued,
//! students what was issued to them, companies what they asked to verify, and
//! government sees everything.

use docverify_store::{
    Document, DocumentFilter, DocumentStore, Pagination, SortOrder, StoreError,
    VerificationFilter, VerificationRecord, VerificationStore,
};
use docverify_types::{DocumentId, DocumentStatus, RequesterIdentity, RequesterType, VerificationStatus};
use serde::Serialize;

use crate::pagination::PaginationMeta;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_documents: u64,
    pub pending_verifications: u64,
    pub completed_verifications: u64,
    pub failed_verifications: u64,
    pub cancelled_verifications: u64,
}

/// A verification together with the document it covers.
#[derive(Clone, Debug, Serialize)]
pub struct HistoryEntry {
    pub verification: VerificationRecord,
    /// `None` if the document could not be found.
    pub document: Option<Document>,
}

#[derive(Clone, Debug, Serialize)]
pub struct HistoryPage {
    pub verifications: Vec<HistoryEntry>,
    pub pagination: PaginationMeta,
}

#[derive(Clone, Debug, Serialize)]
pub struct PendingPage {
    pub documents: Vec<Document>,
    pub pagination: PaginationMeta,
}

/// Verifications visible to `who`.
fn verification_scope(who: &RequesterIdentity) -> VerificationFilter {
    if who.kind.sees_everything() {
        VerificationFilter::default()
    } else {
        VerificationFilter::requested_by(who.id.clone())
    }
}

pub fn stats(
    documents: &dyn DocumentStore,
    verifications: &dyn VerificationStore,
    who: &RequesterIdentity,
) -> Result<DashboardStats, StoreError> {
    let total_documents = match who.kind {
        RequesterType::University => documents.count(&DocumentFilter {
            issued_by: Some(who.id.clone()),
            ..Default::default()
        })?,
        RequesterType::Student => documents.count(&DocumentFilter {
            issued_to: Some(who.id.clone()),
            ..Default::default()
        })?,
        // Companies count the documents they have asked to verify.
        RequesterType::Company => verifications.count(&verification_scope(who))?,
        RequesterType::Government => documents.count(&DocumentFilter::default())?,
    };

    let scope = verification_scope(who);
    let by_status =
        |status: VerificationStatus| verifications.count(&scope.clone().with_status(status));

    Ok(DashboardStats {
        total_documents,
        pending_verifications: by_status(VerificationStatus::InProgress)?,
        completed_verifications: by_status(VerificationStatus::Completed)?,
        failed_verifications: by_status(VerificationStatus::Failed)?,
        cancelled_verifications: by_status(VerificationStatus::Cancelled)?,
    })
}

/// The requester's verifications, newest first.
pub fn history(
    documents: &dyn DocumentStore,
    verifications: &dyn VerificationStore,
    who: &RequesterIdentity,
    page: Pagination,
) -> Result<HistoryPage, StoreError> {
    let scope = verification_scope(who);
    let records = verifications.find(&scope, page, SortOrder::NewestFirst)?;
    let total = verifications.count(&scope)?;

    let mut entries = Vec::with_capacity(records.len());
    for verification in records {
        let document = match documents.get_by_id(&verification.document) {
            Ok(doc) => Some(doc),
            Err(StoreError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        entries.push(HistoryEntry {
            verification,
            document,
        });
    }

    Ok(HistoryPage {
        verifications: entries,
        pagination: PaginationMeta::new(page, total),
    })
}

/// Documents still `pending` that concern the requester, newest first.
pub fn pending(
    documents: &dyn DocumentStore,
    verifications: &dyn VerificationStore,
    who: &RequesterIdentity,
    page: Pagination,
) -> Result<PendingPage, StoreError> {
    let mut filter = DocumentFilter {
        status: Some(DocumentStatus::Pending),
        ..Default::default()
    };
    match who.kind {
        RequesterType::University => filter.issued_by = Some(who.id.clone()),
        RequesterType::Student => filter.issued_to = Some(who.id.clone()),
        RequesterType::Company => {
            let running = verifications.find(
                &verification_scope(who).with_status(VerificationStatus::InProgress),
                Pagination::ALL,
                SortOrder::OldestFirst,
            )?;
            let mut ids: Vec<DocumentId> = running.into_iter().map(|r| r.document).collect();
            ids.sort();
            ids.dedup();
            filter.ids = Some(ids);
        }
        RequesterType::Government => {}
    }

    let docs = documents.find(&filter, page, SortOrder::NewestFirst)?;
    let total = documents.count(&filter)?;
    Ok(PendingPage {
        documents: docs,
        pagination: PaginationMeta::new(page, total),
    })
}
