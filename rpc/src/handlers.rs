//! RPC request handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use docverify_store::{Document, NewDocument, VerificationRecord};
use docverify_types::{DocumentId, Timestamp, VerificationId};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};

use crate::dashboard::{self, DashboardStats, HistoryPage, PendingPage};
use crate::pagination::PageParams;
use crate::{Requester, RpcError, RpcState};

pub const VERIFICATION_STARTED: &str = "Verification process started";

// ── Verification ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartVerificationResponse {
    pub message: String,
    pub verification_id: VerificationId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

fn parse_document_id(raw: &str) -> Result<DocumentId, RpcError> {
    raw.parse()
        .map_err(|_| RpcError::InvalidRequest(format!("invalid document id: {raw}")))
}

fn parse_verification_id(raw: &str) -> Result<VerificationId, RpcError> {
    raw.parse()
        .map_err(|_| RpcError::InvalidRequest(format!("invalid verification id: {raw}")))
}

pub async fn start_verification(
    State(state): State<Arc<RpcState>>,
    requester: Requester,
    Path(document_id): Path<String>,
) -> Result<Json<StartVerificationResponse>, RpcError> {
    let document_id = parse_document_id(&document_id)?;
    let verification_id = state
        .orchestrator
        .start_verification(document_id, &requester.0.id)
        .await?;
    Ok(Json(StartVerificationResponse {
        message: VERIFICATION_STARTED.to_string(),
        verification_id,
    }))
}

pub async fn get_verification(
    State(state): State<Arc<RpcState>>,
    _requester: Requester,
    Path(id): Path<String>,
) -> Result<Json<VerificationRecord>, RpcError> {
    let id = parse_verification_id(&id)?;
    Ok(Json(state.orchestrator.get_verification(&id)?))
}

/// Only the party that requested a verification (or government) may cancel it.
pub async fn cancel_verification(
    State(state): State<Arc<RpcState>>,
    requester: Requester,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, RpcError> {
    let id = parse_verification_id(&id)?;
    let record = state.orchestrator.get_verification(&id)?;
    if record.requested_by != requester.0.id && !requester.0.kind.sees_everything() {
        return Err(RpcError::Forbidden(
            "only the requester may cancel a verification".into(),
        ));
    }
    let cancelled = state.orchestrator.cancel_verification(&id).await?;
    Ok(Json(CancelResponse { cancelled }))
}

// ── Documents ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BulkDocumentsRequest {
    pub documents: Vec<NewDocument>,
}

pub async fn create_document(
    State(state): State<Arc<RpcState>>,
    requester: Requester,
    Json(new): Json<NewDocument>,
) -> Result<(StatusCode, Json<Document>), RpcError> {
    requester.require_issuer()?;
    let doc = Document::issue(new, requester.0.id.clone(), Timestamp::now());
    state.orchestrator.documents().create(&doc)?;
    tracing::info!(document = %doc.id, issuer = %doc.issued_by, "document issued");
    Ok((StatusCode::CREATED, Json(doc)))
}

pub async fn create_documents_bulk(
    State(state): State<Arc<RpcState>>,
    requester: Requester,
    Json(req): Json<BulkDocumentsRequest>,
) -> Result<(StatusCode, Json<Vec<Document>>), RpcError> {
    requester.require_issuer()?;
    let now = Timestamp::now();
    let store = state.orchestrator.documents();
    let mut created = Vec::with_capacity(req.documents.len());
    for new in req.documents {
        let doc = Document::issue(new, requester.0.id.clone(), now);
        store.create(&doc)?;
        created.push(doc);
    }
    tracing::info!(count = created.len(), issuer = %requester.0.id, "documents issued in bulk");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_document(
    State(state): State<Arc<RpcState>>,
    _requester: Requester,
    Path(id): Path<String>,
) -> Result<Json<Document>, RpcError> {
    let id = parse_document_id(&id)?;
    let doc = state
        .orchestrator
        .documents()
        .get_by_id(&id)
        .map_err(|e| match e {
            docverify_store::StoreError::NotFound(_) => RpcError::NotFound(format!("document {id}")),
            other => other.into(),
        })?;
    Ok(Json(doc))
}

// ── Dashboard ────────────────────────────────────────────────────────────

pub async fn dashboard_stats(
    State(state): State<Arc<RpcState>>,
    requester: Requester,
) -> Result<Json<DashboardStats>, RpcError> {
    let orch = &state.orchestrator;
    let stats = dashboard::stats(
        orch.documents().as_ref(),
        orch.verifications().as_ref(),
        &requester.0,
    )?;
    Ok(Json(stats))
}

pub async fn dashboard_history(
    State(state): State<Arc<RpcState>>,
    requester: Requester,
    Query(params): Query<PageParams>,
) -> Result<Json<HistoryPage>, RpcError> {
    let orch = &state.orchestrator;
    let page = dashboard::history(
        orch.documents().as_ref(),
        orch.verifications().as_ref(),
        &requester.0,
        params.resolve(),
    )?;
    Ok(Json(page))
}

pub async fn dashboard_pending(
    State(state): State<Arc<RpcState>>,
    requester: Requester,
    Query(params): Query<PageParams>,
) -> Result<Json<PendingPage>, RpcError> {
    let orch = &state.orchestrator;
    let page = dashboard::pending(
        orch.documents().as_ref(),
        orch.verifications().as_ref(),
        &requester.0,
        params.resolve(),
    )?;
    Ok(Json(page))
}

// ── Telemetry ────────────────────────────────────────────────────────────

/// Prometheus text exposition of the node registry.
pub async fn metrics(State(state): State<Arc<RpcState>>) -> Result<impl IntoResponse, RpcError> {
    let registry = state
        .metrics
        .as_ref()
        .ok_or_else(|| RpcError::NotFound("metrics".into()))?;
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buf)
        .map_err(|e| RpcError::Server(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buf,
    ))
}
