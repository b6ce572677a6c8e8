//! End-to-end HTTP tests: requests go through the real router into an
//! orchestrator backed by nullable stores.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use docverify_nullables::{
    sample_document, sample_new_document, NullDocumentStore, NullStepExecutor,
    NullVerificationStore, ScriptedStep,
};
use docverify_rpc::server::router;
use docverify_rpc::RpcState;
use docverify_store::Document;
use docverify_types::{StepName, VerificationId};
use docverify_verification::{OrchestratorConfig, VerificationEvent, VerificationOrchestrator};
use serde_json::{json, Value};
use tower::ServiceExt;

struct Api {
    app: Router,
    orch: Arc<VerificationOrchestrator>,
    doc: Document,
}

fn api_with(exec: NullStepExecutor, metrics: Option<prometheus::Registry>) -> Api {
    let docs = Arc::new(NullDocumentStore::new());
    let doc = sample_document("uni-1");
    docs.insert(doc.clone());
    let orch = Arc::new(VerificationOrchestrator::new(
        docs,
        Arc::new(NullVerificationStore::new()),
        Arc::new(exec),
        OrchestratorConfig::default(),
    ));
    let mut state = RpcState::new(Arc::clone(&orch));
    if let Some(registry) = metrics {
        state = state.with_metrics(registry);
    }
    Api {
        app: router(Arc::new(state)),
        orch,
        doc,
    }
}

fn api() -> Api {
    api_with(NullStepExecutor::new(), None)
}

const UNIVERSITY: (&str, &str) = ("uni-1", "university");
const STUDENT: (&str, &str) = ("student-1", "student");
const COMPANY: (&str, &str) = ("company-1", "company");
const OTHER_COMPANY: (&str, &str) = ("company-2", "company");
const GOVERNMENT: (&str, &str) = ("gov-1", "government");

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    who: Option<(&str, &str)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, kind)) = who {
        builder = builder
            .header("x-requester-id", id)
            .header("x-requester-type", kind);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, value)
}

async fn wait_terminal(orch: &VerificationOrchestrator, id: VerificationId) {
    let mut rx = orch.subscribe();
    if orch.get_verification(&id).unwrap().status.is_terminal() {
        return;
    }
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await {
                Ok(ev) if ev.verification_id() == id && ev.is_terminal() => return,
                Ok(_) => continue,
                Err(e) => panic!("event stream broke: {e}"),
            }
        }
    })
    .await
    .expect("verification never finished");
}

fn new_document_json() -> Value {
    serde_json::to_value(sample_new_document()).unwrap()
}

// ── Identity ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let a = api();
    let (status, body) = call(&a.app, "POST", &format!("/verify/{}", a.doc.id), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

// ── Verification ─────────────────────────────────────────────────────────

#[tokio::test]
async fn verify_starts_a_run_and_returns_immediately() {
    let a = api();
    let (status, body) = call(
        &a.app,
        "POST",
        &format!("/verify/{}", a.doc.id),
        Some(COMPANY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Verification process started");
    let id: VerificationId = body["verificationId"].as_str().unwrap().parse().unwrap();

    wait_terminal(&a.orch, id).await;
    let (status, record) = call(
        &a.app,
        "GET",
        &format!("/verification/{id}"),
        Some(COMPANY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["status"], "completed");
    assert_eq!(record["requestedBy"], "company-1");
    let steps = record["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 5);
    assert_eq!(steps[0]["step"], "ocrVerification");
    assert!(steps.iter().all(|s| s["result"] == true));
}

#[tokio::test]
async fn verifying_unknown_document_is_not_found() {
    let a = api();
    let missing = "00000000000000000000000000000000";
    let (status, _) = call(&a.app, "POST", &format!("/verify/{missing}"), Some(COMPANY), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_id_is_a_bad_request() {
    let a = api();
    let (status, _) = call(&a.app, "GET", "/verification/not-hex", Some(COMPANY), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_verification_is_not_found() {
    let a = api();
    let missing = "ffffffffffffffffffffffffffffffff";
    let (status, _) = call(&a.app, "GET", &format!("/verification/{missing}"), Some(COMPANY), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_requester_may_cancel() {
    let a = api_with(
        NullStepExecutor::new().with_step(StepName::OcrVerification, ScriptedStep::Hang),
        None,
    );
    let id = a
        .orch
        .start_verification(a.doc.id, &docverify_types::UserId::new("company-1").unwrap())
        .await
        .unwrap();
    let uri = format!("/verification/{id}/cancel");

    let (status, _) = call(&a.app, "POST", &uri, Some(OTHER_COMPANY), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&a.app, "POST", &uri, Some(COMPANY), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "cancelled": true }));

    wait_terminal(&a.orch, id).await;
    let record = a.orch.get_verification(&id).unwrap();
    assert_eq!(record.status.as_str(), "cancelled");

    // Nothing left to cancel once the loop has deregistered.
    tokio::time::timeout(Duration::from_secs(10), async {
        while a.orch.active_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    let (_, body) = call(&a.app, "POST", &uri, Some(COMPANY), None).await;
    assert_eq!(body, json!({ "cancelled": false }));
}

// ── Documents ────────────────────────────────────────────────────────────

#[tokio::test]
async fn universities_issue_documents() {
    let a = api();
    let (status, created) =
        call(&a.app, "POST", "/documents", Some(UNIVERSITY), Some(new_document_json())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    assert_eq!(created["issuedBy"], "uni-1");

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = call(&a.app, "GET", &format!("/documents/{id}"), Some(STUDENT), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn students_cannot_issue_documents() {
    let a = api();
    let (status, _) =
        call(&a.app, "POST", "/documents", Some(STUDENT), Some(new_document_json())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn bulk_upload_creates_every_document() {
    let a = api();
    let body = json!({ "documents": [new_document_json(), new_document_json()] });
    let (status, created) = call(&a.app, "POST", "/documents/bulk", Some(GOVERNMENT), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let created = created.as_array().unwrap();
    assert_eq!(created.len(), 2);
    assert_ne!(created[0]["id"], created[1]["id"]);
    assert!(created.iter().all(|d| d["issuedBy"] == "gov-1"));
}

#[tokio::test]
async fn unknown_document_is_not_found() {
    let a = api();
    let missing = "0123456789abcdef0123456789abcdef";
    let (status, _) = call(&a.app, "GET", &format!("/documents/{missing}"), Some(STUDENT), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Dashboard ────────────────────────────────────────────────────────────

#[tokio::test]
async fn dashboard_views_are_scoped_by_requester() {
    let a = api();
    let company = docverify_types::UserId::new("company-1").unwrap();
    let first = a.orch.start_verification(a.doc.id, &company).await.unwrap();
    let second = a.orch.start_verification(a.doc.id, &company).await.unwrap();
    wait_terminal(&a.orch, first).await;
    wait_terminal(&a.orch, second).await;

    let (_, stats) = call(&a.app, "GET", "/dashboard/stats", Some(COMPANY), None).await;
    assert_eq!(stats["totalDocuments"], 2);
    assert_eq!(stats["completedVerifications"], 2);

    let (_, stats) = call(&a.app, "GET", "/dashboard/stats", Some(OTHER_COMPANY), None).await;
    assert_eq!(stats["totalDocuments"], 0);

    let (_, stats) = call(&a.app, "GET", "/dashboard/stats", Some(GOVERNMENT), None).await;
    assert_eq!(stats["totalDocuments"], 1);
    assert_eq!(stats["completedVerifications"], 2);

    let (status, history) = call(
        &a.app,
        "GET",
        "/dashboard/history?page=1&limit=1",
        Some(COMPANY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        history["pagination"],
        json!({ "total": 2, "pages": 2, "page": 1, "limit": 1 })
    );
    assert_eq!(history["verifications"].as_array().unwrap().len(), 1);
    assert_eq!(
        history["verifications"][0]["document"]["id"],
        a.doc.id.to_string()
    );

    // The document is verified now, so nothing is pending for its issuer.
    let (_, pending) = call(&a.app, "GET", "/dashboard/pending", Some(UNIVERSITY), None).await;
    assert_eq!(pending["pagination"]["total"], 0);
}

// ── Telemetry ────────────────────────────────────────────────────────────

#[tokio::test]
async fn metrics_route_serves_the_registry() {
    let registry = prometheus::Registry::new();
    let counter = prometheus::IntCounter::new("docverify_test_total", "test counter").unwrap();
    registry.register(Box::new(counter.clone())).unwrap();
    counter.inc();

    let a = api_with(NullStepExecutor::new(), Some(registry));
    let (status, body) = call(&a.app, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("docverify_test_total 1"));
}

#[tokio::test]
async fn metrics_route_is_absent_when_disabled() {
    let a = api();
    let (status, _) = call(&a.app, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
