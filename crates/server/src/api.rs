//! JSON API for comparisons, approvals and KPIs.
//!
//! - `POST /api/v1/comparisons`: compare quotes against a BOQ
//! - `GET  /api/v1/comparisons/{id}`: fetch a stored comparison
//! - `POST /api/v1/approvals`: record an approval decision
//! - `GET  /api/v1/kpis`: throughput and savings figures
//! - `GET  /api/v1/workflows/{execution_id}`: orchestration execution status

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use procurely_core::domain::approval::ApprovalSubmission;
use procurely_core::domain::boq::Boq;
use procurely_core::domain::comparison::{Comparison, ComparisonId};
use procurely_core::domain::quote::Quote;
use procurely_core::errors::{ApplicationError, InterfaceError};
use procurely_core::KpiSnapshot;

use crate::integrations::FlowExecution;
use crate::service::{ApprovalOutcome, ComparisonOutcome, ProcurementService};

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    service: Arc<ProcurementService>,
}

impl ApiState {
    pub fn new(service: Arc<ProcurementService>) -> Self {
        Self { service }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComparisonRequest {
    pub boq_data: Boq,
    pub quotes: Vec<Quote>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self { success: true, data, message: None })
    }

    fn with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self { success: true, data, message: Some(message.into()) })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorDetail {
    pub message: String,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: ApiErrorDetail,
}

/// Error half of every handler; renders the failure envelope.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn bad_request(message: impl Into<String>, correlation_id: &str) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // details are safe to echo for client errors only
        let message = match self.0 {
            InterfaceError::BadRequest { .. } | InterfaceError::NotFound { .. } => {
                self.0.message().to_string()
            }
            _ => self.0.user_message().to_string(),
        };
        let body = ApiErrorBody {
            success: false,
            error: ApiErrorDetail { message, correlation_id: self.0.correlation_id().to_string() },
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(service: Arc<ProcurementService>) -> Router {
    Router::new()
        .route("/api/v1/comparisons", post(create_comparison))
        .route("/api/v1/comparisons/{id}", get(get_comparison))
        .route("/api/v1/approvals", post(submit_approval))
        .route("/api/v1/kpis", get(get_kpis))
        .route("/api/v1/workflows/{execution_id}", get(get_workflow_status))
        .with_state(ApiState::new(service))
}

pub async fn create_comparison(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<CreateComparisonRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ComparisonOutcome>>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let Json(request) = payload.map_err(|rejection| reject(rejection, &correlation_id))?;

    let outcome = state
        .service
        .compare(request.boq_data, request.quotes, &correlation_id)
        .await
        .map_err(|error| fail(error, &correlation_id))?;

    Ok(ApiResponse::with_message(outcome, "Comparison created successfully"))
}

pub async fn get_comparison(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Comparison>>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let comparison = state
        .service
        .comparison(&ComparisonId(id))
        .await
        .map_err(|error| fail(error, &correlation_id))?;

    Ok(ApiResponse::ok(comparison))
}

pub async fn submit_approval(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<ApprovalSubmission>, JsonRejection>,
) -> Result<Json<ApiResponse<ApprovalOutcome>>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let Json(submission) = payload.map_err(|rejection| reject(rejection, &correlation_id))?;
    if submission.comparison_id.0.trim().is_empty() {
        return Err(ApiError::bad_request("comparisonId is required", &correlation_id));
    }

    let outcome = state
        .service
        .submit_approval(submission, &correlation_id)
        .await
        .map_err(|error| fail(error, &correlation_id))?;

    let message = format!("Approval {} successfully", outcome.record.decision.as_str().to_lowercase());
    Ok(ApiResponse::with_message(outcome, message))
}

pub async fn get_kpis(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<KpiSnapshot>>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let snapshot = state.service.kpis().await.map_err(|error| fail(error, &correlation_id))?;

    Ok(ApiResponse::ok(snapshot))
}

pub async fn get_workflow_status(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(execution_id): Path<String>,
) -> Result<Json<ApiResponse<FlowExecution>>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let execution = state
        .service
        .workflow_status(&execution_id)
        .await
        .map_err(|error| fail(error, &correlation_id))?;

    Ok(ApiResponse::ok(execution))
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4()))
}

fn reject(rejection: JsonRejection, correlation_id: &str) -> ApiError {
    info!(
        event_name = "api.request.rejected",
        correlation_id = %correlation_id,
        status = %rejection.status(),
        reason = %rejection.body_text(),
        "request body rejected"
    );
    ApiError::bad_request(format!("Invalid request: {}", rejection.body_text()), correlation_id)
}

fn fail(error: ApplicationError, correlation_id: &str) -> ApiError {
    warn!(
        event_name = "api.request.failed",
        correlation_id = %correlation_id,
        error = %error,
        "request failed"
    );
    ApiError(error.into_interface(correlation_id))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        extract::{Path, State},
        http::{HeaderMap, HeaderValue, Request, StatusCode},
        response::IntoResponse,
        Json,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use procurely_core::audit::InMemoryAuditSink;
    use procurely_core::config::CollaboratorMode;
    use procurely_core::domain::approval::{ApprovalDecision, ApprovalSubmission};
    use procurely_core::DefaultComparisonEngine;
    use procurely_db::{InMemoryApprovalRepository, InMemoryComparisonRepository};

    use super::{
        create_comparison, get_comparison, get_kpis, router, submit_approval, ApiState,
        CreateComparisonRequest, CORRELATION_HEADER,
    };
    use crate::service::ProcurementService;

    fn service() -> Arc<ProcurementService> {
        Arc::new(ProcurementService::new(
            Arc::new(DefaultComparisonEngine::default()),
            Arc::new(InMemoryComparisonRepository::default()),
            Arc::new(InMemoryApprovalRepository::default()),
            CollaboratorMode::Degraded,
            Arc::new(InMemoryAuditSink::default()),
        ))
    }

    fn request_body(total_boq: i64) -> Value {
        json!({
            "boqData": {
                "id": "boq-api",
                "items": [
                    { "lineNo": 1, "sku": "CBL-001", "qty": 100, "estimatedPrice": 50, "totalEstimate": 5000 }
                ],
                "totalBOQ": total_boq
            },
            "quotes": [
                {
                    "vendorId": "vendor-acme",
                    "vendorName": "Acme",
                    "items": [{ "sku": "CBL-001", "unitPrice": 49, "qty": 100, "lineTotal": 4900 }],
                    "totalCost": 4900
                }
            ]
        })
    }

    fn headers(correlation_id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CORRELATION_HEADER, HeaderValue::from_str(correlation_id).expect("header"));
        headers
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn create_then_fetch_comparison() {
        let state = ApiState::new(service());
        let request: CreateComparisonRequest =
            serde_json::from_value(request_body(5_000)).expect("request");

        let Json(created) =
            create_comparison(State(state.clone()), headers("req-api-1"), Ok(Json(request)))
                .await
                .expect("created");
        assert!(created.success);
        assert_eq!(created.message.as_deref(), Some("Comparison created successfully"));

        let id = created.data.comparison.id.0.clone();
        let Json(fetched) = get_comparison(State(state), headers("req-api-2"), Path(id.clone()))
            .await
            .expect("fetched");
        assert_eq!(fetched.data.id.0, id);
        assert_eq!(fetched.data.best_vendor, "Acme");
    }

    #[tokio::test]
    async fn unknown_comparison_renders_not_found_envelope() {
        let state = ApiState::new(service());

        let error = get_comparison(State(state), headers("req-404"), Path("comp-nope".to_string()))
            .await
            .expect_err("missing");
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["correlationId"], "req-404");
    }

    #[tokio::test]
    async fn zero_boq_total_is_a_bad_request() {
        let state = ApiState::new(service());
        let request: CreateComparisonRequest =
            serde_json::from_value(request_body(0)).expect("request");

        let error = create_comparison(State(state), headers("req-zero"), Ok(Json(request)))
            .await
            .expect_err("zero total");
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"]["message"].as_str().unwrap_or_default().contains("greater than zero"));
    }

    #[tokio::test]
    async fn approval_and_kpis_reflect_decision() {
        let service = service();
        let state = ApiState::new(service.clone());
        let request: CreateComparisonRequest =
            serde_json::from_value(request_body(5_000)).expect("request");
        let Json(created) =
            create_comparison(State(state.clone()), headers("req-a"), Ok(Json(request)))
                .await
                .expect("created");

        let submission = ApprovalSubmission {
            comparison_id: created.data.comparison.id.clone(),
            decision: ApprovalDecision::Rejected,
            approver_role: Some("manager".to_string()),
            approver_email: None,
            comment: Some("prefer local supplier".to_string()),
        };
        let Json(approval) =
            submit_approval(State(state.clone()), headers("req-b"), Ok(Json(submission)))
                .await
                .expect("approval");
        assert_eq!(approval.message.as_deref(), Some("Approval rejected successfully"));

        let Json(kpis) = get_kpis(State(state), headers("req-c")).await.expect("kpis");
        assert_eq!(kpis.data.total_processed, 1);
        assert_eq!(kpis.data.rejected_count, 1);
    }

    #[tokio::test]
    async fn router_wraps_malformed_json_in_error_envelope() {
        let app = router(service());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/comparisons")
                    .header("content-type", "application/json")
                    .header(CORRELATION_HEADER, "req-bad-json")
                    .body(Body::from(r#"{"boqData": {"id": "boq-1"}}"#))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["correlationId"], "req-bad-json");
        assert!(body["error"]["message"].as_str().unwrap_or_default().starts_with("Invalid request"));
    }

    #[tokio::test]
    async fn router_serves_created_comparison_with_receipts() {
        let app = router(service());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/comparisons")
                    .header("content-type", "application/json")
                    .body(Body::from(request_body(5_000).to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "PENDING_APPROVAL");
        assert_eq!(body["data"]["bestVendor"], "Acme");
        assert_eq!(body["data"]["collaborators"][0]["status"], "SKIPPED");
    }
}
