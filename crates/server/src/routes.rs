//! Decision API.
//!
//! - `POST /api/purchases/{id}/decisions/{role}` — record an approve/reject
//!   decision while acting as `role`
//! - `GET  /api/purchases/{id}/history`          — full status trail
//!
//! Caller identity arrives in trusted `x-user-id`, `x-user-name` and
//! `x-user-role` headers set by the gateway in front of this service.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use reqflow_core::domain::status::{DecisionStatus, RejectCategory, StatusEntry};
use reqflow_core::errors::WorkflowError;
use reqflow_core::resubmission::ResubmissionEvidence;
use reqflow_core::roles::{Actor, Role};
use reqflow_workflow::{DecisionCommand, DecisionProcessor};

#[derive(Clone)]
pub struct ApiState {
    processor: Arc<DecisionProcessor>,
}

pub fn router(processor: Arc<DecisionProcessor>) -> Router {
    Router::new()
        .route("/api/purchases/{id}/decisions/{role}", post(submit_decision))
        .route("/api/purchases/{id}/history", get(purchase_history))
        .with_state(ApiState { processor })
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub status: DecisionStatus,
    pub rejection_reason: Option<String>,
    #[serde(rename = "rejection_type")]
    pub reject_category: Option<RejectCategory>,
    pub comments: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub success: bool,
    pub message: String,
    pub purchase_id: String,
    pub entry_id: String,
    pub sender: Role,
    pub receiver: Role,
    pub status: DecisionStatus,
    pub decision_date: String,
    pub decision_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resubmission: Option<ResubmissionEvidence>,
    pub email_warning: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub purchase_id: String,
    pub project_ref: String,
    pub requester_name: String,
    pub requester_role: Role,
    pub entries: Vec<StatusEntry>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub enum ApiError {
    MissingIdentity(&'static str),
    BadRequest(String),
    Workflow(WorkflowError),
}

impl From<WorkflowError> for ApiError {
    fn from(error: WorkflowError) -> Self {
        Self::Workflow(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingIdentity(header) => {
                (StatusCode::UNAUTHORIZED, format!("missing identity header `{header}`"))
            }
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Workflow(error) => {
                let status = match &error {
                    WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
                    WorkflowError::Authorization { .. } => StatusCode::FORBIDDEN,
                    WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
                    WorkflowError::Conflict { .. } => StatusCode::CONFLICT,
                    WorkflowError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, error.to_string())
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let header_text = |name: &'static str| -> Result<String, ApiError> {
        let value = headers.get(name).ok_or(ApiError::MissingIdentity(name))?;
        let text = value
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("header `{name}` is not valid text")))?;
        if text.trim().is_empty() {
            return Err(ApiError::MissingIdentity(name));
        }
        Ok(text.to_string())
    };

    let user_id = header_text("x-user-id")?;
    let display_name = header_text("x-user-name")?;
    let raw_role = header_text("x-user-role")?;
    let role: Role = raw_role
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("unknown role `{raw_role}` in x-user-role")))?;

    Ok(Actor { user_id, display_name, role })
}

async fn submit_decision(
    State(state): State<ApiState>,
    Path((purchase_id, raw_role)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let expected_role: Role = raw_role
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("unknown decision role `{raw_role}`")))?;
    let actor = actor_from_headers(&headers)?;
    let correlation_id = Uuid::new_v4().to_string();

    tracing::info!(
        event_name = "api.decision_received",
        correlation_id = %correlation_id,
        purchase_id = %purchase_id,
        decision_role = expected_role.as_str(),
        actor = %actor.user_id,
        "decision request received"
    );

    let command = DecisionCommand {
        purchase_id,
        status: request.status,
        rejection_reason: request.rejection_reason,
        reject_category: request.reject_category,
        comments: request.comments,
    };

    let outcome = state.processor.decide(expected_role, &actor, command, &correlation_id).await?;

    Ok(Json(DecisionResponse {
        success: true,
        message: outcome.message,
        purchase_id: outcome.entry.purchase_id.0.clone(),
        entry_id: outcome.entry.id.0.clone(),
        sender: outcome.entry.sender,
        receiver: outcome.entry.receiver,
        status: outcome.entry.status,
        decision_date: outcome.entry.decision_date.to_rfc3339(),
        decision_by: outcome.entry.decision_by_name.clone(),
        rejection_reason: outcome.entry.rejection_reason.clone(),
        comments: outcome.entry.comments.clone(),
        resubmission: outcome.resubmission,
        email_warning: outcome.email_warning,
    }))
}

async fn purchase_history(
    State(state): State<ApiState>,
    Path(purchase_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let (purchase, entries) = state.processor.history(&purchase_id).await?;
    Ok(Json(HistoryResponse {
        purchase_id: purchase.id.0,
        project_ref: purchase.project_ref,
        requester_name: purchase.requester_name,
        requester_role: purchase.requester_role,
        entries,
    }))
}
