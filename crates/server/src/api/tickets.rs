//! Ticket API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ticketd_core::{CreateTicketRequest, Ticket, TicketError, TicketStatus, WorkflowError};

use crate::state::AppState;

/// Maximum allowed limit for ticket queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for ticket queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a ticket
#[derive(Debug, Deserialize)]
pub struct CreateTicketBody {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub requester: String,
    pub assignee: Option<String>,
}

/// Query parameters for listing tickets
#[derive(Debug, Deserialize)]
pub struct ListTicketsParams {
    /// Maximum number of tickets to return
    pub limit: Option<i64>,
}

/// Request body for recording a decision
#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub approved: bool,
    pub comment: Option<String>,
}

/// Response for ticket operations
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub requester: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub status: TicketStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_instance_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Ticket> for TicketResponse {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id,
            title: ticket.title,
            description: ticket.description,
            requester: ticket.requester,
            assignee: ticket.assignee,
            status: ticket.status,
            process_instance_id: ticket.process_instance_id,
            created_at: ticket.created_at.to_rfc3339(),
            updated_at: ticket.updated_at.to_rfc3339(),
        }
    }
}

/// Response for listing tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<TicketResponse>,
    pub limit: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct TicketErrorResponse {
    pub error: String,
}

/// Map a workflow error onto an HTTP status and error body.
fn error_response(e: WorkflowError) -> (StatusCode, Json<TicketErrorResponse>) {
    let status = match &e {
        WorkflowError::Ticket(TicketError::NotFound(_)) => StatusCode::NOT_FOUND,
        WorkflowError::Ticket(TicketError::InvalidTransition { .. }) => StatusCode::CONFLICT,
        WorkflowError::Ticket(TicketError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        WorkflowError::Engine(_) => StatusCode::BAD_GATEWAY,
        WorkflowError::MalformedTask(_) | WorkflowError::UnsupportedActivity(_) => {
            StatusCode::BAD_REQUEST
        }
    };

    (status, Json(TicketErrorResponse { error: e.to_string() }))
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new ticket
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTicketBody>,
) -> Result<(StatusCode, Json<TicketResponse>), impl IntoResponse> {
    if body.title.trim().is_empty() || body.requester.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(TicketErrorResponse {
                error: "title and requester are required".to_string(),
            }),
        ));
    }

    let request = CreateTicketRequest {
        title: body.title,
        description: body.description,
        requester: body.requester,
        assignee: body.assignee,
    };

    match state.coordinator().create_ticket(request).await {
        Ok(ticket) => Ok((StatusCode::CREATED, Json(TicketResponse::from(ticket)))),
        Err(e) => Err(error_response(e)),
    }
}

/// Get a ticket by ID
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TicketResponse>, impl IntoResponse> {
    match state.ticket_store().get(&id) {
        Ok(Some(ticket)) => Ok(Json(TicketResponse::from(ticket))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(TicketErrorResponse {
                error: format!("Ticket not found: {}", id),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(TicketErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}

/// List tickets, most recently created first
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTicketsParams>,
) -> Result<Json<ListTicketsResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    match state.ticket_store().list(limit) {
        Ok(tickets) => Ok(Json(ListTicketsResponse {
            tickets: tickets.into_iter().map(TicketResponse::from).collect(),
            limit,
        })),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(TicketErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}

/// Submit a ticket into the approval workflow
pub async fn submit_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TicketResponse>, impl IntoResponse> {
    match state.coordinator().submit_ticket(&id).await {
        Ok(ticket) => Ok(Json(TicketResponse::from(ticket))),
        Err(e) => Err(error_response(e)),
    }
}

/// Record an approval or rejection decision
pub async fn decision(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> Result<Json<TicketResponse>, impl IntoResponse> {
    match state
        .coordinator()
        .record_decision(&id, body.approved, body.comment)
        .await
    {
        Ok(ticket) => Ok(Json(TicketResponse::from(ticket))),
        Err(e) => Err(error_response(e)),
    }
}
