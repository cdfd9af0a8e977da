//! Support desk handlers
//!
//! Ticket writes and processor calls run with the caller's session token
//! when one is present.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tracing::instrument;

use crate::AppState;
use vocalscale_common::{
    auth::AuthContext,
    errors::Result,
    models::{KnowledgeDocument, SupportTicket, TicketMessage},
    support::{
        ActionRequest, Draft, DraftOptions, KnowledgeSearch, NewKnowledgeDocument,
        ProcessorHealth, ProcessorMetrics, ReplyRequest, SearchResults, StatusUpdate,
    },
};

/// GET /api/support/tickets
pub async fn list_tickets(State(state): State<AppState>) -> Result<Json<Vec<SupportTicket>>> {
    Ok(Json(state.support.tickets().await?))
}

/// GET /api/support/tickets/{id}/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> Result<Json<Vec<TicketMessage>>> {
    Ok(Json(state.support.ticket_messages(&ticket_id).await?))
}

/// POST /api/support/tickets/{id}/messages
#[instrument(skip(state, auth, reply))]
pub async fn send_reply(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(ticket_id): Path<String>,
    Json(reply): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<TicketMessage>)> {
    let message = state.support.send_reply(&auth, &ticket_id, reply).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// PATCH /api/support/tickets/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(ticket_id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<SupportTicket>> {
    let ticket = state
        .support
        .update_ticket_status(&auth, &ticket_id, update.status)
        .await?;
    Ok(Json(ticket))
}

/// POST /api/support/tickets/{id}/draft
pub async fn generate_draft(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(ticket_id): Path<String>,
    Json(options): Json<DraftOptions>,
) -> Result<Json<Draft>> {
    Ok(Json(
        state
            .support
            .generate_draft(&auth, &ticket_id, options)
            .await?,
    ))
}

/// POST /api/support/actions
pub async fn execute_action(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<ActionRequest>,
) -> Result<Json<Value>> {
    Ok(Json(state.support.execute_action(&auth, request).await?))
}

/// POST /api/support/knowledge/search
pub async fn search_knowledge(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(search): Json<KnowledgeSearch>,
) -> Result<Json<SearchResults>> {
    Ok(Json(state.support.search_knowledge(&auth, search).await?))
}

/// GET /api/support/knowledge/documents
pub async fn list_documents(State(state): State<AppState>) -> Result<Json<Vec<KnowledgeDocument>>> {
    Ok(Json(state.queries.knowledge_documents().await?))
}

/// POST /api/support/knowledge/documents
pub async fn add_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(document): Json<NewKnowledgeDocument>,
) -> Result<(StatusCode, Json<KnowledgeDocument>)> {
    let document = state.support.add_knowledge_document(&auth, document).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// GET /api/support/processor/health
pub async fn processor_health(State(state): State<AppState>) -> Json<ProcessorHealth> {
    Json(state.support.processor_health().await)
}

/// GET /api/support/processor/metrics
pub async fn processor_metrics(State(state): State<AppState>) -> Json<Option<ProcessorMetrics>> {
    Json(state.support.processor_metrics().await)
}
