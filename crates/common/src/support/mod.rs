//! Support desk operations
//!
//! Provides:
//! - Ticket and message reads (cached)
//! - Replies and status transitions, with cache invalidation
//! - Draft generation, admin actions and knowledge search through the
//!   knowledge processor
//! - Processor health and metrics probes that never fail

mod processor;
pub mod workflow;

pub use processor::{
    Draft, DraftRequest, HistoryEntry, HttpKnowledgeProcessor, KnowledgeProcessor, MockBehavior,
    MockKnowledgeProcessor, ProcessorHealth, ProcessorMetrics, SearchResults,
};

use crate::auth::AuthContext;
use crate::cache::{keys, Mutation, QueryCache};
use crate::config::CacheConfig;
use crate::errors::{AppError, Result};
use crate::metrics::record_ticket_transition;
use crate::models::{
    DocumentStatus, KnowledgeDocument, MessageRole, SupportTicket, TicketMessage, TicketStatus,
};
use crate::store::{tables, DataStore, Filter, Query};
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

/// `user_id` the processor sees on drafts requested from the dashboard
pub const DRAFT_USER_ID: &str = "admin_dashboard";
pub const REPLY_SENDER: &str = "Admin";
pub const KNOWLEDGE_SEARCH_LIMIT: u32 = 10;

/// Reply typed by an admin
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ReplyRequest {
    #[validate(length(min = 1, max = 10000))]
    pub content: String,

    /// `agent` (default) or `system`
    #[serde(default)]
    pub role: Option<MessageRole>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusUpdate {
    pub status: TicketStatus,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DraftOptions {
    #[serde(default)]
    pub order_data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ActionRequest {
    #[validate(length(min = 1, max = 100))]
    pub action: String,

    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct KnowledgeSearch {
    #[validate(length(min = 1, max = 1000))]
    pub query: String,
}

/// A document handed to the processor for indexing
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct NewKnowledgeDocument {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[serde(rename = "type", default)]
    pub doc_type: Option<String>,
}

fn blank(field: &str) -> AppError {
    AppError::Validation {
        message: format!("{} must not be blank", field),
        field: Some(field.to_string()),
    }
}

/// Newest ticket first
async fn load_tickets(store: &dyn DataStore) -> Result<Vec<SupportTicket>> {
    let query = Query::from(tables::SUPPORT_TICKETS).order("created_at", false);
    store.select(&query).await?.decode()
}

/// Oldest message first; an unreadable message table yields no messages
async fn load_messages(store: &dyn DataStore, ticket_id: &str) -> Vec<TicketMessage> {
    let query = Query::from(tables::SUPPORT_MESSAGES)
        .eq("ticket_id", ticket_id)
        .order("created_at", true);
    match store.select(&query).await.and_then(|r| r.decode()) {
        Ok(messages) => messages,
        Err(e) => {
            warn!(ticket_id, error = %e, "Could not fetch ticket messages");
            Vec::new()
        }
    }
}

/// The conversation sent for a draft
///
/// With no stored messages the ticket summary stands in as the customer's
/// only message.
pub fn draft_history(ticket: &SupportTicket, messages: &[TicketMessage]) -> Vec<HistoryEntry> {
    if messages.is_empty() {
        return vec![HistoryEntry {
            role: MessageRole::User.as_str().to_string(),
            content: ticket.summary.clone().unwrap_or_default(),
        }];
    }
    messages
        .iter()
        .map(|m| HistoryEntry {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        })
        .collect()
}

/// Timestamp written on a status change, strictly after `previous`
fn next_updated_at(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + ChronoDuration::microseconds(1);
    if now > floor {
        now
    } else {
        floor
    }
}

/// Support desk backed by the store and the knowledge processor
#[derive(Clone)]
pub struct SupportService {
    store: Arc<dyn DataStore>,
    processor: Arc<dyn KnowledgeProcessor>,
    cache: QueryCache,
    staleness: CacheConfig,
}

impl SupportService {
    pub fn new(
        store: Arc<dyn DataStore>,
        processor: Arc<dyn KnowledgeProcessor>,
        cache: QueryCache,
        staleness: CacheConfig,
    ) -> Self {
        Self {
            store,
            processor,
            cache,
            staleness,
        }
    }

    /// Store handle for writes made on the caller's behalf
    fn store_for(&self, auth: &AuthContext) -> Arc<dyn DataStore> {
        match auth.credentials() {
            Some(credentials) => self.store.with_credentials(&credentials),
            None => Arc::clone(&self.store),
        }
    }

    async fn ticket(&self, ticket_id: &str) -> Result<SupportTicket> {
        let query = Query::from(tables::SUPPORT_TICKETS)
            .eq("id", ticket_id)
            .limit(1);
        self.store
            .select(&query)
            .await?
            .decode::<SupportTicket>()?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found("ticket", ticket_id))
    }

    pub async fn tickets(&self) -> Result<Vec<SupportTicket>> {
        let store = Arc::clone(&self.store);
        self.cache
            .fetch_as(&keys::support_tickets(), self.staleness.tickets(), move || async move {
                load_tickets(store.as_ref()).await
            })
            .await
    }

    pub async fn ticket_messages(&self, ticket_id: &str) -> Result<Vec<TicketMessage>> {
        let store = Arc::clone(&self.store);
        let id = ticket_id.to_string();
        self.cache
            .fetch_as(
                &keys::ticket_messages(ticket_id),
                self.staleness.messages(),
                move || async move { Ok::<_, AppError>(load_messages(store.as_ref(), &id).await) },
            )
            .await
    }

    /// Store an admin reply on a ticket
    #[instrument(skip(self, auth, reply), fields(request_id = %auth.request_id))]
    pub async fn send_reply(
        &self,
        auth: &AuthContext,
        ticket_id: &str,
        reply: ReplyRequest,
    ) -> Result<TicketMessage> {
        reply.validate()?;
        if reply.content.trim().is_empty() {
            return Err(blank("content"));
        }
        let role = reply.role.unwrap_or(MessageRole::Agent);
        if !matches!(role, MessageRole::Agent | MessageRole::System) {
            return Err(AppError::Validation {
                message: format!("replies cannot be sent as {}", role.as_str()),
                field: Some("role".to_string()),
            });
        }

        let row = json!({
            "ticket_id": ticket_id,
            "role": role,
            "content": reply.content,
            "sender_name": REPLY_SENDER,
            "created_at": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        });
        let stored = self
            .store_for(auth)
            .insert(tables::SUPPORT_MESSAGES, row)
            .await?;
        let message: TicketMessage = serde_json::from_value(stored)?;

        self.cache
            .apply(&Mutation::TicketReply {
                ticket_id: ticket_id.to_string(),
            })
            .await;
        info!(message_id = %message.id, "Reply stored");
        Ok(message)
    }

    /// Move a ticket to `status`
    #[instrument(skip(self, auth), fields(request_id = %auth.request_id))]
    pub async fn update_ticket_status(
        &self,
        auth: &AuthContext,
        ticket_id: &str,
        status: TicketStatus,
    ) -> Result<SupportTicket> {
        let mut ticket = self.ticket(ticket_id).await?;
        let previous = ticket.status;
        previous.transition_to(status)?;

        let updated_at = next_updated_at(ticket.updated_at, Utc::now());
        let patch = json!({
            "status": status,
            "updated_at": updated_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        });
        let affected = self
            .store_for(auth)
            .update(tables::SUPPORT_TICKETS, patch, &[Filter::eq("id", ticket_id)])
            .await?;
        if affected == 0 {
            return Err(AppError::not_found("ticket", ticket_id));
        }

        self.cache
            .apply(&Mutation::TicketStatusChange {
                ticket_id: ticket_id.to_string(),
            })
            .await;
        record_ticket_transition(previous.as_str(), status.as_str());
        info!(from = %previous, to = %status, "Ticket status updated");

        ticket.status = status;
        ticket.updated_at = updated_at;
        Ok(ticket)
    }

    /// Ask the processor for a reply draft
    ///
    /// The draft is only returned for review; nothing is sent and a failure is
    /// not retried.
    #[instrument(skip(self, auth, options), fields(request_id = %auth.request_id))]
    pub async fn generate_draft(
        &self,
        auth: &AuthContext,
        ticket_id: &str,
        options: DraftOptions,
    ) -> Result<Draft> {
        let ticket = self.ticket(ticket_id).await?;
        let messages = self.ticket_messages(ticket_id).await?;

        let request = DraftRequest {
            ticket_id: ticket.id.clone(),
            user_id: DRAFT_USER_ID.to_string(),
            history: draft_history(&ticket, &messages),
            user_metadata: ticket.metadata.clone(),
            order_data: options.order_data,
        };

        match self.processor.draft(&request, auth.token()).await {
            Ok(draft) => {
                info!(
                    turns = request.history.len(),
                    confidence = ?draft.confidence,
                    "Draft generated"
                );
                Ok(draft)
            }
            Err(e) => {
                warn!(error = %e, "Draft generation failed");
                Err(AppError::DraftGeneration {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Run an admin action such as a refund
    #[instrument(skip(self, auth, request), fields(request_id = %auth.request_id, action = %request.action))]
    pub async fn execute_action(&self, auth: &AuthContext, request: ActionRequest) -> Result<Value> {
        request.validate()?;
        if request.action.trim().is_empty() {
            return Err(blank("action"));
        }

        self.processor
            .execute(&request.action, request.params, auth.token())
            .await
            .map_err(|e| match e {
                AppError::Upstream { .. } => e,
                other => AppError::upstream("knowledge-processor", other.to_string()),
            })
    }

    /// Search the knowledge base; processor failures give no results
    pub async fn search_knowledge(
        &self,
        auth: &AuthContext,
        search: KnowledgeSearch,
    ) -> Result<SearchResults> {
        search.validate()?;
        if search.query.trim().is_empty() {
            return Err(blank("query"));
        }

        match self
            .processor
            .search(&search.query, KNOWLEDGE_SEARCH_LIMIT, auth.token())
            .await
        {
            Ok(results) => Ok(results),
            Err(e) => {
                warn!(error = %e, "Knowledge search unavailable");
                Ok(SearchResults::default())
            }
        }
    }

    /// Record an uploaded document; it stays `processing` until the
    /// processor reports it indexed
    pub async fn add_knowledge_document(
        &self,
        auth: &AuthContext,
        document: NewKnowledgeDocument,
    ) -> Result<KnowledgeDocument> {
        document.validate()?;
        let row = json!({
            "name": document.name,
            "type": document.doc_type,
            "status": DocumentStatus::Processing,
            "chunks_count": 0,
            "uploaded_at": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        });
        let stored = self
            .store_for(auth)
            .insert(tables::KNOWLEDGE_DOCUMENTS, row)
            .await?;
        let document: KnowledgeDocument = serde_json::from_value(stored)?;

        self.cache.apply(&Mutation::KnowledgeDocumentChange).await;
        Ok(document)
    }

    pub async fn processor_health(&self) -> ProcessorHealth {
        match self.processor.health().await {
            Ok(health) => health,
            Err(e) => {
                warn!(error = %e, "Knowledge processor unreachable");
                ProcessorHealth::unreachable()
            }
        }
    }

    pub async fn processor_metrics(&self) -> Option<ProcessorMetrics> {
        match self.processor.metrics().await {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!(error = %e, "Knowledge processor metrics unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, TICKET_INVOICE, TICKET_LOGIN, TICKET_REFUND};
    use crate::queries::AdminQueries;
    use crate::store::InMemoryStore;

    struct Harness {
        store: InMemoryStore,
        processor: Arc<MockKnowledgeProcessor>,
        service: SupportService,
    }

    async fn harness(behavior: MockBehavior) -> Harness {
        let store = fixtures::demo_store().await;
        let processor = Arc::new(MockKnowledgeProcessor::new(behavior));
        let service = SupportService::new(
            Arc::new(store.clone()),
            processor.clone(),
            QueryCache::new(),
            CacheConfig::default(),
        );
        Harness {
            store,
            processor,
            service,
        }
    }

    fn admin() -> AuthContext {
        AuthContext::anonymous()
    }

    fn reply(content: &str) -> ReplyRequest {
        ReplyRequest {
            content: content.to_string(),
            role: None,
        }
    }

    #[tokio::test]
    async fn test_resolving_ticket_is_visible_in_next_listing() {
        let h = harness(MockBehavior::Healthy).await;
        let before = h.service.tickets().await.unwrap();
        let prior = before.iter().find(|t| t.id == TICKET_REFUND).unwrap().clone();
        assert_eq!(prior.status, TicketStatus::Open);

        h.service
            .update_ticket_status(&admin(), TICKET_REFUND, TicketStatus::Resolved)
            .await
            .unwrap();

        let after = h.service.tickets().await.unwrap();
        let ticket = after.iter().find(|t| t.id == TICKET_REFUND).unwrap();
        assert_eq!(ticket.status, TicketStatus::Resolved);
        assert!(ticket.updated_at > prior.updated_at);
    }

    #[test]
    fn test_updated_at_moves_forward_even_with_future_prior() {
        let prior = Utc::now() + ChronoDuration::hours(1);
        let next = next_updated_at(prior, Utc::now());
        assert!(next > prior);

        let earlier = Utc::now() - ChronoDuration::hours(1);
        let now = Utc::now();
        assert_eq!(next_updated_at(earlier, now), now);
    }

    #[tokio::test]
    async fn test_invalid_transition_leaves_ticket_untouched() {
        let h = harness(MockBehavior::Healthy).await;
        h.service
            .update_ticket_status(&admin(), TICKET_LOGIN, TicketStatus::Closed)
            .await
            .unwrap();
        let err = h
            .service
            .update_ticket_status(&admin(), TICKET_LOGIN, TicketStatus::Open)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        let rows = h.store.rows(tables::SUPPORT_TICKETS).await;
        let login = rows.iter().find(|r| r["id"] == TICKET_LOGIN).unwrap();
        assert_eq!(login["status"], "closed");
    }

    #[tokio::test]
    async fn test_working_ticket_can_move_back_to_open() {
        let h = harness(MockBehavior::Healthy).await;
        let ticket = h
            .service
            .update_ticket_status(&admin(), TICKET_LOGIN, TicketStatus::Open)
            .await
            .unwrap();
        assert_eq!(ticket.status, TicketStatus::Open);

        let rows = h.store.rows(tables::SUPPORT_TICKETS).await;
        let login = rows.iter().find(|r| r["id"] == TICKET_LOGIN).unwrap();
        assert_eq!(login["status"], "open");
    }

    #[tokio::test]
    async fn test_unknown_ticket() {
        let h = harness(MockBehavior::Healthy).await;
        let err = h
            .service
            .update_ticket_status(&admin(), "missing", TicketStatus::Closed)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_reply_invalidates_only_that_ticket_messages() {
        let h = harness(MockBehavior::Healthy).await;
        let login = h.service.ticket_messages(TICKET_LOGIN).await.unwrap();
        assert_eq!(login.len(), 3);
        assert!(login.windows(2).all(|p| p[0].created_at <= p[1].created_at));
        h.service.ticket_messages(TICKET_INVOICE).await.unwrap();
        assert_eq!(h.store.select_count(tables::SUPPORT_MESSAGES).await, 2);

        let message = h
            .service
            .send_reply(&admin(), TICKET_LOGIN, reply("We resent the email."))
            .await
            .unwrap();
        assert_eq!(message.sender_name.as_deref(), Some(REPLY_SENDER));
        assert_eq!(message.role, MessageRole::Agent);

        let login = h.service.ticket_messages(TICKET_LOGIN).await.unwrap();
        assert_eq!(login.len(), 4);
        assert_eq!(login.last().unwrap().content, "We resent the email.");

        // the other ticket is still served from cache
        h.service.ticket_messages(TICKET_INVOICE).await.unwrap();
        assert_eq!(h.store.select_count(tables::SUPPORT_MESSAGES).await, 3);
    }

    #[tokio::test]
    async fn test_blank_reply_rejected() {
        let h = harness(MockBehavior::Healthy).await;
        for content in ["", "   \n"] {
            let err = h
                .service
                .send_reply(&admin(), TICKET_LOGIN, reply(content))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }));
        }

        let err = h
            .service
            .send_reply(
                &admin(),
                TICKET_LOGIN,
                ReplyRequest {
                    content: "hello".into(),
                    role: Some(MessageRole::User),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(h.store.rows(tables::SUPPORT_MESSAGES).await.len(), 3);
    }

    #[tokio::test]
    async fn test_draft_synthesizes_history_from_summary() {
        let h = harness(MockBehavior::Healthy).await;
        let auth = AuthContext {
            token: Some("session-1".into()),
            request_id: "req-1".into(),
        };
        let draft = h
            .service
            .generate_draft(&auth, TICKET_REFUND, DraftOptions::default())
            .await
            .unwrap();
        assert!(draft.draft.contains("refund"));
        assert_eq!(draft.confidence, Some(0.87));

        let requests = h.processor.draft_requests().await;
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.user_id, DRAFT_USER_ID);
        assert_eq!(
            request.history,
            vec![HistoryEntry {
                role: "user".into(),
                content: "Customer wants a refund for the June invoice".into(),
            }]
        );
        assert_eq!(request.user_metadata["order_id"], "ord-42");
        assert_eq!(h.processor.tokens().await, vec![Some("session-1".to_string())]);
    }

    #[tokio::test]
    async fn test_draft_uses_stored_history() {
        let h = harness(MockBehavior::Healthy).await;
        h.service
            .generate_draft(&admin(), TICKET_LOGIN, DraftOptions::default())
            .await
            .unwrap();
        let request = &h.processor.draft_requests().await[0];
        let roles: Vec<&str> = request.history.iter().map(|e| e.role.as_str()).collect();
        assert_eq!(roles, ["user", "assistant", "user"]);
        assert_eq!(h.processor.tokens().await, vec![None]);
    }

    #[tokio::test]
    async fn test_draft_failure_is_not_retried_and_sends_nothing() {
        let h = harness(MockBehavior::Failing).await;
        let err = h
            .service
            .generate_draft(&admin(), TICKET_LOGIN, DraftOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DraftGeneration { .. }));
        assert_eq!(h.processor.call_count(), 1);
        assert_eq!(h.store.rows(tables::SUPPORT_MESSAGES).await.len(), 3);
    }

    #[tokio::test]
    async fn test_action_failure_is_upstream() {
        let h = harness(MockBehavior::Unreachable).await;
        let err = h
            .service
            .execute_action(
                &admin(),
                ActionRequest {
                    action: "refund".into(),
                    params: json!({"order_id": "ord-42"}),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream { .. }));

        let ok = harness(MockBehavior::Healthy).await;
        let result = ok
            .service
            .execute_action(
                &admin(),
                ActionRequest {
                    action: "refund".into(),
                    params: json!({"order_id": "ord-42"}),
                },
            )
            .await
            .unwrap();
        assert_eq!(result["success"], true);
    }

    #[tokio::test]
    async fn test_search_degrades_to_empty() {
        let h = harness(MockBehavior::Failing).await;
        let results = h
            .service
            .search_knowledge(&admin(), KnowledgeSearch { query: "refund".into() })
            .await
            .unwrap();
        assert!(results.results.is_empty());

        let h = harness(MockBehavior::Healthy).await;
        let results = h
            .service
            .search_knowledge(&admin(), KnowledgeSearch { query: "refund".into() })
            .await
            .unwrap();
        assert_eq!(results.results.len(), 2);
    }

    #[tokio::test]
    async fn test_processor_probes_degrade() {
        let h = harness(MockBehavior::Healthy).await;
        assert_eq!(h.service.processor_health().await.status, "healthy");
        assert!(h.service.processor_metrics().await.is_some());

        let h = harness(MockBehavior::Failing).await;
        assert_eq!(h.service.processor_health().await.status, "unhealthy");
        assert!(h.service.processor_metrics().await.is_none());

        let h = harness(MockBehavior::Unreachable).await;
        assert_eq!(h.service.processor_health().await.status, "unreachable");
        assert!(h.service.processor_metrics().await.is_none());
    }

    #[tokio::test]
    async fn test_new_document_invalidates_document_list() {
        let h = harness(MockBehavior::Healthy).await;
        let queries = AdminQueries::new(
            Arc::new(h.store.clone()),
            h.service.cache.clone(),
            CacheConfig::default(),
        );
        assert_eq!(queries.knowledge_documents().await.unwrap().len(), 2);

        let document = h
            .service
            .add_knowledge_document(
                &admin(),
                NewKnowledgeDocument {
                    name: "Pricing.pdf".into(),
                    doc_type: Some("pdf".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(document.status, DocumentStatus::Processing);

        let documents = queries.knowledge_documents().await.unwrap();
        assert_eq!(documents.len(), 3);
        assert_eq!(documents[0].name, "Pricing.pdf");
    }
}
