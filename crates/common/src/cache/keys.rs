//! Cache key builder helpers

use super::QueryKey;
use crate::errors::Result;
use serde::Serialize;

pub const USERS: &str = "users";
pub const USER_DETAIL: &str = "user-detail";
pub const BUSINESSES: &str = "businesses";
pub const CALLS: &str = "calls";
pub const REVIEWS: &str = "reviews";
pub const SUBSCRIPTIONS: &str = "subscriptions";
pub const PLANS: &str = "plans";
pub const DASHBOARD_STATS: &str = "dashboard-stats";
pub const CALLS_CHART: &str = "calls-chart";
pub const RECENT_CALLS: &str = "recent-calls";
pub const SUPPORT_TICKETS: &str = "support-tickets";
pub const TICKET_MESSAGES: &str = "ticket-messages";
pub const KNOWLEDGE_DOCUMENTS: &str = "knowledge-documents";

/// A filtered list read
pub fn list<P: Serialize + ?Sized>(resource: &str, params: &P) -> Result<QueryKey> {
    QueryKey::new(resource).with_params(params)
}

pub fn user_detail(user_id: &str) -> QueryKey {
    QueryKey::new(USER_DETAIL).scoped(user_id)
}

pub fn plans() -> QueryKey {
    QueryKey::new(PLANS)
}

pub fn dashboard_stats() -> QueryKey {
    QueryKey::new(DASHBOARD_STATS)
}

/// Twelve-month chart ending in `month` (`YYYY-MM`)
pub fn calls_chart(month: &str) -> QueryKey {
    QueryKey::new(CALLS_CHART).scoped(month)
}

pub fn recent_calls() -> QueryKey {
    QueryKey::new(RECENT_CALLS)
}

pub fn support_tickets() -> QueryKey {
    QueryKey::new(SUPPORT_TICKETS)
}

pub fn ticket_messages(ticket_id: &str) -> QueryKey {
    QueryKey::new(TICKET_MESSAGES).scoped(ticket_id)
}

pub fn knowledge_documents() -> QueryKey {
    QueryKey::new(KNOWLEDGE_DOCUMENTS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_builders() {
        assert!(ticket_messages("t-1").to_string().starts_with("ticket-messages/t-1:"));
        assert!(user_detail("u-1").to_string().starts_with("user-detail/u-1:"));
        assert!(calls_chart("2025-06").to_string().starts_with("calls-chart/2025-06:"));
        assert_ne!(ticket_messages("t-1"), ticket_messages("t-2"));

        let page1 = list(CALLS, &json!({"page": 1})).unwrap();
        let page2 = list(CALLS, &json!({"page": 2})).unwrap();
        assert_ne!(page1, page2);
        assert_eq!(page1.resource(), CALLS);
    }
}
