//! Demo data set
//!
//! Seeds an `InMemoryStore` with a small, internally consistent tenant base.
//! The gateway serves it when `store.in_memory` is set; the test suites use
//! it as their shared fixture.

use crate::store::{tables, InMemoryStore};
use serde_json::{json, Value};

pub const USER_SMITH: &str = "user-smith";
pub const USER_ADA: &str = "user-ada";
pub const USER_GRACE: &str = "user-grace";
pub const USER_ALAN: &str = "user-alan";
pub const USER_BARBARA: &str = "user-barbara";

pub const TICKET_REFUND: &str = "ticket-refund";
pub const TICKET_LOGIN: &str = "ticket-login";
pub const TICKET_INVOICE: &str = "ticket-invoice";

/// Rows in the `calls` table
pub const CALL_COUNT: u64 = 14;

fn profiles() -> Vec<Value> {
    [
        (USER_SMITH, "John SMITH", "+15550000001", "2025-05-01T09:00:00Z"),
        (USER_ADA, "Ada Lovelace", "+15550000002", "2025-04-01T09:00:00Z"),
        (USER_GRACE, "Grace Hopper", "+15550000003", "2025-03-01T09:00:00Z"),
        (USER_ALAN, "Alan Turing", "+15550000004", "2025-02-01T09:00:00Z"),
        (USER_BARBARA, "Barbara Liskov", "+15550000005", "2025-01-01T09:00:00Z"),
    ]
    .into_iter()
    .map(|(user_id, name, phone, created_at)| {
        json!({
            "id": format!("profile-{user_id}"),
            "user_id": user_id,
            "full_name": name,
            "contact_phone": phone,
            "business_type": "smb",
            "timezone": "America/New_York",
            "created_at": created_at,
        })
    })
    .collect()
}

fn businesses() -> Vec<Value> {
    [
        ("biz-smith", USER_SMITH, "Smith Plumbing", "plumbing", "active"),
        ("biz-ada", USER_ADA, "Lovelace Analytics", "consulting", "inactive"),
        ("biz-grace", USER_GRACE, "Hopper Dental", "dental", "active"),
        ("biz-alan", USER_ALAN, "Turing Bakery", "restaurant", "inactive"),
        ("biz-barbara", USER_BARBARA, "Liskov Legal", "legal", "active"),
        ("biz-acme", "user-acme", "Acme Trial Co", "retail", "trialing"),
        ("biz-gone", "user-gone", "Closed Shop", "retail", "canceled"),
        ("biz-late", "user-late", "Late Payers LLC", "finance", "past_due"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (id, user_id, name, category, status))| {
        json!({
            "id": id,
            "user_id": user_id,
            "business_name": name,
            "category": category,
            "email": format!("hello@{id}.example.com"),
            "phone": format!("+1555100{i:04}"),
            "city": "Springfield",
            "rating": 4.5,
            "subscription_status": status,
            "created_at": format!("2025-01-{:02}T12:00:00Z", i + 1),
        })
    })
    .collect()
}

fn plans() -> Vec<Value> {
    vec![
        json!({"id": "plan-pro", "name": "Pro", "price_amount": 4900, "interval": "month", "features": ["unlimited calls"]}),
        json!({"id": "plan-free", "name": "Free", "price_amount": 0, "interval": "month"}),
        json!({"id": "plan-starter", "name": "Starter", "price_amount": 1900, "interval": "month"}),
    ]
}

fn subscriptions() -> Vec<Value> {
    vec![
        json!({
            "id": "sub-smith-old",
            "user_id": USER_SMITH,
            "plan_id": "plan-starter",
            "status": "canceled",
            "cancel_at_period_end": false,
            "created_at": "2025-01-10T00:00:00Z",
        }),
        json!({
            "id": "sub-smith",
            "user_id": USER_SMITH,
            "plan_id": "plan-pro",
            "status": "active",
            "stripe_subscription_id": "sub_123",
            "current_period_start": "2025-06-01T00:00:00Z",
            "current_period_end": "2025-07-01T00:00:00Z",
            "cancel_at_period_end": false,
            "created_at": "2025-05-02T00:00:00Z",
        }),
        json!({
            "id": "sub-grace",
            "user_id": USER_GRACE,
            "plan_id": "plan-starter",
            "status": "trialing",
            "created_at": "2025-03-02T00:00:00Z",
        }),
    ]
}

fn invoices() -> Vec<Value> {
    [
        ("inv-1", 4900, "2025-06-03T00:00:00Z"),
        ("inv-2", 1900, "2025-06-10T00:00:00Z"),
        ("inv-3", 4900, "2025-05-03T00:00:00Z"),
        ("inv-4", 4900, "2025-04-03T00:00:00Z"),
        ("inv-5", 4900, "2025-03-03T00:00:00Z"),
        ("inv-6", 4900, "2025-02-03T00:00:00Z"),
    ]
    .into_iter()
    .map(|(id, amount, created_at)| {
        json!({
            "id": id,
            "user_id": USER_SMITH,
            "currency": "usd",
            "amount_paid": amount,
            "amount_due": amount,
            "status": "paid",
            "created_at": created_at,
        })
    })
    .collect()
}

fn calls() -> Vec<Value> {
    let mut calls: Vec<Value> = (1..=12)
        .map(|i| {
            json!({
                "id": format!("call-{i:02}"),
                "user_id": USER_SMITH,
                "caller_name": if i == 1 { "Mary Smith".to_string() } else { format!("Caller {i}") },
                "caller_phone": format!("+1555200{i:04}"),
                "duration_seconds": 60,
                "summary": format!("Call number {i}"),
                "sentiment": "neutral",
                "category": if i % 2 == 0 { "booking" } else { "support" },
                "status": if i % 3 == 0 { "missed" } else { "completed" },
                "is_urgent": i == 7,
                "created_at": format!("2025-06-{i:02}T10:00:00Z"),
            })
        })
        .collect();

    calls.push(json!({
        "id": "call-13",
        "user_id": USER_GRACE,
        "caller_name": "Patient A",
        "duration_seconds": 300,
        "category": "inquiry",
        "status": "completed",
        "created_at": "2025-05-05T15:00:00Z",
    }));
    calls.push(json!({
        "id": "call-14",
        "user_id": USER_GRACE,
        "caller_name": "Patient B",
        "duration_seconds": 120,
        "category": "inquiry",
        "status": "completed",
        "created_at": "2025-05-20T15:00:00Z",
    }));
    calls
}

fn reviews() -> Vec<Value> {
    vec![
        json!({
            "id": "rev-1",
            "business_id": "biz-smith",
            "reviewer_name": "Pat",
            "rating": 5,
            "review_text": "Fixed the leak in an hour",
            "source": "google",
            "sentiment": "positive",
            "review_date": "2025-05-10T00:00:00Z",
            "created_at": "2025-05-10T00:00:00Z",
        }),
        json!({
            "id": "rev-2",
            "business_id": "biz-grace",
            "reviewer_name": "Sam",
            "rating": 5,
            "review_text": "Friendly front desk",
            "source": "yelp",
            "sentiment": "positive",
            "review_date": "2025-05-12T00:00:00Z",
            "created_at": "2025-05-12T00:00:00Z",
        }),
        json!({
            "id": "rev-3",
            "business_id": "biz-grace",
            "reviewer_name": "Lee",
            "rating": 2,
            "review_text": "Waited too long",
            "source": "google",
            "sentiment": "negative",
            "review_date": "2025-05-14T00:00:00Z",
            "created_at": "2025-05-14T00:00:00Z",
        }),
    ]
}

fn support_tickets() -> Vec<Value> {
    vec![
        json!({
            "id": TICKET_REFUND,
            "user_id": USER_SMITH,
            "subject": "Refund request",
            "summary": "Customer wants a refund for the June invoice",
            "status": "open",
            "priority": "high",
            "channel": "chat",
            "metadata": {"order_id": "ord-42", "customer_email": "john@example.com"},
            "created_at": "2025-06-10T10:00:00Z",
            "updated_at": "2025-06-10T10:00:00Z",
        }),
        json!({
            "id": TICKET_LOGIN,
            "user_id": USER_ADA,
            "subject": "Cannot log in",
            "summary": "Password reset email never arrives",
            "status": "in_progress",
            "priority": "medium",
            "channel": "email",
            "created_at": "2025-06-11T08:00:00Z",
            "updated_at": "2025-06-11T09:00:00Z",
        }),
        json!({
            "id": TICKET_INVOICE,
            "user_id": USER_GRACE,
            "subject": "Invoice address",
            "summary": "Wants the billing address changed",
            "status": "resolved",
            "priority": "low",
            "channel": "chat",
            "created_at": "2025-06-01T08:00:00Z",
            "updated_at": "2025-06-02T08:00:00Z",
        }),
    ]
}

fn support_messages() -> Vec<Value> {
    vec![
        json!({
            "id": "msg-1",
            "ticket_id": TICKET_LOGIN,
            "role": "user",
            "content": "I never get the reset email.",
            "created_at": "2025-06-11T08:00:00Z",
        }),
        json!({
            "id": "msg-2",
            "ticket_id": TICKET_LOGIN,
            "role": "assistant",
            "content": "Could you check your spam folder?",
            "sender_name": "Support Bot",
            "created_at": "2025-06-11T08:01:00Z",
        }),
        json!({
            "id": "msg-3",
            "ticket_id": TICKET_LOGIN,
            "role": "user",
            "content": "Nothing there either.",
            "created_at": "2025-06-11T08:05:00Z",
        }),
    ]
}

fn knowledge_documents() -> Vec<Value> {
    vec![
        json!({
            "id": "doc-1",
            "name": "Refund policy.pdf",
            "type": "pdf",
            "status": "ready",
            "chunks_count": 12,
            "uploaded_at": "2025-05-01T00:00:00Z",
        }),
        json!({
            "id": "doc-2",
            "name": "Onboarding guide.md",
            "type": "markdown",
            "status": "processing",
            "chunks_count": 0,
            "uploaded_at": "2025-06-01T00:00:00Z",
        }),
    ]
}

/// Store with every table populated
pub async fn demo_store() -> InMemoryStore {
    let store = InMemoryStore::with_schema();
    store.insert_rows(tables::PROFILES, profiles()).await;
    store.insert_rows(tables::BUSINESSES, businesses()).await;
    store.insert_rows(tables::PLANS, plans()).await;
    store.insert_rows(tables::SUBSCRIPTIONS, subscriptions()).await;
    store.insert_rows(tables::INVOICES, invoices()).await;
    store.insert_rows(tables::CALLS, calls()).await;
    store.insert_rows(tables::REVIEWS, reviews()).await;
    store.insert_rows(tables::SUPPORT_TICKETS, support_tickets()).await;
    store.insert_rows(tables::SUPPORT_MESSAGES, support_messages()).await;
    store
        .insert_rows(tables::KNOWLEDGE_DOCUMENTS, knowledge_documents())
        .await;
    store
}
