//! Column sets of the list views

use super::format::{format_currency, format_date, format_duration, format_rating, or_placeholder};
use super::{Column, Tabular};
use crate::models::{BusinessRecord, CallRecord, ReviewRow, SubscriptionRow, UserSummary};

impl Tabular for UserSummary {
    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("full_name", "Name", |u| u.full_name.clone()),
            Column::new("email", "Email", |u| or_placeholder(Some(u.email.as_str()))),
            Column::new("business_name", "Business", |u| u.business_name.clone()),
            Column::new("plan_name", "Plan", |u| match u.plan_price {
                Some(price) if price > 0 => format!("{} ({})", u.plan_name, format_currency(price)),
                _ => u.plan_name.clone(),
            }),
            Column::new("subscription_status", "Status", |u| u.subscription_status.clone()),
            Column::new("total_calls", "Calls", |u| u.total_calls.to_string()),
            Column::new("created_at", "Joined", |u| format_date(Some(u.created_at))),
        ]
    }
}

impl Tabular for BusinessRecord {
    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("business_name", "Business", |b| or_placeholder(b.business_name.as_deref())),
            Column::new("category", "Category", |b| or_placeholder(b.category.as_deref())),
            Column::new("email", "Email", |b| or_placeholder(b.email.as_deref())),
            Column::new("location", "Location", |b| {
                let parts: Vec<&str> = [b.city.as_deref(), b.state.as_deref()]
                    .into_iter()
                    .flatten()
                    .filter(|p| !p.is_empty())
                    .collect();
                or_placeholder(Some(parts.join(", ").as_str()))
            }),
            Column::new("subscription_status", "Status", |b| {
                or_placeholder(b.subscription_status.as_deref())
            }),
            Column::new("rating", "Rating", |b| format_rating(b.rating)),
            Column::new("created_at", "Created", |b| format_date(Some(b.created_at))),
        ]
    }
}

impl Tabular for CallRecord {
    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("caller_name", "Caller", |c| or_placeholder(c.caller_name.as_deref())),
            Column::new("caller_phone", "Phone", |c| or_placeholder(c.caller_phone.as_deref())),
            Column::new("duration_seconds", "Duration", |c| format_duration(c.duration_seconds)),
            Column::new("category", "Category", |c| or_placeholder(c.category.as_deref())),
            Column::new("status", "Status", |c| or_placeholder(c.status.as_deref())),
            Column::new("is_urgent", "Urgent", |c| {
                let flag = if c.is_urgent { "Urgent" } else { "" };
                flag.to_string()
            }),
            Column::new("created_at", "Date", |c| format_date(Some(c.created_at))),
        ]
    }
}

impl Tabular for ReviewRow {
    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("business_name", "Business", |r| or_placeholder(r.business_name.as_deref())),
            Column::new("reviewer_name", "Reviewer", |r| {
                or_placeholder(r.review.reviewer_name.as_deref())
            }),
            Column::new("rating", "Rating", |r| "★".repeat(r.review.rating.clamp(0, 5) as usize)),
            Column::new("review_text", "Review", |r| or_placeholder(r.review.review_text.as_deref())),
            Column::new("source", "Source", |r| or_placeholder(r.review.source.as_deref())),
            Column::new("sentiment", "Sentiment", |r| or_placeholder(r.review.sentiment.as_deref())),
            Column::new("review_date", "Date", |r| format_date(r.review.review_date)),
        ]
    }
}

impl Tabular for SubscriptionRow {
    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("user_id", "User", |s| s.subscription.user_id.clone()),
            Column::new("plan", "Plan", |s| {
                or_placeholder(s.plan.as_ref().and_then(|p| p.name.as_deref()))
            }),
            Column::new("price", "Price", |s| {
                s.plan
                    .as_ref()
                    .and_then(|p| p.price_amount)
                    .map(format_currency)
                    .unwrap_or_else(|| or_placeholder(None))
            }),
            Column::new("status", "Status", |s| s.subscription.status.clone()),
            Column::new("current_period_end", "Renews", |s| {
                format_date(s.subscription.current_period_end)
            }),
            Column::new("created_at", "Created", |s| format_date(Some(s.subscription.created_at))),
        ]
    }
}
