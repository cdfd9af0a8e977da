//! Dashboard aggregates

use crate::errors::{AppError, Result};
use crate::models::{CallRecord, DashboardStats, MonthlyTotal};
use crate::store::{tables, DataStore, Query, StoreResponse};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use futures::future::try_join_all;
use serde::Deserialize;

const CHART_MONTHS: u32 = 12;
const RECENT_CALLS_LIMIT: u64 = 5;

#[derive(Deserialize)]
struct AmountPaid {
    #[serde(default)]
    amount_paid: Option<i64>,
}

/// First instant of the month `months_back` months before the one holding `now`
fn month_start(now: DateTime<Utc>, months_back: u32) -> Result<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|first| first.checked_sub_months(Months::new(months_back)))
        .and_then(|first| first.and_hms_opt(0, 0, 0))
        .map(|first| first.and_utc())
        .ok_or_else(|| AppError::Internal {
            message: format!("no month window {} months before {}", months_back, now),
        })
}

fn next_month(start: DateTime<Utc>) -> Result<DateTime<Utc>> {
    start
        .checked_add_months(Months::new(1))
        .ok_or_else(|| AppError::Internal {
            message: format!("no month after {}", start),
        })
}

/// `[start, end)` on `created_at`
fn in_window(query: Query, start: DateTime<Utc>, end: DateTime<Utc>) -> Query {
    query
        .gte("created_at", start.to_rfc3339())
        .lt("created_at", end.to_rfc3339())
}

fn revenue(response: StoreResponse) -> Result<i64> {
    Ok(response
        .decode::<AmountPaid>()?
        .iter()
        .filter_map(|row| row.amount_paid)
        .sum())
}

/// Change from `previous` to `current` in percent, one decimal; `"0"` without a baseline
pub fn percent_change(current: f64, previous: f64) -> String {
    if previous > 0.0 {
        format!("{:.1}", (current - previous) / previous * 100.0)
    } else {
        "0".to_string()
    }
}

/// Headline numbers for the current month against the previous one
///
/// The six reads are independent and run concurrently.
pub async fn dashboard_stats(store: &dyn DataStore, now: DateTime<Utc>) -> Result<DashboardStats> {
    let this_month = month_start(now, 0)?;
    let last_month = month_start(now, 1)?;

    let users = Query::from(tables::PROFILES).head();
    let active = Query::from(tables::SUBSCRIPTIONS).eq("status", "active").head();
    let current_invoices = Query::from(tables::INVOICES)
        .select(&["amount_paid"])
        .gte("created_at", this_month.to_rfc3339());
    let previous_invoices = in_window(
        Query::from(tables::INVOICES).select(&["amount_paid"]),
        last_month,
        this_month,
    );
    let current_calls = Query::from(tables::CALLS)
        .gte("created_at", this_month.to_rfc3339())
        .head();
    let previous_calls = in_window(Query::from(tables::CALLS).head(), last_month, this_month);

    let (users, active, current_invoices, previous_invoices, current_calls, previous_calls) = tokio::try_join!(
        store.select(&users),
        store.select(&active),
        store.select(&current_invoices),
        store.select(&previous_invoices),
        store.select(&current_calls),
        store.select(&previous_calls),
    )?;

    let current_revenue = revenue(current_invoices)?;
    let previous_revenue = revenue(previous_invoices)?;
    let calls_now = current_calls.count.unwrap_or(0);
    let calls_before = previous_calls.count.unwrap_or(0);

    Ok(DashboardStats {
        total_users: users.count.unwrap_or(0),
        active_subscriptions: active.count.unwrap_or(0),
        total_revenue: current_revenue,
        revenue_change: percent_change(current_revenue as f64, previous_revenue as f64),
        total_calls: calls_now,
        calls_change: percent_change(calls_now as f64, calls_before as f64),
    })
}

/// Calls per month over the twelve months ending with the month of `now`
///
/// The counts run concurrently; the result is oldest month first.
pub async fn calls_chart(store: &dyn DataStore, now: DateTime<Utc>) -> Result<Vec<MonthlyTotal>> {
    let mut windows = Vec::with_capacity(CHART_MONTHS as usize);
    for back in (0..CHART_MONTHS).rev() {
        let start = month_start(now, back)?;
        windows.push((start, next_month(start)?));
    }

    try_join_all(windows.into_iter().map(|(start, end)| async move {
        let query = in_window(Query::from(tables::CALLS).head(), start, end);
        let response = store.select(&query).await?;
        Ok::<_, AppError>(MonthlyTotal {
            name: start.format("%b").to_string(),
            total: response.count.unwrap_or(0),
        })
    }))
    .await
}

/// The five newest calls
pub async fn recent_calls(store: &dyn DataStore) -> Result<Vec<CallRecord>> {
    let query = Query::from(tables::CALLS)
        .select(&[
            "id",
            "caller_name",
            "caller_phone",
            "duration_seconds",
            "status",
            "category",
            "created_at",
        ])
        .order("created_at", false)
        .limit(RECENT_CALLS_LIMIT);
    store.select(&query).await?.decode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use chrono::TimeZone;

    fn mid_june() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(6800.0, 4900.0), "38.8");
        assert_eq!(percent_change(5.0, 10.0), "-50.0");
        assert_eq!(percent_change(12.0, 0.0), "0");
    }

    #[test]
    fn test_month_start_crosses_years() {
        let start = month_start(Utc.with_ymd_and_hms(2025, 2, 28, 23, 0, 0).unwrap(), 3).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_dashboard_stats() {
        let store = fixtures::demo_store().await;
        let stats = dashboard_stats(&store, mid_june()).await.unwrap();

        assert_eq!(stats.total_users, 5);
        assert_eq!(stats.active_subscriptions, 1);
        assert_eq!(stats.total_revenue, 6800);
        assert_eq!(stats.revenue_change, "38.8");
        assert_eq!(stats.total_calls, 12);
        assert_eq!(stats.calls_change, "500.0");
    }

    #[tokio::test]
    async fn test_month_boundary_is_exclusive() {
        let store = fixtures::demo_store().await;
        store
            .insert_rows(
                tables::CALLS,
                vec![serde_json::json!({
                    "id": "c-edge",
                    "user_id": fixtures::USER_GRACE,
                    "created_at": "2025-06-01T00:00:00Z"
                })],
            )
            .await;

        let stats = dashboard_stats(&store, mid_june()).await.unwrap();
        assert_eq!(stats.total_calls, 13);
        assert_eq!(stats.calls_change, "550.0");
    }

    #[tokio::test]
    async fn test_calls_chart_is_oldest_first() {
        let store = fixtures::demo_store().await;
        let chart = calls_chart(&store, mid_june()).await.unwrap();

        let names: Vec<&str> = chart.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            ["Jul", "Aug", "Sep", "Oct", "Nov", "Dec", "Jan", "Feb", "Mar", "Apr", "May", "Jun"]
        );
        assert_eq!(chart[11].total, 12);
        assert_eq!(chart[10].total, 2);
        assert_eq!(chart.iter().map(|m| m.total).sum::<u64>(), fixtures::CALL_COUNT);
    }

    #[tokio::test]
    async fn test_recent_calls() {
        let store = fixtures::demo_store().await;
        let calls = recent_calls(&store).await.unwrap();
        assert_eq!(calls.len(), 5);
        assert!(calls.windows(2).all(|p| p[0].created_at >= p[1].created_at));
    }
}
