//! Dashboard aggregates

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: u64,
    pub active_subscriptions: u64,
    /// Revenue collected this month, minor currency units
    pub total_revenue: i64,
    /// Month over month change in percent, one decimal
    pub revenue_change: String,
    /// Calls this month
    pub total_calls: u64,
    pub calls_change: String,
}

/// One bar of the twelve month call chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    /// Short month name (`Jan`)
    pub name: String,
    pub total: u64,
}
