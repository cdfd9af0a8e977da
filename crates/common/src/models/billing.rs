//! Subscription, plan and invoice records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::relation::OneOrMany;

/// Subscription lifecycle as the payment processor reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    Canceled,
    PastDue,
    Inactive,
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 5] = [
        SubscriptionStatus::Active,
        SubscriptionStatus::Trialing,
        SubscriptionStatus::Canceled,
        SubscriptionStatus::PastDue,
        SubscriptionStatus::Inactive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown subscription status: {}", s))
    }
}

/// A row of the `plans` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub id: String,

    pub name: String,

    pub stripe_price_id: Option<String>,

    /// Price in minor currency units
    pub price_amount: i64,

    /// Billing interval (`month`, `year`)
    pub interval: Option<String>,

    pub description: Option<String>,

    #[serde(default)]
    pub features: Vec<String>,

    pub created_at: Option<DateTime<Utc>>,
}

/// The plan columns embedded into subscription rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub name: Option<String>,
    pub price_amount: Option<i64>,
    pub interval: Option<String>,
}

/// A row of the `subscriptions` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: String,

    pub user_id: String,

    pub stripe_subscription_id: Option<String>,

    pub stripe_customer_id: Option<String>,

    pub stripe_price_id: Option<String>,

    pub plan_id: Option<String>,

    pub status: String,

    pub current_period_start: Option<DateTime<Utc>>,

    pub current_period_end: Option<DateTime<Utc>>,

    #[serde(default)]
    pub cancel_at_period_end: bool,

    pub created_at: DateTime<Utc>,
}

/// A subscription list row with its plan resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRow {
    #[serde(flatten)]
    pub subscription: SubscriptionRecord,

    pub plan: Option<PlanSummary>,
}

#[derive(Deserialize)]
pub(crate) struct SubscriptionWire {
    #[serde(flatten)]
    pub subscription: SubscriptionRecord,

    #[serde(default)]
    pub plans: Option<OneOrMany<PlanSummary>>,
}

impl From<SubscriptionWire> for SubscriptionRow {
    fn from(wire: SubscriptionWire) -> Self {
        Self {
            subscription: wire.subscription,
            plan: wire.plans.and_then(OneOrMany::into_first),
        }
    }
}

/// A row of the `invoices` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: String,

    pub user_id: Option<String>,

    pub stripe_invoice_id: Option<String>,

    pub currency: Option<String>,

    /// Minor currency units
    #[serde(default)]
    pub amount_paid: i64,

    #[serde(default)]
    pub amount_due: i64,

    pub status: Option<String>,

    pub hosted_invoice_url: Option<String>,

    pub invoice_pdf: Option<String>,

    pub created_at: DateTime<Utc>,
}
