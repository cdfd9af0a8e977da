//! Profiles and the user read-models assembled around them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::billing::{InvoiceRecord, PlanRecord, PlanSummary, SubscriptionRecord};
use super::business::{BusinessRecord, BusinessSummary};
use super::call::CallRecord;
use super::relation::OneOrMany;

/// A row of the `profiles` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,

    pub user_id: String,

    pub full_name: Option<String>,

    pub business_type: Option<String>,

    pub contact_phone: Option<String>,

    pub avatar_url: Option<String>,

    pub timezone: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub(crate) struct ProfileWire {
    #[serde(flatten)]
    pub profile: Profile,

    #[serde(default)]
    pub businesses: Option<OneOrMany<BusinessSummary>>,
}

/// The subscription columns fetched for the user list fan-out
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserSubscriptionWire {
    pub user_id: String,

    pub status: Option<String>,

    #[serde(default)]
    pub plans: Option<OneOrMany<PlanSummary>>,
}

/// One row of the user list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub full_name: String,
    /// Owned by the auth provider; left empty here
    pub email: String,
    pub phone: String,
    pub business_name: String,
    pub subscription_status: String,
    pub plan_name: String,
    pub plan_price: Option<i64>,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub total_calls: u64,
}

impl UserSummary {
    /// Derive a list row from a profile and its (optional) related records
    pub(crate) fn assemble(
        profile: Profile,
        business: Option<BusinessSummary>,
        subscription_status: Option<String>,
        plan: Option<PlanSummary>,
        total_calls: u64,
    ) -> Self {
        let business = business.unwrap_or_default();

        let status = business
            .subscription_status
            .filter(|s| !s.is_empty())
            .or(subscription_status)
            .unwrap_or_else(|| "inactive".to_string());

        let (plan_name, plan_price) = match plan {
            Some(plan) => (
                plan.name.unwrap_or_else(|| "Free".to_string()),
                plan.price_amount,
            ),
            None => ("Free".to_string(), None),
        };

        Self {
            id: profile.user_id,
            full_name: profile
                .full_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "N/A".to_string()),
            email: String::new(),
            phone: profile.contact_phone.unwrap_or_default(),
            business_name: business
                .business_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "No business".to_string()),
            subscription_status: status,
            plan_name,
            plan_price,
            category: business.category.unwrap_or_default(),
            created_at: profile.created_at,
            total_calls,
        }
    }
}

/// The most recent subscription of a user together with its plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionDetail {
    #[serde(flatten)]
    pub subscription: SubscriptionRecord,

    pub plan: Option<PlanRecord>,
}

/// Call usage for the detail view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    /// Exact number of calls the store holds for the user
    pub total_calls: u64,

    /// Sum of `duration_seconds` over `recent_calls` only, not a lifetime total
    pub total_duration_seconds: i64,

    /// Newest calls, capped
    pub recent_calls: Vec<CallRecord>,
}

/// Composite user detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub id: String,
    pub full_name: String,
    pub phone: String,
    pub avatar_url: Option<String>,
    pub timezone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub business: Option<BusinessRecord>,
    pub subscription: Option<SubscriptionDetail>,
    pub usage: UsageStats,
    pub invoices: Vec<InvoiceRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            id: "p-1".into(),
            user_id: "u-1".into(),
            full_name: None,
            business_type: None,
            contact_phone: None,
            avatar_url: None,
            timezone: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_defaults_when_nothing_is_joined() {
        let row = UserSummary::assemble(profile(), None, None, None, 0);
        assert_eq!(row.id, "u-1");
        assert_eq!(row.full_name, "N/A");
        assert_eq!(row.business_name, "No business");
        assert_eq!(row.subscription_status, "inactive");
        assert_eq!(row.plan_name, "Free");
        assert_eq!(row.phone, "");
    }

    #[test]
    fn test_business_status_wins_over_subscription() {
        let business = BusinessSummary {
            business_name: Some("Joe's Pizza".into()),
            subscription_status: Some("trialing".into()),
            category: Some("restaurant".into()),
            created_at: None,
        };
        let plan = PlanSummary {
            name: Some("Pro".into()),
            price_amount: Some(4900),
            interval: None,
        };

        let row = UserSummary::assemble(
            profile(),
            Some(business),
            Some("active".into()),
            Some(plan),
            3,
        );
        assert_eq!(row.subscription_status, "trialing");
        assert_eq!(row.plan_name, "Pro");
        assert_eq!(row.plan_price, Some(4900));
        assert_eq!(row.total_calls, 3);
    }

    #[test]
    fn test_subscription_status_used_without_business() {
        let row = UserSummary::assemble(profile(), None, Some("past_due".into()), None, 0);
        assert_eq!(row.subscription_status, "past_due");
    }
}
