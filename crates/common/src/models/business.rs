//! Business records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of the `businesses` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRecord {
    pub id: String,

    pub user_id: Option<String>,

    pub business_name: Option<String>,

    pub category: Option<String>,

    pub email: Option<String>,

    pub phone: Option<String>,

    pub website: Option<String>,

    pub description: Option<String>,

    pub address: Option<String>,

    pub city: Option<String>,

    pub state: Option<String>,

    pub zip_code: Option<String>,

    pub timezone: Option<String>,

    /// Public rating, absent until the listing has been rated
    pub rating: Option<f64>,

    pub user_ratings_total: Option<i64>,

    /// One of the `SubscriptionStatus` values, kept raw as the store holds it
    pub subscription_status: Option<String>,

    pub stripe_customer_id: Option<String>,

    pub image_url: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: Option<DateTime<Utc>>,
}

/// The business columns embedded into a user list row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessSummary {
    pub business_name: Option<String>,
    pub subscription_status: Option<String>,
    pub category: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
