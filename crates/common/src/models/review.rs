//! Review records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::business::BusinessSummary;
use super::relation::OneOrMany;

/// A row of the `reviews` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: String,

    pub business_id: Option<String>,

    pub reviewer_name: Option<String>,

    /// 1 to 5
    pub rating: i32,

    pub review_text: Option<String>,

    pub source: Option<String>,

    pub sentiment: Option<String>,

    pub review_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

/// A review list row with the owning business name resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRow {
    #[serde(flatten)]
    pub review: ReviewRecord,

    pub business_name: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct ReviewWire {
    #[serde(flatten)]
    pub review: ReviewRecord,

    #[serde(default)]
    pub businesses: Option<OneOrMany<BusinessSummary>>,
}

impl From<ReviewWire> for ReviewRow {
    fn from(wire: ReviewWire) -> Self {
        let business_name = wire
            .businesses
            .and_then(OneOrMany::into_first)
            .and_then(|b| b.business_name);

        Self {
            review: wire.review,
            business_name,
        }
    }
}
