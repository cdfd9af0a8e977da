//! Call records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of the `calls` table
///
/// Only `id` and `created_at` are required so that narrow projections
/// (recent calls, usage) decode into the same type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: String,

    pub user_id: Option<String>,

    pub caller_name: Option<String>,

    pub caller_phone: Option<String>,

    pub phone_number: Option<String>,

    #[serde(default)]
    pub duration_seconds: i64,

    pub transcript: Option<String>,

    pub summary: Option<String>,

    pub sentiment: Option<String>,

    pub category: Option<String>,

    pub status: Option<String>,

    #[serde(default)]
    pub is_urgent: bool,

    pub lead_score: Option<i64>,

    #[serde(default)]
    pub tags: Vec<String>,

    pub created_at: DateTime<Utc>,
}
