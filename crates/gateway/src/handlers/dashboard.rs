//! Dashboard aggregate handlers

use axum::{extract::State, Json};

use crate::AppState;
use vocalscale_common::{
    errors::Result,
    models::{CallRecord, DashboardStats, MonthlyTotal},
};

/// GET /api/dashboard/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<DashboardStats>> {
    Ok(Json(state.queries.dashboard_stats().await?))
}

/// GET /api/dashboard/calls-chart
pub async fn calls_chart(State(state): State<AppState>) -> Result<Json<Vec<MonthlyTotal>>> {
    Ok(Json(state.queries.calls_chart().await?))
}

/// GET /api/dashboard/recent-calls
pub async fn recent_calls(State(state): State<AppState>) -> Result<Json<Vec<CallRecord>>> {
    Ok(Json(state.queries.recent_calls().await?))
}
