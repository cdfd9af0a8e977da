//! Entity list handlers

use axum::{
    extract::{Query, State},
    response::Response,
    Json,
};

use super::params::{page_response, ListQuery};
use crate::AppState;
use vocalscale_common::{errors::Result, models::PlanRecord};

/// GET /api/businesses
pub async fn list_businesses(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response> {
    let params = query.list_params();
    let page = state.queries.list_businesses(params.clone()).await?;
    Ok(page_response(page, &params, query.wants_table()))
}

/// GET /api/calls
pub async fn list_calls(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response> {
    let filter = query.calls_filter();
    let params = filter.list.clone();
    let page = state.queries.list_calls(filter).await?;
    Ok(page_response(page, &params, query.wants_table()))
}

/// GET /api/reviews
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response> {
    let filter = query.reviews_filter()?;
    let params = filter.list.clone();
    let page = state.queries.list_reviews(filter).await?;
    Ok(page_response(page, &params, query.wants_table()))
}

/// GET /api/subscriptions
pub async fn list_subscriptions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response> {
    let params = query.list_params();
    let page = state.queries.list_subscriptions(params.clone()).await?;
    Ok(page_response(page, &params, query.wants_table()))
}

/// GET /api/plans
pub async fn list_plans(State(state): State<AppState>) -> Result<Json<Vec<PlanRecord>>> {
    Ok(Json(state.queries.list_plans().await?))
}
