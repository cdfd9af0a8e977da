//! User list and user detail handlers

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use tracing::instrument;

use super::params::{page_response, ListQuery};
use crate::AppState;
use vocalscale_common::{errors::Result, models::UserDetail};

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response> {
    let params = query.list_params();
    let page = state.queries.list_users(params.clone()).await?;
    Ok(page_response(page, &params, query.wants_table()))
}

/// GET /api/users/{id}
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserDetail>> {
    Ok(Json(state.queries.user_detail(&user_id).await?))
}
