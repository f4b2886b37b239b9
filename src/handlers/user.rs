//! User profile handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{ApiResponse, UserProfile};
use crate::state::AppState;

/// Public profile with rating and volume aggregates
pub async fn get_profile(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<UserProfile>>> {
    let profile = app_state.profile_service.get_profile(user_id).await?;
    Ok(Json(ApiResponse::ok(profile)))
}
