//! Review handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::review::{CreateReviewRequest, Review};
use crate::state::AppState;

/// Reviews received by a user (public)
pub async fn list_user_reviews(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Vec<Review>>>> {
    let reviews = app_state.review_service.list_for_user(user_id).await?;
    Ok(Json(ApiResponse::ok(reviews)))
}

/// Review the counterparty of a completed transaction
pub async fn create_review(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateReviewRequest>,
) -> ApiResult<Json<ApiResponse<Review>>> {
    let review = app_state
        .review_service
        .create(user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::ok(review)))
}
