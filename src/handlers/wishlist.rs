//! Wishlist handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::state::AppState;
use crate::wishlist::{AddWishlistRequest, WishlistEntry};

/// List the caller's wishlist
pub async fn list_wishlist(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<ApiResponse<Vec<WishlistEntry>>>> {
    let entries = app_state
        .wishlist_service
        .list_for_user(user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(entries)))
}

/// Add a wishlist entry
pub async fn add_wishlist_entry(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<AddWishlistRequest>,
) -> ApiResult<Json<ApiResponse<WishlistEntry>>> {
    let entry = app_state.wishlist_service.add(user.user_id, request).await?;
    Ok(Json(ApiResponse::ok(entry)))
}

/// Remove a wishlist entry
pub async fn remove_wishlist_entry(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<()>>> {
    app_state.wishlist_service.remove(id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(())))
}
