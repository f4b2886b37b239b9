//! Notification handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::notification::Notification;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

/// List the caller's notifications
pub async fn list_notifications(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<ApiResponse<Vec<Notification>>>> {
    let notifications = app_state
        .notification_service
        .list_for_user(user.user_id, 50)
        .await?;
    Ok(Json(ApiResponse::ok(notifications)))
}

/// Mark one notification read
pub async fn mark_notification_read(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Notification>>> {
    let notification = app_state
        .notification_service
        .mark_read(id, user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(notification)))
}

/// Mark all of the caller's notifications read
pub async fn mark_all_notifications_read(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<ApiResponse<MarkedRead>>> {
    let updated = app_state
        .notification_service
        .mark_all_read(user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(MarkedRead { updated })))
}
