//! Chat handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::{ChatMessage, SendMessageRequest};
use crate::error::ApiResult;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

/// Messages between the caller and another user
pub async fn get_conversation(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(other_user_id): Path<Uuid>,
    Query(query): Query<ConversationQuery>,
) -> ApiResult<Json<ApiResponse<Vec<ChatMessage>>>> {
    let messages = app_state
        .chat_service
        .conversation(user.user_id, other_user_id, query.limit.unwrap_or(50))
        .await?;
    Ok(Json(ApiResponse::ok(messages)))
}

/// Send a message
pub async fn send_message(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<Json<ApiResponse<ChatMessage>>> {
    let message = app_state.chat_service.send(user.user_id, request).await?;
    Ok(Json(ApiResponse::ok(message)))
}

/// Mark a conversation read
pub async fn mark_conversation_read(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(other_user_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<MarkedRead>>> {
    let updated = app_state
        .chat_service
        .mark_conversation_read(user.user_id, other_user_id)
        .await?;
    Ok(Json(ApiResponse::ok(MarkedRead { updated })))
}
