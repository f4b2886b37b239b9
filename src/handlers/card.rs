//! Card listing handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::listing::{
    Card, CreateCardRequest, FilterCardsQuery, SearchCardsQuery, UpdateCardRequest,
};
use crate::middleware::AuthenticatedUser;
use crate::models::{ApiResponse, PaginationParams};
use crate::state::AppState;

/// List active cards, newest first
pub async fn list_cards(
    State(app_state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<ApiResponse<Vec<Card>>>> {
    let (limit, offset) = pagination.to_limit_offset();
    let cards = app_state.listing_service.list_active(limit, offset).await?;
    Ok(Json(ApiResponse::ok(cards)))
}

/// Substring search over active cards
pub async fn search_cards(
    State(app_state): State<AppState>,
    Query(query): Query<SearchCardsQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Card>>>> {
    let cards = app_state.listing_service.search(query).await?;
    Ok(Json(ApiResponse::ok(cards)))
}

/// Filter active cards with conjunctive predicates
pub async fn filter_cards(
    State(app_state): State<AppState>,
    Query(query): Query<FilterCardsQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Card>>>> {
    let cards = app_state.listing_service.filter(query).await?;
    Ok(Json(ApiResponse::ok(cards)))
}

/// Get a single card
pub async fn get_card(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Card>>> {
    let card = app_state.listing_service.get_card(id).await?;
    Ok(Json(ApiResponse::ok(card)))
}

/// List the caller's own cards
pub async fn my_cards(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<ApiResponse<Vec<Card>>>> {
    let cards = app_state
        .listing_service
        .list_for_user(user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(cards)))
}

/// List a new card
pub async fn create_card(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateCardRequest>,
) -> ApiResult<Json<ApiResponse<Card>>> {
    let card = app_state
        .listing_service
        .create_card(user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::ok(card)))
}

/// Edit an active listing
pub async fn update_card(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCardRequest>,
) -> ApiResult<Json<ApiResponse<Card>>> {
    let card = app_state
        .listing_service
        .update_card(id, user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::ok(card)))
}
