//! Transaction engine handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::middleware::AuthenticatedUser;
use crate::models::{ApiResponse, PaginationParams};
use crate::state::AppState;
use crate::transaction::{
    AgreeMeetingRequest, CancelRequest, CreateSaleRequest, Dispute, FileDisputeRequest,
    ResolveDisputeRequest, ShipRequest, Transaction,
};

/// Dispute resolution result: the resolved dispute and the thawed transaction
#[derive(Debug, Serialize)]
pub struct DisputeResolution {
    pub dispute: Dispute,
    pub transaction: Transaction,
}

/// List the caller's transactions
pub async fn list_transactions(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<ApiResponse<Vec<Transaction>>>> {
    let (limit, offset) = pagination.to_limit_offset();
    let transactions = app_state
        .transaction_service
        .list_for_user(user.user_id, limit, offset)
        .await?;
    Ok(Json(ApiResponse::ok(transactions)))
}

/// Get a transaction the caller participates in
pub async fn get_transaction(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Transaction>>> {
    let transaction = app_state
        .transaction_service
        .get_for_user(id, user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(transaction)))
}

/// Buyer commits to a purchase
pub async fn create_sale(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateSaleRequest>,
) -> ApiResult<Json<ApiResponse<Transaction>>> {
    let transaction = app_state
        .transaction_service
        .create_sale(user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::ok(transaction)))
}

/// Payment gateway confirmation (simulated); participants only
pub async fn confirm_payment(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Transaction>>> {
    // visibility check doubles as the participant guard
    app_state
        .transaction_service
        .get_for_user(id, user.user_id)
        .await?;
    let transaction = app_state.transaction_service.confirm_payment(id).await?;
    Ok(Json(ApiResponse::ok(transaction)))
}

/// Seller (or a trade party) submits tracking code and parcel photos
pub async fn mark_shipped(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ShipRequest>,
) -> ApiResult<Json<ApiResponse<Transaction>>> {
    let transaction = app_state
        .transaction_service
        .mark_shipped(id, user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::ok(transaction)))
}

/// Delivery event (carrier callback or receiver-asserted)
pub async fn mark_delivered(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Transaction>>> {
    let transaction = app_state
        .transaction_service
        .mark_delivered(id, Some(user.user_id))
        .await?;
    Ok(Json(ApiResponse::ok(transaction)))
}

/// Confirm receipt: releases the escrow (sale) or the caller's confirmation
/// (trade)
pub async fn confirm_receipt(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Transaction>>> {
    let transaction = app_state
        .transaction_service
        .confirm_receipt(id, user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(transaction)))
}

/// Cancel a transaction
pub async fn cancel_transaction(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelRequest>,
) -> ApiResult<Json<ApiResponse<Transaction>>> {
    let transaction = app_state
        .transaction_service
        .cancel(id, Some(user.user_id), request)
        .await?;
    Ok(Json(ApiResponse::ok(transaction)))
}

/// File a dispute against a transaction
pub async fn file_dispute(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<FileDisputeRequest>,
) -> ApiResult<Json<ApiResponse<Dispute>>> {
    let dispute = app_state
        .transaction_service
        .file_dispute(id, user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::ok(dispute)))
}

/// Agree on an in-person meeting for a negotiating trade
pub async fn agree_meeting(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AgreeMeetingRequest>,
) -> ApiResult<Json<ApiResponse<Transaction>>> {
    let transaction = app_state
        .transaction_service
        .agree_meeting(id, user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::ok(transaction)))
}

/// Get a dispute the caller participates in
pub async fn get_dispute(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Dispute>>> {
    let dispute = app_state
        .transaction_service
        .get_dispute(id, user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(dispute)))
}

/// Resolve a dispute (platform operator surface)
pub async fn resolve_dispute(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ResolveDisputeRequest>,
) -> ApiResult<Json<ApiResponse<DisputeResolution>>> {
    let (dispute, transaction) = app_state
        .transaction_service
        .resolve_dispute(id, request)
        .await?;
    Ok(Json(ApiResponse::ok(DisputeResolution {
        dispute,
        transaction,
    })))
}
