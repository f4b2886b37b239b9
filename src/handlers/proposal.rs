//! Trade proposal handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::proposal::{AcceptedProposal, CreateProposalRequest, TradeProposal};
use crate::state::AppState;

/// List the caller's proposals (sent and received)
pub async fn list_proposals(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<ApiResponse<Vec<TradeProposal>>>> {
    let proposals = app_state
        .proposal_service
        .list_for_user(user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(proposals)))
}

/// Get a proposal the caller is party to
pub async fn get_proposal(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<TradeProposal>>> {
    let proposal = app_state
        .proposal_service
        .get_for_user(id, user.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(proposal)))
}

/// Propose a trade
pub async fn create_proposal(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateProposalRequest>,
) -> ApiResult<Json<ApiResponse<TradeProposal>>> {
    let proposal = app_state
        .proposal_service
        .create(user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::ok(proposal)))
}

/// Accept a pending proposal; spawns the trade transaction
pub async fn accept_proposal(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<AcceptedProposal>>> {
    let accepted = app_state.proposal_service.accept(id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(accepted)))
}

/// Reject a pending proposal
pub async fn reject_proposal(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<TradeProposal>>> {
    let proposal = app_state.proposal_service.reject(id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(proposal)))
}

/// Withdraw a pending proposal
pub async fn cancel_proposal(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<TradeProposal>>> {
    let proposal = app_state.proposal_service.cancel(id, user.user_id).await?;
    Ok(Json(ApiResponse::ok(proposal)))
}
