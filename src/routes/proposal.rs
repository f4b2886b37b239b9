//! Trade proposal route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::proposal::*;
use crate::state::AppState;

pub fn proposal_routes() -> Router<AppState> {
    Router::new()
        .route("/api/proposals", get(list_proposals))
        .route("/api/proposals", post(create_proposal))
        .route("/api/proposals/:id", get(get_proposal))
        .route("/api/proposals/:id/accept", post(accept_proposal))
        .route("/api/proposals/:id/reject", post(reject_proposal))
        .route("/api/proposals/:id/cancel", post(cancel_proposal))
}
