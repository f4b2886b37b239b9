//! Review route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::review::*;
use crate::state::AppState;

pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/:id/reviews", get(list_user_reviews))
        .route("/api/reviews", post(create_review))
}
