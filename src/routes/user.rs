//! User route definitions

use axum::{routing::get, Router};

use crate::handlers::user::*;
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/api/users/:id", get(get_profile))
}
