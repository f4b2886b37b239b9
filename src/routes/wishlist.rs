//! Wishlist route definitions

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::wishlist::*;
use crate::state::AppState;

pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/api/wishlist", get(list_wishlist))
        .route("/api/wishlist", post(add_wishlist_entry))
        .route("/api/wishlist/:id", delete(remove_wishlist_entry))
}
