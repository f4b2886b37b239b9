//! Card route definitions

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::handlers::card::*;
use crate::state::AppState;

pub fn card_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cards", get(list_cards))
        .route("/api/cards", post(create_card))
        .route("/api/cards/search", get(search_cards))
        .route("/api/cards/filter", get(filter_cards))
        .route("/api/cards/mine", get(my_cards))
        .route("/api/cards/:id", get(get_card))
        .route("/api/cards/:id", patch(update_card))
}
