//! Chat route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::chat::*;
use crate::state::AppState;

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/api/chat", post(send_message))
        .route("/api/chat/:user_id", get(get_conversation))
        .route("/api/chat/:user_id/read", post(mark_conversation_read))
}
