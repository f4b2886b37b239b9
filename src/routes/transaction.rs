//! Transaction and dispute route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::transaction::*;
use crate::state::AppState;

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/api/transactions", get(list_transactions))
        .route("/api/transactions", post(create_sale))
        .route("/api/transactions/:id", get(get_transaction))
        .route("/api/transactions/:id/confirm-payment", post(confirm_payment))
        .route("/api/transactions/:id/ship", post(mark_shipped))
        .route("/api/transactions/:id/deliver", post(mark_delivered))
        .route("/api/transactions/:id/confirm-receipt", post(confirm_receipt))
        .route("/api/transactions/:id/cancel", post(cancel_transaction))
        .route("/api/transactions/:id/dispute", post(file_dispute))
        .route("/api/transactions/:id/meeting", post(agree_meeting))
        .route("/api/disputes/:id", get(get_dispute))
        .route("/api/disputes/:id/resolve", post(resolve_dispute))
}
