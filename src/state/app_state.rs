//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::chat::ChatService;
use crate::config::Config;
use crate::listing::ListingService;
use crate::notification::NotificationService;
use crate::profile_service::ProfileService;
use crate::proposal::ProposalService;
use crate::review::ReviewService;
use crate::transaction::TransactionService;
use crate::wishlist::WishlistService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: PgPool,
    pub listing_service: ListingService,
    pub transaction_service: TransactionService,
    pub proposal_service: ProposalService,
    pub review_service: ReviewService,
    pub notification_service: NotificationService,
    pub wishlist_service: WishlistService,
    pub chat_service: ChatService,
    pub profile_service: ProfileService,
}

impl AppState {
    /// Wire up every service over one shared pool
    pub fn new(config: Arc<Config>, db_pool: PgPool) -> Self {
        let notification_service = NotificationService::new(db_pool.clone());
        let listing_service = ListingService::new(db_pool.clone());
        let transaction_service =
            TransactionService::new(db_pool.clone(), notification_service.clone());
        let proposal_service = ProposalService::new(
            db_pool.clone(),
            transaction_service.clone(),
            notification_service.clone(),
        );
        let review_service = ReviewService::new(db_pool.clone(), notification_service.clone());
        let wishlist_service = WishlistService::new(db_pool.clone());
        let chat_service = ChatService::new(db_pool.clone(), notification_service.clone());
        let profile_service = ProfileService::new(db_pool.clone());

        Self {
            config,
            db_pool,
            listing_service,
            transaction_service,
            proposal_service,
            review_service,
            notification_service,
            wishlist_service,
            chat_service,
            profile_service,
        }
    }
}

impl FromRef<AppState> for Arc<Config> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}
