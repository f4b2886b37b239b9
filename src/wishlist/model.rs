//! Wishlist models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// A desired-card record: either a concrete card reference or a free-text
/// pokemon/series/number description
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct WishlistEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub card_id: Option<Uuid>,
    pub pokemon_name: Option<String>,
    pub series: Option<String>,
    pub card_number: Option<String>,
    pub priority: WishlistPriority,
    pub max_price_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Wishlist priority
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "wishlist_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WishlistPriority {
    Low,
    Medium,
    High,
}

/// Request DTO for adding a wishlist entry
#[derive(Debug, Deserialize, Validate)]
pub struct AddWishlistRequest {
    pub card_id: Option<Uuid>,
    pub pokemon_name: Option<String>,
    pub series: Option<String>,
    pub card_number: Option<String>,
    pub priority: Option<WishlistPriority>,
    #[validate(range(min = 1, message = "max price must be positive"))]
    pub max_price_cents: Option<i64>,
}
