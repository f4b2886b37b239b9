//! Wishlist service layer

use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::wishlist::{AddWishlistRequest, WishlistEntry, WishlistPriority};

/// Service for per-user wishlists
#[derive(Clone)]
pub struct WishlistService {
    db_pool: PgPool,
}

impl WishlistService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// List a user's wishlist, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> ApiResult<Vec<WishlistEntry>> {
        let entries = sqlx::query_as::<_, WishlistEntry>(
            "SELECT * FROM wishlist WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(entries)
    }

    /// Add a wishlist entry; needs a card reference or at least a pokemon
    /// name to be meaningful
    pub async fn add(&self, user_id: Uuid, request: AddWishlistRequest) -> ApiResult<WishlistEntry> {
        request.validate()?;

        if request.card_id.is_none() && request.pokemon_name.is_none() {
            return Err(ApiError::ValidationError(
                "A wishlist entry needs a card reference or a pokemon name".to_string(),
            ));
        }

        if let Some(card_id) = request.card_id {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM cards WHERE id = $1)")
                    .bind(card_id)
                    .fetch_one(&self.db_pool)
                    .await?;
            if !exists {
                return Err(ApiError::NotFound(format!("Card {} not found", card_id)));
            }
        }

        let entry = sqlx::query_as::<_, WishlistEntry>(
            r#"
            INSERT INTO wishlist
                (user_id, card_id, pokemon_name, series, card_number, priority, max_price_cents)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(request.card_id)
        .bind(request.pokemon_name)
        .bind(request.series)
        .bind(request.card_number)
        .bind(request.priority.unwrap_or(WishlistPriority::Medium))
        .bind(request.max_price_cents)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(entry)
    }

    /// Remove a wishlist entry; only the owner may do so
    pub async fn remove(&self, id: Uuid, user_id: Uuid) -> ApiResult<()> {
        let entry = sqlx::query_as::<_, WishlistEntry>("SELECT * FROM wishlist WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Wishlist entry {} not found", id)))?;

        if entry.user_id != user_id {
            return Err(ApiError::Forbidden(
                "Only the owner may remove a wishlist entry".to_string(),
            ));
        }

        sqlx::query("DELETE FROM wishlist WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await?;

        Ok(())
    }
}
