//! Listing service layer
//!
//! Read/search/filter plus owner-side create and edit. Status changes are
//! the transaction engine's job; nothing here writes `cards.status`.

use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::listing::{Card, CreateCardRequest, FilterCardsQuery, SearchCardsQuery, UpdateCardRequest};

/// Service for card listings
#[derive(Clone)]
pub struct ListingService {
    db_pool: PgPool,
}

impl ListingService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Get a single card by ID
    pub async fn get_card(&self, id: Uuid) -> ApiResult<Card> {
        sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Card {} not found", id)))
    }

    /// List active cards, newest first
    pub async fn list_active(&self, limit: i64, offset: i64) -> ApiResult<Vec<Card>> {
        let cards = sqlx::query_as::<_, Card>(
            r#"
            SELECT * FROM cards
            WHERE status = 'active'
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(cards)
    }

    /// Substring search over name, pokemon name, and series
    pub async fn search(&self, query: SearchCardsQuery) -> ApiResult<Vec<Card>> {
        let pattern = format!("%{}%", query.query);
        let limit = i64::from(query.limit.unwrap_or(50).clamp(1, 100));

        let cards = sqlx::query_as::<_, Card>(
            r#"
            SELECT * FROM cards
            WHERE status = 'active'
              AND (name ILIKE $1 OR pokemon_name ILIKE $1 OR series ILIKE $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(cards)
    }

    /// Filter active cards with conjunctive predicates.
    ///
    /// Ordering is by creation time descending, stable on ties by primary
    /// key.
    pub async fn filter(&self, query: FilterCardsQuery) -> ApiResult<Vec<Card>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(50).clamp(1, 100);
        let offset = (page - 1) * limit;

        let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM cards WHERE status = 'active'");

        if let Some(min_price) = query.min_price_cents {
            query_builder.push(" AND price_cents >= ");
            query_builder.push_bind(min_price);
        }
        if let Some(max_price) = query.max_price_cents {
            query_builder.push(" AND price_cents <= ");
            query_builder.push_bind(max_price);
        }
        if let Some(condition) = query.condition {
            query_builder.push(" AND condition = ");
            query_builder.push_bind(condition);
        }
        if let Some(series) = query.series {
            query_builder.push(" AND series ILIKE ");
            query_builder.push_bind(format!("%{}%", series));
        }
        if let Some(accepts_trade) = query.accepts_trade {
            query_builder.push(" AND accepts_trade = ");
            query_builder.push_bind(accepts_trade);
        }

        query_builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        query_builder.push_bind(limit as i64);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(offset as i64);

        let cards = query_builder
            .build_query_as::<Card>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(cards)
    }

    /// List a user's own cards, any status
    pub async fn list_for_user(&self, user_id: Uuid) -> ApiResult<Vec<Card>> {
        let cards = sqlx::query_as::<_, Card>(
            "SELECT * FROM cards WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(cards)
    }

    /// List a new card for sale
    pub async fn create_card(&self, user_id: Uuid, request: CreateCardRequest) -> ApiResult<Card> {
        request.validate()?;

        let card = sqlx::query_as::<_, Card>(
            r#"
            INSERT INTO cards
                (user_id, name, series, card_number, pokemon_name, card_type, rarity,
                 condition, condition_score, price_cents, images, accepts_trade)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(request.name.trim())
        .bind(request.series.trim())
        .bind(request.card_number.trim())
        .bind(request.pokemon_name)
        .bind(request.card_type)
        .bind(request.rarity)
        .bind(request.condition)
        .bind(request.condition_score)
        .bind(request.price_cents)
        .bind(&request.images)
        .bind(request.accepts_trade)
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(
            card_id = %card.id,
            user_id = %user_id,
            condition = card.condition.label(),
            price_cents = card.price_cents,
            "Card listed"
        );

        Ok(card)
    }

    /// Edit an active listing; only the owner, and only while no transaction
    /// holds the card
    pub async fn update_card(
        &self,
        id: Uuid,
        user_id: Uuid,
        request: UpdateCardRequest,
    ) -> ApiResult<Card> {
        request.validate()?;

        let card = self.get_card(id).await?;
        if card.user_id != user_id {
            return Err(ApiError::Forbidden(
                "Only the owner may edit a listing".to_string(),
            ));
        }
        if card.status != crate::listing::CardStatus::Active {
            return Err(ApiError::InvalidState(
                "Only active listings can be edited".to_string(),
            ));
        }

        let updated = sqlx::query_as::<_, Card>(
            r#"
            UPDATE cards
            SET condition = COALESCE($2, condition),
                condition_score = COALESCE($3, condition_score),
                price_cents = COALESCE($4, price_cents),
                images = COALESCE($5, images),
                accepts_trade = COALESCE($6, accepts_trade),
                updated_at = now()
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.condition)
        .bind(request.condition_score)
        .bind(request.price_cents)
        .bind(request.images)
        .bind(request.accepts_trade)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| {
            ApiError::ConcurrentModification(format!(
                "Card {} was reserved while editing",
                id
            ))
        })?;

        Ok(updated)
    }
}
