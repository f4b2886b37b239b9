//! Review service layer
//!
//! Records post-completion reviews and folds them into the reviewee's rating
//! aggregate in the same database transaction.

use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::notification::{NotificationService, NotificationType};
use crate::review::{CreateReviewRequest, Review};
use crate::transaction::{Transaction, TransactionStatus};

/// Service for reviews and rating aggregation
#[derive(Clone)]
pub struct ReviewService {
    db_pool: PgPool,
    notifier: NotificationService,
}

impl ReviewService {
    pub fn new(db_pool: PgPool, notifier: NotificationService) -> Self {
        Self { db_pool, notifier }
    }

    /// Create a review for a completed transaction.
    ///
    /// At most one review per (transaction, direction); the counterparty is
    /// derived from the transaction, never taken from the caller.
    pub async fn create(&self, author_id: Uuid, request: CreateReviewRequest) -> ApiResult<Review> {
        request.validate()?;

        let transaction = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE id = $1",
        )
        .bind(request.transaction_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Transaction {} not found", request.transaction_id))
        })?;

        if !transaction.is_party(author_id) {
            return Err(ApiError::Forbidden(
                "Only a participant may review this transaction".to_string(),
            ));
        }
        if transaction.status != TransactionStatus::Completed {
            return Err(ApiError::InvalidState(format!(
                "Reviews require a completed transaction, not {:?}",
                transaction.status
            )));
        }

        let to_user_id = transaction.counterparty_of(author_id);

        let mut db_tx = self.db_pool.begin().await?;

        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews
                (transaction_id, from_user_id, to_user_id, rating, comment,
                 card_condition_accuracy, communication_rating, shipping_rating, photos)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(transaction.id)
        .bind(author_id)
        .bind(to_user_id)
        .bind(request.rating)
        .bind(request.comment)
        .bind(request.card_condition_accuracy)
        .bind(request.communication_rating)
        .bind(request.shipping_rating)
        .bind(&request.photos)
        .fetch_one(&mut *db_tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::InvalidState(
                    "You have already reviewed this transaction".to_string(),
                )
            } else {
                e.into()
            }
        })?;

        // Fold the rating into the reviewee's aggregate
        sqlx::query(
            r#"
            UPDATE users
            SET rating_avg = (rating_avg * rating_count + $2) / (rating_count + 1),
                rating_count = rating_count + 1,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(to_user_id)
        .bind(f64::from(request.rating))
        .execute(&mut *db_tx)
        .await?;

        db_tx.commit().await?;

        self.notifier
            .notify(
                to_user_id,
                NotificationType::ReviewReceived,
                "You received a review",
                review.comment.clone(),
                Some(author_id),
                Some(transaction.id),
            )
            .await;

        Ok(review)
    }

    /// List reviews received by a user, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> ApiResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(
            "SELECT * FROM reviews WHERE to_user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(reviews)
    }
}

/// Postgres unique-violation (SQLSTATE 23505)
fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}
