//! Notification service layer
//!
//! Purely reactive: other services record an event here when something
//! happened to a transaction or trade; the only mutation a recipient can
//! make is flipping the read flag.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::notification::{Notification, NotificationType};

/// Service for creating and reading notifications
#[derive(Clone)]
pub struct NotificationService {
    db_pool: PgPool,
}

impl NotificationService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Insert a notification record
    pub async fn create(
        &self,
        user_id: Uuid,
        kind: NotificationType,
        title: &str,
        message: Option<String>,
        related_user_id: Option<Uuid>,
        related_transaction_id: Option<Uuid>,
    ) -> ApiResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, kind, title, message, related_user_id, related_transaction_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .bind(title)
        .bind(message)
        .bind(related_user_id)
        .bind(related_transaction_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(notification)
    }

    /// Best-effort variant of [`create`]: a failed notification must never
    /// fail the operation that triggered it.
    pub async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationType,
        title: &str,
        message: Option<String>,
        related_user_id: Option<Uuid>,
        related_transaction_id: Option<Uuid>,
    ) {
        if let Err(e) = self
            .create(user_id, kind, title, message, related_user_id, related_transaction_id)
            .await
        {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to record notification");
        }
    }

    /// List a user's notifications, newest first
    pub async fn list_for_user(&self, user_id: Uuid, limit: i64) -> ApiResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit.clamp(1, 100))
        .fetch_all(&self.db_pool)
        .await?;

        Ok(notifications)
    }

    /// Mark a single notification read; only the recipient may do so
    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> ApiResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Notification {} not found", id)))?;

        if notification.user_id != user_id {
            return Err(ApiError::Forbidden(
                "Only the recipient may mark a notification read".to_string(),
            ));
        }

        let updated = sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET read = TRUE WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(updated)
    }

    /// Mark all of a user's unread notifications read; returns the count
    pub async fn mark_all_read(&self, user_id: Uuid) -> ApiResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE user_id = $1 AND read = FALSE",
        )
        .bind(user_id)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected())
    }
}
