//! Chat service layer

use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::chat::{ChatMessage, SendMessageRequest};
use crate::error::{ApiError, ApiResult};
use crate::notification::{NotificationService, NotificationType};

/// Service for stored chat messages
#[derive(Clone)]
pub struct ChatService {
    db_pool: PgPool,
    notifier: NotificationService,
}

impl ChatService {
    pub fn new(db_pool: PgPool, notifier: NotificationService) -> Self {
        Self { db_pool, notifier }
    }

    /// Messages between two users, newest first
    pub async fn conversation(
        &self,
        user_id: Uuid,
        other_user_id: Uuid,
        limit: i64,
    ) -> ApiResult<Vec<ChatMessage>> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT * FROM chat_messages
            WHERE (sender_id = $1 AND recipient_id = $2)
               OR (sender_id = $2 AND recipient_id = $1)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(other_user_id)
        .bind(limit.clamp(1, 100))
        .fetch_all(&self.db_pool)
        .await?;

        Ok(messages)
    }

    /// Send a message
    pub async fn send(&self, sender_id: Uuid, request: SendMessageRequest) -> ApiResult<ChatMessage> {
        request.validate()?;

        if request.recipient_id == sender_id {
            return Err(ApiError::ValidationError(
                "You cannot message yourself".to_string(),
            ));
        }

        let recipient_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(request.recipient_id)
                .fetch_one(&self.db_pool)
                .await?;
        if !recipient_exists {
            return Err(ApiError::NotFound(format!(
                "User {} not found",
                request.recipient_id
            )));
        }

        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (transaction_id, sender_id, recipient_id, message, attachments)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.transaction_id)
        .bind(sender_id)
        .bind(request.recipient_id)
        .bind(request.message.trim())
        .bind(&request.attachments)
        .fetch_one(&self.db_pool)
        .await?;

        self.notifier
            .notify(
                message.recipient_id,
                NotificationType::MessageReceived,
                "New message",
                None,
                Some(sender_id),
                message.transaction_id,
            )
            .await;

        Ok(message)
    }

    /// Mark every message from the other user to the caller as read; returns
    /// the count
    pub async fn mark_conversation_read(
        &self,
        user_id: Uuid,
        other_user_id: Uuid,
    ) -> ApiResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE chat_messages
            SET read = TRUE
            WHERE sender_id = $1 AND recipient_id = $2 AND read = FALSE
            "#,
        )
        .bind(other_user_id)
        .bind(user_id)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected())
    }
}
