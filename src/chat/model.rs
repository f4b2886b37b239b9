//! Chat message models
//!
//! Stored messages only; the real-time transport is out of scope.

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// A stored chat message between two users, optionally tied to a transaction
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub message: String,
    pub attachments: Vec<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for sending a message
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    #[validate(length(min = 1, message = "message must not be empty"))]
    pub message: String,
    pub transaction_id: Option<Uuid>,
    #[serde(default)]
    pub attachments: Vec<String>,
}
