//! Notification models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Append-only notification record addressed to one user
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationType,
    pub title: String,
    pub message: Option<String>,
    pub related_user_id: Option<Uuid>,
    pub related_transaction_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification type tags
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NewOffer,
    OfferAccepted,
    OfferRejected,
    PaymentReceived,
    ItemShipped,
    ItemDelivered,
    ReviewReceived,
    MessageReceived,
    TradeProposed,
    TradeAccepted,
    TradeCompleted,
    TradeCancelled,
    OrderCancelled,
    MeetingConfirmed,
    DisputeOpened,
    DisputeResolved,
}
