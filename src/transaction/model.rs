//! Transaction and dispute models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Escrow-mediated exchange between a buyer and a seller
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Transaction {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub card_id: Uuid,
    pub trade_card_id: Option<Uuid>,
    pub kind: TransactionKind,
    pub amount_cents: i64,
    pub trade_amount_cents: Option<i64>,
    pub fee_cents: i64,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    pub payment_ref: Option<String>,
    pub status: TransactionStatus,
    pub buyer_side: Option<TradeSideStatus>,
    pub seller_side: Option<TradeSideStatus>,
    pub tracking_code: Option<String>,
    pub buyer_tracking_code: Option<String>,
    pub tracking_url: Option<String>,
    pub seller_photos: Vec<String>,
    pub buyer_photos: Vec<String>,
    pub meeting_location: Option<String>,
    pub meeting_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Whether the given user is a party to this transaction
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }

    /// The other party, from the given user's point of view
    pub fn counterparty_of(&self, user_id: Uuid) -> Uuid {
        if self.buyer_id == user_id {
            self.seller_id
        } else {
            self.buyer_id
        }
    }
}

/// Transaction kind
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "transaction_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Sale,
    Trade,
}

/// Payment methods accepted at checkout
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Pix,
    BankTransfer,
    InPerson,
}

/// Payment (escrow funding) status, tracked separately from the lifecycle
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

/// Overall transaction lifecycle status
///
/// `negotiating` only occurs for in-person trades before the meeting is
/// agreed; sales and online trades start at `pending`.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Negotiating,
    Pending,
    PaymentConfirmed,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    Disputed,
}

/// Per-side progress of a trade's two parcels
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "trade_side_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TradeSideStatus {
    Packaging,
    Shipped,
    Delivered,
    Confirmed,
}

/// Dispute raised against a transaction by one of its parties
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Dispute {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub reported_by_user_id: Uuid,
    pub reported_user_id: Uuid,
    pub reason: String,
    pub description: Option<String>,
    pub evidence: Vec<String>,
    pub status: DisputeStatus,
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Dispute lifecycle status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "dispute_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    UnderReview,
    Resolved,
    Closed,
}

/// Request DTO for creating a sale transaction
#[derive(Debug, Deserialize)]
pub struct CreateSaleRequest {
    pub card_id: Uuid,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

/// Request DTO for marking a transaction shipped
#[derive(Debug, Deserialize, Validate)]
pub struct ShipRequest {
    #[validate(length(min = 1, message = "tracking code must not be empty"))]
    pub tracking_code: String,
    pub tracking_url: Option<String>,
    /// Photo URIs of the packed parcel
    #[serde(default)]
    pub photos: Vec<String>,
}

/// Request DTO for cancelling a transaction
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

/// Request DTO for filing a dispute
#[derive(Debug, Deserialize, Validate)]
pub struct FileDisputeRequest {
    #[validate(length(min = 1, message = "reason must not be empty"))]
    pub reason: String,
    pub description: Option<String>,
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// Outcome of a resolved dispute
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisputeOutcome {
    /// Release the escrow to the seller; the transaction completes
    Release,
    /// Refund the buyer; the transaction is cancelled
    Refund,
}

/// Request DTO for resolving a dispute
#[derive(Debug, Deserialize, Validate)]
pub struct ResolveDisputeRequest {
    #[validate(length(min = 1, message = "resolution must not be empty"))]
    pub resolution: String,
    pub outcome: DisputeOutcome,
}

/// Request DTO for agreeing on an in-person trade meeting
#[derive(Debug, Deserialize, Validate)]
pub struct AgreeMeetingRequest {
    #[validate(length(min = 1, message = "meeting location must not be empty"))]
    pub location: String,
    pub meeting_at: DateTime<Utc>,
}
