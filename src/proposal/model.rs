//! Trade proposal models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::transaction::Transaction;

/// Precursor to a trade transaction
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct TradeProposal {
    pub id: Uuid,
    pub proposer_id: Uuid,
    pub recipient_id: Uuid,
    pub proposer_card_id: Uuid,
    pub recipient_card_id: Uuid,
    pub status: ProposalStatus,
    pub message: Option<String>,
    pub meeting_location: Option<String>,
    pub meeting_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl TradeProposal {
    /// Whether the given user is the proposer or the recipient
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.proposer_id == user_id || self.recipient_id == user_id
    }
}

/// Proposal lifecycle status
///
/// Exactly one of accepted/rejected/cancelled terminates a pending proposal;
/// `completed` is only reached through the spawned transaction completing.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "proposal_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Completed,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Pending | ProposalStatus::Accepted)
    }
}

/// Request DTO for proposing a trade
#[derive(Debug, Deserialize)]
pub struct CreateProposalRequest {
    /// The card the proposer offers
    pub proposer_card_id: Uuid,
    /// The card the proposer wants
    pub recipient_card_id: Uuid,
    pub message: Option<String>,
    /// Present for in-person ("same city") trades
    pub meeting_location: Option<String>,
    pub meeting_at: Option<DateTime<Utc>>,
}

/// Response for a proposal acceptance: the proposal plus the trade
/// transaction it spawned
#[derive(Debug, Serialize)]
pub struct AcceptedProposal {
    pub proposal: TradeProposal,
    pub transaction: Transaction,
}
