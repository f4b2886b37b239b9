//! Trade proposal service layer

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::listing::{Card, CardStatus};
use crate::notification::{NotificationService, NotificationType};
use crate::proposal::{AcceptedProposal, CreateProposalRequest, ProposalStatus, TradeProposal};
use crate::transaction::TransactionService;

/// Service for trade proposals
#[derive(Clone)]
pub struct ProposalService {
    db_pool: PgPool,
    engine: TransactionService,
    notifier: NotificationService,
}

impl ProposalService {
    pub fn new(db_pool: PgPool, engine: TransactionService, notifier: NotificationService) -> Self {
        Self {
            db_pool,
            engine,
            notifier,
        }
    }

    /// Propose a trade: the proposer offers one of their cards for one of
    /// the recipient's. The recipient is derived from the wanted card.
    pub async fn create(
        &self,
        proposer_id: Uuid,
        request: CreateProposalRequest,
    ) -> ApiResult<TradeProposal> {
        let proposer_card = self.fetch_card(request.proposer_card_id).await?;
        let recipient_card = self.fetch_card(request.recipient_card_id).await?;

        if proposer_card.user_id != proposer_id {
            return Err(ApiError::Forbidden(
                "You can only offer a card you own".to_string(),
            ));
        }
        if recipient_card.user_id == proposer_id {
            return Err(ApiError::ValidationError(
                "You cannot propose a trade with yourself".to_string(),
            ));
        }
        if proposer_card.status != CardStatus::Active || recipient_card.status != CardStatus::Active
        {
            return Err(ApiError::InvalidState(
                "Both cards must be active to propose a trade".to_string(),
            ));
        }
        if !recipient_card.accepts_trade {
            return Err(ApiError::ValidationError(
                "The wanted card is not open to trades".to_string(),
            ));
        }

        let proposal = sqlx::query_as::<_, TradeProposal>(
            r#"
            INSERT INTO trade_proposals
                (proposer_id, recipient_id, proposer_card_id, recipient_card_id,
                 message, meeting_location, meeting_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(proposer_id)
        .bind(recipient_card.user_id)
        .bind(proposer_card.id)
        .bind(recipient_card.id)
        .bind(request.message)
        .bind(request.meeting_location)
        .bind(request.meeting_at)
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(proposal_id = %proposal.id, proposer_id = %proposer_id, "Trade proposed");

        self.notifier
            .notify(
                proposal.recipient_id,
                NotificationType::TradeProposed,
                "New trade proposal",
                Some(format!(
                    "\"{}\" offered for your \"{}\"",
                    proposer_card.name, recipient_card.name
                )),
                Some(proposer_id),
                None,
            )
            .await;

        Ok(proposal)
    }

    /// Get a proposal visible to the given party
    pub async fn get_for_user(&self, id: Uuid, user_id: Uuid) -> ApiResult<TradeProposal> {
        let proposal = self.fetch(id).await?;
        if !proposal.is_party(user_id) {
            return Err(ApiError::Forbidden(
                "Only a party may view this proposal".to_string(),
            ));
        }
        Ok(proposal)
    }

    /// List proposals where the user is proposer or recipient, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> ApiResult<Vec<TradeProposal>> {
        let proposals = sqlx::query_as::<_, TradeProposal>(
            r#"
            SELECT * FROM trade_proposals
            WHERE proposer_id = $1 OR recipient_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(proposals)
    }

    /// Accept a pending proposal and spawn its trade transaction
    pub async fn accept(&self, id: Uuid, by_user: Uuid) -> ApiResult<AcceptedProposal> {
        let proposal = self.fetch(id).await?;
        if proposal.recipient_id != by_user {
            return Err(ApiError::Forbidden(
                "Only the recipient may accept a proposal".to_string(),
            ));
        }
        self.ensure_pending(&proposal)?;

        let accepted = sqlx::query_as::<_, TradeProposal>(
            r#"
            UPDATE trade_proposals
            SET status = 'accepted', responded_at = now()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| {
            ApiError::ConcurrentModification(format!("Proposal {} was answered concurrently", id))
        })?;

        let transaction = self.engine.create_trade(&accepted).await?;

        self.notifier
            .notify(
                accepted.proposer_id,
                NotificationType::TradeAccepted,
                "Trade proposal accepted",
                Some("Pay your guarantee amount to start the exchange".to_string()),
                Some(accepted.recipient_id),
                Some(transaction.id),
            )
            .await;

        Ok(AcceptedProposal {
            proposal: accepted,
            transaction,
        })
    }

    /// Reject a pending proposal (recipient only)
    pub async fn reject(&self, id: Uuid, by_user: Uuid) -> ApiResult<TradeProposal> {
        let proposal = self.fetch(id).await?;
        if proposal.recipient_id != by_user {
            return Err(ApiError::Forbidden(
                "Only the recipient may reject a proposal".to_string(),
            ));
        }
        self.ensure_pending(&proposal)?;

        let rejected = self.terminate(id, ProposalStatus::Rejected).await?;

        self.notifier
            .notify(
                rejected.proposer_id,
                NotificationType::OfferRejected,
                "Trade proposal rejected",
                None,
                Some(rejected.recipient_id),
                None,
            )
            .await;

        Ok(rejected)
    }

    /// Withdraw a pending proposal (proposer only)
    pub async fn cancel(&self, id: Uuid, by_user: Uuid) -> ApiResult<TradeProposal> {
        let proposal = self.fetch(id).await?;
        if proposal.proposer_id != by_user {
            return Err(ApiError::Forbidden(
                "Only the proposer may withdraw a proposal".to_string(),
            ));
        }
        self.ensure_pending(&proposal)?;

        self.terminate(id, ProposalStatus::Cancelled).await
    }

    // ===== Private helpers =====

    async fn fetch(&self, id: Uuid) -> ApiResult<TradeProposal> {
        sqlx::query_as::<_, TradeProposal>("SELECT * FROM trade_proposals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Proposal {} not found", id)))
    }

    async fn fetch_card(&self, id: Uuid) -> ApiResult<Card> {
        sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Card {} not found", id)))
    }

    /// A proposal can only be answered while pending
    fn ensure_pending(&self, proposal: &TradeProposal) -> ApiResult<()> {
        if proposal.status != ProposalStatus::Pending {
            return Err(ApiError::InvalidState(format!(
                "Proposal is already {:?}",
                proposal.status
            )));
        }
        Ok(())
    }

    async fn terminate(&self, id: Uuid, status: ProposalStatus) -> ApiResult<TradeProposal> {
        sqlx::query_as::<_, TradeProposal>(
            r#"
            UPDATE trade_proposals
            SET status = $2, responded_at = now()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| {
            ApiError::ConcurrentModification(format!("Proposal {} was answered concurrently", id))
        })
    }
}
