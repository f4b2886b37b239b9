//! Transaction engine service layer
//!
//! Creates and advances Sale and Trade transactions through the escrow
//! lifecycle. Every mutating operation re-reads the current row, applies the
//! lazy shipment-deadline rule, validates the transition guard, and then
//! applies the transition with a conditional UPDATE keyed on the expected
//! current status. Zero affected rows means another caller advanced the
//! transaction first and surfaces as `ConcurrentModification`.

use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::listing::Card;
use crate::notification::{NotificationService, NotificationType};
use crate::proposal::{ProposalStatus, TradeProposal};
use crate::transaction::lifecycle;
use crate::transaction::{
    AgreeMeetingRequest, CancelRequest, CreateSaleRequest, Dispute, DisputeOutcome, DisputeStatus,
    FileDisputeRequest, PaymentMethod, PaymentStatus, ResolveDisputeRequest, ShipRequest,
    TradeSideStatus, Transaction, TransactionKind, TransactionStatus,
};

use validator::Validate;

/// Cancellation reason recorded when the shipment window lapses
const DEADLINE_CANCEL_REASON: &str = "shipment deadline elapsed";

/// Transaction engine for the escrow lifecycle
#[derive(Clone)]
pub struct TransactionService {
    db_pool: PgPool,
    notifier: NotificationService,
}

impl TransactionService {
    pub fn new(db_pool: PgPool, notifier: NotificationService) -> Self {
        Self { db_pool, notifier }
    }

    // ===== Reads =====

    /// Get a transaction visible to the given participant
    pub async fn get_for_user(&self, id: Uuid, user_id: Uuid) -> ApiResult<Transaction> {
        let transaction = self.fetch(id).await?;
        if !transaction.is_party(user_id) {
            return Err(ApiError::Forbidden(
                "Only a participant may view this transaction".to_string(),
            ));
        }
        self.enforce_shipment_deadline(transaction).await
    }

    /// List transactions where the user is buyer or seller, newest first
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Transaction>> {
        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE buyer_id = $1 OR seller_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(transactions)
    }

    // ===== Sale creation =====

    /// Create a sale transaction: the buyer commits to a purchase.
    ///
    /// Reserves the card (active -> pending) and opens the escrow in one
    /// database transaction, so a card can never be the subject of two live
    /// transactions.
    pub async fn create_sale(
        &self,
        buyer_id: Uuid,
        request: CreateSaleRequest,
    ) -> ApiResult<Transaction> {
        let buyer_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(buyer_id)
                .fetch_one(&self.db_pool)
                .await?;
        if !buyer_exists {
            return Err(ApiError::NotFound(format!("Buyer {} not found", buyer_id)));
        }

        let card = sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1")
            .bind(request.card_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Card {} not found", request.card_id)))?;

        if card.user_id == buyer_id {
            return Err(ApiError::ValidationError(
                "You cannot buy your own card".to_string(),
            ));
        }

        let fee_cents = lifecycle::sale_fee_cents(card.price_cents);

        let mut db_tx = self.db_pool.begin().await?;

        let reserved = sqlx::query(
            "UPDATE cards SET status = 'pending', updated_at = now() WHERE id = $1 AND status = 'active'",
        )
        .bind(card.id)
        .execute(&mut *db_tx)
        .await?;
        if reserved.rows_affected() == 0 {
            return Err(ApiError::InvalidState(
                "Card is not available for purchase".to_string(),
            ));
        }

        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions
                (buyer_id, seller_id, card_id, kind, amount_cents, fee_cents, payment_method, notes)
            VALUES ($1, $2, $3, 'sale', $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(buyer_id)
        .bind(card.user_id)
        .bind(card.id)
        .bind(card.price_cents)
        .bind(fee_cents)
        .bind(request.payment_method)
        .bind(request.notes)
        .fetch_one(&mut *db_tx)
        .await?;

        db_tx.commit().await?;

        tracing::info!(
            transaction_id = %transaction.id,
            card_id = %card.id,
            amount_cents = transaction.amount_cents,
            "Sale transaction created"
        );

        self.notifier
            .notify(
                card.user_id,
                NotificationType::NewOffer,
                "Your card has a buyer",
                Some(format!("\"{}\" is reserved while payment is pending", card.name)),
                Some(buyer_id),
                Some(transaction.id),
            )
            .await;

        Ok(transaction)
    }

    // ===== Trade creation =====

    /// Spawn the trade transaction for an accepted proposal.
    ///
    /// The proposer is the buyer side and the recipient the seller side; each
    /// party's card price is their guarantee amount. In-person proposals
    /// (those carrying a meeting location) start in `negotiating`.
    pub async fn create_trade(&self, proposal: &TradeProposal) -> ApiResult<Transaction> {
        if proposal.status != ProposalStatus::Accepted {
            return Err(ApiError::InvalidState(
                "Only an accepted proposal can spawn a trade transaction".to_string(),
            ));
        }
        if proposal.transaction_id.is_some() {
            return Err(ApiError::InvalidState(
                "Proposal has already spawned a transaction".to_string(),
            ));
        }

        let proposer_card = self.fetch_card(proposal.proposer_card_id).await?;
        let recipient_card = self.fetch_card(proposal.recipient_card_id).await?;

        let in_person = proposal.meeting_location.is_some();
        let status = if in_person {
            TransactionStatus::Negotiating
        } else {
            TransactionStatus::Pending
        };
        let payment_method = in_person.then_some(PaymentMethod::InPerson);

        let mut db_tx = self.db_pool.begin().await?;

        for card in [&proposer_card, &recipient_card] {
            let reserved = sqlx::query(
                "UPDATE cards SET status = 'pending', updated_at = now() WHERE id = $1 AND status = 'active'",
            )
            .bind(card.id)
            .execute(&mut *db_tx)
            .await?;
            if reserved.rows_affected() == 0 {
                return Err(ApiError::InvalidState(format!(
                    "Card \"{}\" is no longer available",
                    card.name
                )));
            }
        }

        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions
                (buyer_id, seller_id, card_id, trade_card_id, kind, amount_cents,
                 trade_amount_cents, fee_cents, payment_method, status,
                 buyer_side, seller_side, meeting_location, meeting_at)
            VALUES ($1, $2, $3, $4, 'trade', $5, $6, 0, $7, $8,
                    'packaging', 'packaging', $9, $10)
            RETURNING *
            "#,
        )
        .bind(proposal.proposer_id)
        .bind(proposal.recipient_id)
        .bind(recipient_card.id)
        .bind(proposer_card.id)
        .bind(recipient_card.price_cents)
        .bind(proposer_card.price_cents)
        .bind(payment_method)
        .bind(status)
        .bind(&proposal.meeting_location)
        .bind(proposal.meeting_at)
        .fetch_one(&mut *db_tx)
        .await?;

        sqlx::query("UPDATE trade_proposals SET transaction_id = $1 WHERE id = $2")
            .bind(transaction.id)
            .bind(proposal.id)
            .execute(&mut *db_tx)
            .await?;

        db_tx.commit().await?;

        tracing::info!(
            transaction_id = %transaction.id,
            proposal_id = %proposal.id,
            in_person,
            "Trade transaction created"
        );

        Ok(transaction)
    }

    // ===== Lifecycle transitions =====

    /// Confirm payment of the escrow amount (simulated gateway).
    ///
    /// For sales this is the buyer's price + fee; for trades both parties'
    /// guarantee amounts are charged together.
    pub async fn confirm_payment(&self, id: Uuid) -> ApiResult<Transaction> {
        let transaction = self.fetch(id).await?;
        let transaction = self.enforce_shipment_deadline(transaction).await?;

        if transaction.status != TransactionStatus::Pending {
            return Err(ApiError::InvalidState(format!(
                "Cannot confirm payment while transaction is {:?}",
                transaction.status
            )));
        }

        // Simulated payment gateway reference
        let payment_ref = format!("pay_{:016x}", rand::thread_rng().gen::<u64>());

        let updated = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = 'payment_confirmed',
                payment_status = 'completed',
                payment_ref = $2,
                payment_confirmed_at = now(),
                updated_at = now()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&payment_ref)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| concurrent(id, "confirm payment"))?;

        // For trades both parties are shippers; both get the deadline notice
        let recipients = match updated.kind {
            TransactionKind::Sale => vec![updated.seller_id],
            TransactionKind::Trade => vec![updated.buyer_id, updated.seller_id],
        };
        for recipient in recipients {
            self.notifier
                .notify(
                    recipient,
                    NotificationType::PaymentReceived,
                    "Payment confirmed",
                    Some(format!(
                        "Funds are held in escrow. Ship within {} days.",
                        lifecycle::SHIPMENT_DEADLINE_DAYS
                    )),
                    Some(updated.counterparty_of(recipient)),
                    Some(updated.id),
                )
                .await;
        }

        Ok(updated)
    }

    /// Mark a transaction (or the caller's side of a trade) shipped
    pub async fn mark_shipped(
        &self,
        id: Uuid,
        by_user: Uuid,
        request: ShipRequest,
    ) -> ApiResult<Transaction> {
        request.validate()?;
        if request.tracking_code.trim().is_empty() {
            return Err(ApiError::ValidationError(
                "tracking code must not be empty".to_string(),
            ));
        }

        let transaction = self.fetch(id).await?;
        let transaction = self.enforce_shipment_deadline(transaction).await?;

        match transaction.kind {
            TransactionKind::Sale => self.mark_sale_shipped(transaction, by_user, request).await,
            TransactionKind::Trade => self.mark_trade_shipped(transaction, by_user, request).await,
        }
    }

    async fn mark_sale_shipped(
        &self,
        transaction: Transaction,
        by_user: Uuid,
        request: ShipRequest,
    ) -> ApiResult<Transaction> {
        if by_user != transaction.seller_id {
            return Err(ApiError::Forbidden(
                "Only the seller can mark a sale shipped".to_string(),
            ));
        }
        if transaction.status != TransactionStatus::PaymentConfirmed {
            return Err(ApiError::InvalidState(format!(
                "Cannot ship while transaction is {:?}",
                transaction.status
            )));
        }

        let updated = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = 'shipped',
                tracking_code = $2,
                tracking_url = $3,
                seller_photos = $4,
                updated_at = now()
            WHERE id = $1 AND status = 'payment_confirmed'
            RETURNING *
            "#,
        )
        .bind(transaction.id)
        .bind(request.tracking_code.trim())
        .bind(request.tracking_url)
        .bind(&request.photos)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| concurrent(transaction.id, "mark shipped"))?;

        self.notifier
            .notify(
                updated.buyer_id,
                NotificationType::ItemShipped,
                "Your card is on the way",
                updated.tracking_code.clone(),
                Some(updated.seller_id),
                Some(updated.id),
            )
            .await;

        Ok(updated)
    }

    async fn mark_trade_shipped(
        &self,
        transaction: Transaction,
        by_user: Uuid,
        request: ShipRequest,
    ) -> ApiResult<Transaction> {
        if !transaction.is_party(by_user) {
            return Err(ApiError::Forbidden(
                "Only a trade participant can ship".to_string(),
            ));
        }
        if !matches!(
            transaction.status,
            TransactionStatus::PaymentConfirmed | TransactionStatus::Shipped
        ) {
            return Err(ApiError::InvalidState(format!(
                "Cannot ship while trade is {:?}",
                transaction.status
            )));
        }

        let shipping_buyer_side = by_user == transaction.buyer_id;
        let own_side = side_of(&transaction, shipping_buyer_side)?;
        if own_side != TradeSideStatus::Packaging {
            return Err(ApiError::InvalidState(
                "This side of the trade has already shipped".to_string(),
            ));
        }

        let mut db_tx = self.db_pool.begin().await?;

        let sql = if shipping_buyer_side {
            r#"
            UPDATE transactions
            SET buyer_side = 'shipped', buyer_tracking_code = $2, buyer_photos = $3, updated_at = now()
            WHERE id = $1 AND buyer_side = 'packaging'
              AND status IN ('payment_confirmed', 'shipped')
            "#
        } else {
            r#"
            UPDATE transactions
            SET seller_side = 'shipped', tracking_code = $2, seller_photos = $3, updated_at = now()
            WHERE id = $1 AND seller_side = 'packaging'
              AND status IN ('payment_confirmed', 'shipped')
            "#
        };
        let advanced = sqlx::query(sql)
            .bind(transaction.id)
            .bind(request.tracking_code.trim())
            .bind(&request.photos)
            .execute(&mut *db_tx)
            .await?;
        if advanced.rows_affected() == 0 {
            return Err(concurrent(transaction.id, "mark shipped"));
        }

        // Aggregate follows the slower side
        sqlx::query(
            r#"
            UPDATE transactions
            SET status = 'shipped', updated_at = now()
            WHERE id = $1 AND status = 'payment_confirmed'
              AND buyer_side <> 'packaging' AND seller_side <> 'packaging'
            "#,
        )
        .bind(transaction.id)
        .execute(&mut *db_tx)
        .await?;

        let updated = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
            .bind(transaction.id)
            .fetch_one(&mut *db_tx)
            .await?;

        db_tx.commit().await?;

        self.notifier
            .notify(
                transaction.counterparty_of(by_user),
                NotificationType::ItemShipped,
                "The other side shipped their card",
                Some(request.tracking_code.trim().to_string()),
                Some(by_user),
                Some(transaction.id),
            )
            .await;

        Ok(updated)
    }

    /// Record a delivery event.
    ///
    /// Sales accept the event side-less (carrier callback or buyer
    /// assertion). For a trade, the receiving party asserts arrival of the
    /// counterparty's parcel, so an identity is required.
    pub async fn mark_delivered(&self, id: Uuid, by_user: Option<Uuid>) -> ApiResult<Transaction> {
        let transaction = self.fetch(id).await?;
        let transaction = self.enforce_shipment_deadline(transaction).await?;

        match transaction.kind {
            TransactionKind::Sale => {
                if transaction.status != TransactionStatus::Shipped {
                    return Err(ApiError::InvalidState(format!(
                        "Cannot mark delivered while transaction is {:?}",
                        transaction.status
                    )));
                }

                let updated = sqlx::query_as::<_, Transaction>(
                    r#"
                    UPDATE transactions
                    SET status = 'delivered', updated_at = now()
                    WHERE id = $1 AND status = 'shipped'
                    RETURNING *
                    "#,
                )
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or_else(|| concurrent(id, "mark delivered"))?;

                self.notifier
                    .notify(
                        updated.buyer_id,
                        NotificationType::ItemDelivered,
                        "Your card arrived",
                        Some("Confirm receipt to release the escrow".to_string()),
                        Some(updated.seller_id),
                        Some(updated.id),
                    )
                    .await;

                Ok(updated)
            }
            TransactionKind::Trade => {
                let by_user = by_user.ok_or_else(|| {
                    ApiError::ValidationError(
                        "Trade deliveries must be asserted by the receiving party".to_string(),
                    )
                })?;
                if !transaction.is_party(by_user) {
                    return Err(ApiError::Forbidden(
                        "Only a trade participant can assert delivery".to_string(),
                    ));
                }
                if !matches!(
                    transaction.status,
                    TransactionStatus::PaymentConfirmed | TransactionStatus::Shipped
                ) {
                    return Err(ApiError::InvalidState(format!(
                        "Cannot assert delivery while trade is {:?}",
                        transaction.status
                    )));
                }

                // The parcel the caller received was sent by the counterparty
                let sender_is_buyer = by_user == transaction.seller_id;
                let sender_side = side_of(&transaction, sender_is_buyer)?;
                if sender_side != TradeSideStatus::Shipped {
                    return Err(ApiError::InvalidState(format!(
                        "Counterparty's parcel is {:?}, not shipped",
                        sender_side
                    )));
                }

                let mut db_tx = self.db_pool.begin().await?;

                let sql = if sender_is_buyer {
                    r#"
                    UPDATE transactions
                    SET buyer_side = 'delivered', updated_at = now()
                    WHERE id = $1 AND buyer_side = 'shipped'
                      AND status IN ('payment_confirmed', 'shipped')
                    "#
                } else {
                    r#"
                    UPDATE transactions
                    SET seller_side = 'delivered', updated_at = now()
                    WHERE id = $1 AND seller_side = 'shipped'
                      AND status IN ('payment_confirmed', 'shipped')
                    "#
                };
                let advanced = sqlx::query(sql)
                    .bind(transaction.id)
                    .execute(&mut *db_tx)
                    .await?;
                if advanced.rows_affected() == 0 {
                    return Err(concurrent(transaction.id, "mark delivered"));
                }

                sqlx::query(
                    r#"
                    UPDATE transactions
                    SET status = 'delivered', updated_at = now()
                    WHERE id = $1 AND status = 'shipped'
                      AND buyer_side IN ('delivered', 'confirmed')
                      AND seller_side IN ('delivered', 'confirmed')
                    "#,
                )
                .bind(transaction.id)
                .execute(&mut *db_tx)
                .await?;

                let updated =
                    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
                        .bind(transaction.id)
                        .fetch_one(&mut *db_tx)
                        .await?;

                db_tx.commit().await?;

                self.notifier
                    .notify(
                        transaction.counterparty_of(by_user),
                        NotificationType::ItemDelivered,
                        "Your card was delivered",
                        None,
                        Some(by_user),
                        Some(transaction.id),
                    )
                    .await;

                Ok(updated)
            }
        }
    }

    /// Confirm receipt.
    ///
    /// Sales: buyer-only; completes the transaction, releases the escrow to
    /// the seller and flips the card to `sold` atomically. Trades: each party
    /// confirms the parcel they received; the trade completes when both have
    /// confirmed, refunding both guarantee amounts and flipping both cards to
    /// `traded`.
    pub async fn confirm_receipt(&self, id: Uuid, by_user: Uuid) -> ApiResult<Transaction> {
        let transaction = self.fetch(id).await?;
        let transaction = self.enforce_shipment_deadline(transaction).await?;

        if !transaction.is_party(by_user) {
            return Err(ApiError::Forbidden(
                "Only a participant may confirm receipt".to_string(),
            ));
        }

        match transaction.kind {
            TransactionKind::Sale => self.confirm_sale_receipt(transaction, by_user).await,
            TransactionKind::Trade => self.confirm_trade_receipt(transaction, by_user).await,
        }
    }

    async fn confirm_sale_receipt(
        &self,
        transaction: Transaction,
        by_user: Uuid,
    ) -> ApiResult<Transaction> {
        if by_user != transaction.buyer_id {
            return Err(ApiError::Forbidden(
                "Only the buyer confirms receipt of a sale".to_string(),
            ));
        }
        if transaction.status != TransactionStatus::Delivered {
            return Err(ApiError::InvalidState(format!(
                "Cannot confirm receipt while transaction is {:?}",
                transaction.status
            )));
        }

        // Completion, card flip and seller aggregate commit together
        let mut db_tx = self.db_pool.begin().await?;

        let updated = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = 'completed', completed_at = now(), updated_at = now()
            WHERE id = $1 AND status = 'delivered'
            RETURNING *
            "#,
        )
        .bind(transaction.id)
        .fetch_optional(&mut *db_tx)
        .await?
        .ok_or_else(|| concurrent(transaction.id, "confirm receipt"))?;

        sqlx::query("UPDATE cards SET status = 'sold', updated_at = now() WHERE id = $1")
            .bind(transaction.card_id)
            .execute(&mut *db_tx)
            .await?;

        sqlx::query(
            "UPDATE users SET completed_sales = completed_sales + 1, updated_at = now() WHERE id = $1",
        )
        .bind(transaction.seller_id)
        .execute(&mut *db_tx)
        .await?;

        db_tx.commit().await?;

        tracing::info!(
            transaction_id = %updated.id,
            amount_cents = updated.amount_cents,
            fee_cents = updated.fee_cents,
            "Escrow released to seller"
        );

        self.notifier
            .notify(
                updated.seller_id,
                NotificationType::PaymentReceived,
                "Escrow released",
                Some("The buyer confirmed receipt; funds are on the way".to_string()),
                Some(updated.buyer_id),
                Some(updated.id),
            )
            .await;

        Ok(updated)
    }

    async fn confirm_trade_receipt(
        &self,
        transaction: Transaction,
        by_user: Uuid,
    ) -> ApiResult<Transaction> {
        if !matches!(
            transaction.status,
            TransactionStatus::Shipped | TransactionStatus::Delivered
        ) {
            return Err(ApiError::InvalidState(format!(
                "Cannot confirm receipt while trade is {:?}",
                transaction.status
            )));
        }

        // The caller confirms the parcel they received (the counterparty's side)
        let sender_is_buyer = by_user == transaction.seller_id;
        let sender_side = side_of(&transaction, sender_is_buyer)?;

        if sender_side == TradeSideStatus::Confirmed {
            return Err(ApiError::Forbidden(
                "You have already confirmed this trade".to_string(),
            ));
        }
        if sender_side != TradeSideStatus::Delivered {
            return Err(ApiError::InvalidState(format!(
                "Counterparty's parcel is {:?}, not delivered",
                sender_side
            )));
        }

        let mut db_tx = self.db_pool.begin().await?;

        let sql = if sender_is_buyer {
            "UPDATE transactions SET buyer_side = 'confirmed', updated_at = now() WHERE id = $1 AND buyer_side = 'delivered' AND status IN ('shipped', 'delivered')"
        } else {
            "UPDATE transactions SET seller_side = 'confirmed', updated_at = now() WHERE id = $1 AND seller_side = 'delivered' AND status IN ('shipped', 'delivered')"
        };
        let advanced = sqlx::query(sql)
            .bind(transaction.id)
            .execute(&mut *db_tx)
            .await?;
        if advanced.rows_affected() == 0 {
            return Err(concurrent(transaction.id, "confirm receipt"));
        }

        // Mutual confirmation completes the trade and refunds both guarantees
        let completed = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = 'completed', completed_at = now(),
                payment_status = 'refunded', updated_at = now()
            WHERE id = $1 AND status = 'delivered'
              AND buyer_side = 'confirmed' AND seller_side = 'confirmed'
            RETURNING *
            "#,
        )
        .bind(transaction.id)
        .fetch_optional(&mut *db_tx)
        .await?;

        let updated = match completed {
            Some(done) => {
                sqlx::query(
                    "UPDATE cards SET status = 'traded', updated_at = now() WHERE (id = $1 OR id = $2) AND status = 'pending'",
                )
                .bind(done.card_id)
                .bind(done.trade_card_id)
                .execute(&mut *db_tx)
                .await?;

                sqlx::query(
                    "UPDATE users SET completed_trades = completed_trades + 1, updated_at = now() WHERE id = $1 OR id = $2",
                )
                .bind(done.buyer_id)
                .bind(done.seller_id)
                .execute(&mut *db_tx)
                .await?;

                sqlx::query(
                    "UPDATE trade_proposals SET status = 'completed' WHERE transaction_id = $1 AND status = 'accepted'",
                )
                .bind(done.id)
                .execute(&mut *db_tx)
                .await?;

                done
            }
            None => {
                sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
                    .bind(transaction.id)
                    .fetch_one(&mut *db_tx)
                    .await?
            }
        };

        db_tx.commit().await?;

        if updated.status == TransactionStatus::Completed {
            tracing::info!(
                transaction_id = %updated.id,
                "Trade completed, both guarantees refunded"
            );
            for (user, other) in [
                (updated.buyer_id, updated.seller_id),
                (updated.seller_id, updated.buyer_id),
            ] {
                self.notifier
                    .notify(
                        user,
                        NotificationType::TradeCompleted,
                        "Trade completed",
                        Some("Both sides confirmed; guarantee amounts refunded".to_string()),
                        Some(other),
                        Some(updated.id),
                    )
                    .await;
            }
        }

        Ok(updated)
    }

    /// Cancel a transaction; legal from any non-terminal, non-disputed state.
    ///
    /// Refunds the escrow if payment had completed and releases any cards
    /// still reserved by this transaction.
    pub async fn cancel(
        &self,
        id: Uuid,
        by_user: Option<Uuid>,
        request: CancelRequest,
    ) -> ApiResult<Transaction> {
        let transaction = self.fetch(id).await?;
        let transaction = self.enforce_shipment_deadline(transaction).await?;

        if let Some(user) = by_user {
            if !transaction.is_party(user) {
                return Err(ApiError::Forbidden(
                    "Only a participant may cancel this transaction".to_string(),
                ));
            }
        }
        if transaction.status.is_terminal() {
            return Err(ApiError::InvalidState(format!(
                "Transaction is already {:?}",
                transaction.status
            )));
        }
        if transaction.status == TransactionStatus::Disputed {
            return Err(ApiError::InvalidState(
                "A disputed transaction can only be closed through dispute resolution".to_string(),
            ));
        }

        let reason = request
            .reason
            .unwrap_or_else(|| "cancelled by participant".to_string());
        self.cancel_with_refund(&transaction, &reason).await
    }

    /// File a dispute; freezes further transitions until it resolves
    pub async fn file_dispute(
        &self,
        id: Uuid,
        by_user: Uuid,
        request: FileDisputeRequest,
    ) -> ApiResult<Dispute> {
        request.validate()?;

        let transaction = self.fetch(id).await?;
        let transaction = self.enforce_shipment_deadline(transaction).await?;

        if !transaction.is_party(by_user) {
            return Err(ApiError::Forbidden(
                "Only a participant may file a dispute".to_string(),
            ));
        }
        if !matches!(
            transaction.status,
            TransactionStatus::PaymentConfirmed
                | TransactionStatus::Shipped
                | TransactionStatus::Delivered
        ) {
            return Err(ApiError::InvalidState(format!(
                "Disputes cannot be filed while the transaction is {:?}",
                transaction.status
            )));
        }

        let mut db_tx = self.db_pool.begin().await?;

        let frozen = sqlx::query(
            "UPDATE transactions SET status = 'disputed', updated_at = now() WHERE id = $1 AND status = $2",
        )
        .bind(transaction.id)
        .bind(transaction.status)
        .execute(&mut *db_tx)
        .await?;
        if frozen.rows_affected() == 0 {
            return Err(concurrent(transaction.id, "file dispute"));
        }

        let dispute = sqlx::query_as::<_, Dispute>(
            r#"
            INSERT INTO disputes
                (transaction_id, reported_by_user_id, reported_user_id, reason, description, evidence)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(transaction.id)
        .bind(by_user)
        .bind(transaction.counterparty_of(by_user))
        .bind(&request.reason)
        .bind(&request.description)
        .bind(&request.evidence)
        .fetch_one(&mut *db_tx)
        .await?;

        db_tx.commit().await?;

        tracing::warn!(
            transaction_id = %transaction.id,
            dispute_id = %dispute.id,
            "Transaction disputed"
        );

        self.notifier
            .notify(
                transaction.counterparty_of(by_user),
                NotificationType::DisputeOpened,
                "A dispute was opened",
                Some(request.reason),
                Some(by_user),
                Some(transaction.id),
            )
            .await;

        Ok(dispute)
    }

    /// Get a dispute visible to the given participant
    pub async fn get_dispute(&self, id: Uuid, user_id: Uuid) -> ApiResult<Dispute> {
        let dispute = self.fetch_dispute(id).await?;
        if dispute.reported_by_user_id != user_id && dispute.reported_user_id != user_id {
            return Err(ApiError::Forbidden(
                "Only a participant may view this dispute".to_string(),
            ));
        }
        Ok(dispute)
    }

    /// Resolve a dispute: release completes the transaction, refund cancels
    /// it. The frozen transaction thaws directly into the chosen terminal
    /// state.
    pub async fn resolve_dispute(
        &self,
        dispute_id: Uuid,
        request: ResolveDisputeRequest,
    ) -> ApiResult<(Dispute, Transaction)> {
        request.validate()?;

        let dispute = self.fetch_dispute(dispute_id).await?;
        if !matches!(dispute.status, DisputeStatus::Open | DisputeStatus::UnderReview) {
            return Err(ApiError::InvalidState(format!(
                "Dispute is already {:?}",
                dispute.status
            )));
        }
        let transaction = self.fetch(dispute.transaction_id).await?;
        if transaction.status != TransactionStatus::Disputed {
            return Err(ApiError::InvalidState(
                "Transaction is no longer frozen by this dispute".to_string(),
            ));
        }

        let mut db_tx = self.db_pool.begin().await?;

        let resolved = sqlx::query_as::<_, Dispute>(
            r#"
            UPDATE disputes
            SET status = 'resolved', resolution = $2, resolved_at = now()
            WHERE id = $1 AND status IN ('open', 'under_review')
            RETURNING *
            "#,
        )
        .bind(dispute.id)
        .bind(&request.resolution)
        .fetch_optional(&mut *db_tx)
        .await?
        .ok_or_else(|| concurrent(dispute.id, "resolve dispute"))?;

        let updated = match request.outcome {
            DisputeOutcome::Release => {
                let done = sqlx::query_as::<_, Transaction>(
                    r#"
                    UPDATE transactions
                    SET status = 'completed', completed_at = now(), updated_at = now()
                    WHERE id = $1 AND status = 'disputed'
                    RETURNING *
                    "#,
                )
                .bind(transaction.id)
                .fetch_optional(&mut *db_tx)
                .await?
                .ok_or_else(|| concurrent(transaction.id, "resolve dispute"))?;

                match done.kind {
                    TransactionKind::Sale => {
                        sqlx::query(
                            "UPDATE cards SET status = 'sold', updated_at = now() WHERE id = $1",
                        )
                        .bind(done.card_id)
                        .execute(&mut *db_tx)
                        .await?;
                        sqlx::query(
                            "UPDATE users SET completed_sales = completed_sales + 1, updated_at = now() WHERE id = $1",
                        )
                        .bind(done.seller_id)
                        .execute(&mut *db_tx)
                        .await?;
                    }
                    TransactionKind::Trade => {
                        sqlx::query(
                            "UPDATE transactions SET payment_status = 'refunded' WHERE id = $1",
                        )
                        .bind(done.id)
                        .execute(&mut *db_tx)
                        .await?;
                        sqlx::query(
                            "UPDATE cards SET status = 'traded', updated_at = now() WHERE (id = $1 OR id = $2) AND status = 'pending'",
                        )
                        .bind(done.card_id)
                        .bind(done.trade_card_id)
                        .execute(&mut *db_tx)
                        .await?;
                        sqlx::query(
                            "UPDATE users SET completed_trades = completed_trades + 1, updated_at = now() WHERE id = $1 OR id = $2",
                        )
                        .bind(done.buyer_id)
                        .bind(done.seller_id)
                        .execute(&mut *db_tx)
                        .await?;
                        sqlx::query(
                            "UPDATE trade_proposals SET status = 'completed' WHERE transaction_id = $1 AND status = 'accepted'",
                        )
                        .bind(done.id)
                        .execute(&mut *db_tx)
                        .await?;
                    }
                }
                done
            }
            DisputeOutcome::Refund => {
                let cancelled = sqlx::query_as::<_, Transaction>(
                    r#"
                    UPDATE transactions
                    SET status = 'cancelled',
                        cancel_reason = $2,
                        payment_status = CASE
                            WHEN payment_status = 'completed' THEN 'refunded'::payment_status
                            ELSE payment_status
                        END,
                        updated_at = now()
                    WHERE id = $1 AND status = 'disputed'
                    RETURNING *
                    "#,
                )
                .bind(transaction.id)
                .bind(format!("dispute resolved: {}", request.resolution))
                .fetch_optional(&mut *db_tx)
                .await?
                .ok_or_else(|| concurrent(transaction.id, "resolve dispute"))?;

                sqlx::query(
                    "UPDATE cards SET status = 'active', updated_at = now() WHERE (id = $1 OR id = $2) AND status = 'pending'",
                )
                .bind(cancelled.card_id)
                .bind(cancelled.trade_card_id)
                .execute(&mut *db_tx)
                .await?;

                cancelled
            }
        };

        db_tx.commit().await?;

        tracing::info!(
            dispute_id = %resolved.id,
            transaction_id = %updated.id,
            outcome = ?request.outcome,
            "Dispute resolved"
        );

        for (user, other) in [
            (updated.buyer_id, updated.seller_id),
            (updated.seller_id, updated.buyer_id),
        ] {
            self.notifier
                .notify(
                    user,
                    NotificationType::DisputeResolved,
                    "Dispute resolved",
                    Some(request.resolution.clone()),
                    Some(other),
                    Some(updated.id),
                )
                .await;
        }

        Ok((resolved, updated))
    }

    /// Agree on an in-person meeting; charges the fixed negotiation fee and
    /// moves the trade from `negotiating` to `pending`
    pub async fn agree_meeting(
        &self,
        id: Uuid,
        by_user: Uuid,
        request: AgreeMeetingRequest,
    ) -> ApiResult<Transaction> {
        request.validate()?;

        let transaction = self.fetch(id).await?;
        if !transaction.is_party(by_user) {
            return Err(ApiError::Forbidden(
                "Only a participant may agree on a meeting".to_string(),
            ));
        }
        if transaction.status != TransactionStatus::Negotiating {
            return Err(ApiError::InvalidState(format!(
                "Meetings can only be agreed while negotiating, not {:?}",
                transaction.status
            )));
        }

        let updated = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = 'pending',
                meeting_location = $2,
                meeting_at = $3,
                fee_cents = $4,
                updated_at = now()
            WHERE id = $1 AND status = 'negotiating'
            RETURNING *
            "#,
        )
        .bind(transaction.id)
        .bind(request.location.trim())
        .bind(request.meeting_at)
        .bind(lifecycle::NEGOTIATION_FEE_CENTS)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| concurrent(transaction.id, "agree meeting"))?;

        self.notifier
            .notify(
                transaction.counterparty_of(by_user),
                NotificationType::MeetingConfirmed,
                "Meeting confirmed",
                Some(format!(
                    "Meeting at {}. Negotiation fee charged.",
                    updated.meeting_location.as_deref().unwrap_or("-")
                )),
                Some(by_user),
                Some(updated.id),
            )
            .await;

        Ok(updated)
    }

    // ===== Private helpers =====

    async fn fetch(&self, id: Uuid) -> ApiResult<Transaction> {
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Transaction {} not found", id)))
    }

    async fn fetch_dispute(&self, id: Uuid) -> ApiResult<Dispute> {
        sqlx::query_as::<_, Dispute>("SELECT * FROM disputes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Dispute {} not found", id)))
    }

    async fn fetch_card(&self, id: Uuid) -> ApiResult<Card> {
        sqlx::query_as::<_, Card>("SELECT * FROM cards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Card {} not found", id)))
    }

    /// Lazy deadline rule: a transaction still awaiting shipment past its
    /// window is cancelled on the access that notices it.
    async fn enforce_shipment_deadline(&self, transaction: Transaction) -> ApiResult<Transaction> {
        if !lifecycle::past_shipment_deadline(
            transaction.status,
            transaction.payment_confirmed_at,
            chrono::Utc::now(),
        ) {
            return Ok(transaction);
        }

        tracing::info!(
            transaction_id = %transaction.id,
            "Shipment deadline elapsed, cancelling"
        );
        match self
            .cancel_with_refund(&transaction, DEADLINE_CANCEL_REASON)
            .await
        {
            Ok(cancelled) => Ok(cancelled),
            // Someone advanced or cancelled it first; the re-read wins
            Err(ApiError::ConcurrentModification(_)) => self.fetch(transaction.id).await,
            Err(e) => Err(e),
        }
    }

    /// Cancel with refund and card release; conditional on the status the
    /// caller observed
    async fn cancel_with_refund(
        &self,
        transaction: &Transaction,
        reason: &str,
    ) -> ApiResult<Transaction> {
        let mut db_tx = self.db_pool.begin().await?;

        let cancelled = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = 'cancelled',
                cancel_reason = $2,
                payment_status = CASE
                    WHEN payment_status = 'completed' THEN 'refunded'::payment_status
                    ELSE payment_status
                END,
                updated_at = now()
            WHERE id = $1 AND status = $3
            RETURNING *
            "#,
        )
        .bind(transaction.id)
        .bind(reason)
        .bind(transaction.status)
        .fetch_optional(&mut *db_tx)
        .await?
        .ok_or_else(|| concurrent(transaction.id, "cancel"))?;

        // Release cards still reserved by this transaction
        sqlx::query(
            "UPDATE cards SET status = 'active', updated_at = now() WHERE (id = $1 OR id = $2) AND status = 'pending'",
        )
        .bind(transaction.card_id)
        .bind(transaction.trade_card_id)
        .execute(&mut *db_tx)
        .await?;

        db_tx.commit().await?;

        if transaction.payment_status == PaymentStatus::Completed {
            tracing::info!(
                transaction_id = %cancelled.id,
                amount_cents = cancelled.amount_cents,
                "Escrowed funds refunded on cancellation"
            );
        }

        let kind = match cancelled.kind {
            TransactionKind::Sale => NotificationType::OrderCancelled,
            TransactionKind::Trade => NotificationType::TradeCancelled,
        };
        for (user, other) in [
            (cancelled.buyer_id, cancelled.seller_id),
            (cancelled.seller_id, cancelled.buyer_id),
        ] {
            self.notifier
                .notify(
                    user,
                    kind,
                    "Transaction cancelled",
                    Some(reason.to_string()),
                    Some(other),
                    Some(cancelled.id),
                )
                .await;
        }

        Ok(cancelled)
    }
}

/// The stored side column for a trade; trades always carry both sides
fn side_of(transaction: &Transaction, buyer_side: bool) -> ApiResult<TradeSideStatus> {
    let side = if buyer_side {
        transaction.buyer_side
    } else {
        transaction.seller_side
    };
    side.ok_or_else(|| {
        ApiError::InternalError(format!(
            "Trade transaction {} is missing a side status",
            transaction.id
        ))
    })
}

fn concurrent(id: Uuid, operation: &str) -> ApiError {
    ApiError::ConcurrentModification(format!(
        "Transaction {} changed while trying to {}",
        id, operation
    ))
}
