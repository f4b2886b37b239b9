//! End-to-end flow tests for the transaction engine
//!
//! These exercise the escrow lifecycle against a real PostgreSQL database.
//! Run them with `cargo test -- --ignored` after pointing TEST_DATABASE_URL
//! at a scratch database.

#[cfg(test)]
mod tests {
    use sqlx::PgPool;
    use uuid::Uuid;

    use tradebinder_server::error::ApiError;
    use tradebinder_server::listing::{CardCondition, CardStatus, CreateCardRequest, ListingService};
    use tradebinder_server::notification::NotificationService;
    use tradebinder_server::proposal::{CreateProposalRequest, ProposalService, ProposalStatus};
    use tradebinder_server::review::{CreateReviewRequest, ReviewService};
    use tradebinder_server::transaction::{
        CancelRequest, CreateSaleRequest, DisputeOutcome, FileDisputeRequest, PaymentMethod,
        PaymentStatus, ResolveDisputeRequest, ShipRequest, TradeSideStatus, TransactionService,
        TransactionStatus,
    };

    /// Helper to create a test database pool and apply the schema
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/tradebinder_test".to_string());

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn services(pool: &PgPool) -> (ListingService, TransactionService, ProposalService, ReviewService)
    {
        let notifier = NotificationService::new(pool.clone());
        let listings = ListingService::new(pool.clone());
        let engine = TransactionService::new(pool.clone(), notifier.clone());
        let proposals = ProposalService::new(pool.clone(), engine.clone(), notifier.clone());
        let reviews = ReviewService::new(pool.clone(), notifier);
        (listings, engine, proposals, reviews)
    }

    async fn seed_user(pool: &PgPool, name: &str) -> Uuid {
        sqlx::query_scalar("INSERT INTO users (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(pool)
            .await
            .expect("Failed to seed user")
    }

    fn card_request(price_cents: i64, accepts_trade: bool) -> CreateCardRequest {
        CreateCardRequest {
            name: "Charizard ex".to_string(),
            series: "Obsidian Flames".to_string(),
            card_number: "125/197".to_string(),
            pokemon_name: Some("Charizard".to_string()),
            card_type: None,
            rarity: Some("Double Rare".to_string()),
            condition: CardCondition::NearMint,
            condition_score: 9,
            price_cents,
            images: vec!["https://img.example/charizard-front.jpg".to_string()],
            accepts_trade,
        }
    }

    async fn card_status(pool: &PgPool, card_id: Uuid) -> CardStatus {
        sqlx::query_scalar::<_, CardStatus>("SELECT status FROM cards WHERE id = $1")
            .bind(card_id)
            .fetch_one(pool)
            .await
            .expect("Failed to read card status")
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn sale_happy_path() {
        let pool = setup_test_db().await;
        let (listings, engine, _, _) = services(&pool);

        let seller = seed_user(&pool, "seller").await;
        let buyer = seed_user(&pool, "buyer").await;
        let card = listings
            .create_card(seller, card_request(45_000, false))
            .await
            .unwrap();

        // Buyer commits to the purchase
        let tx = engine
            .create_sale(
                buyer,
                CreateSaleRequest {
                    card_id: card.id,
                    payment_method: PaymentMethod::Pix,
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.amount_cents, 45_000);
        assert_eq!(tx.fee_cents, 1_350); // 3%
        assert_eq!(card_status(&pool, card.id).await, CardStatus::Pending);

        // Gateway confirms
        let tx = engine.confirm_payment(tx.id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::PaymentConfirmed);
        assert_eq!(tx.payment_status, PaymentStatus::Completed);
        assert!(tx.payment_confirmed_at.is_some());

        // Empty tracking code is refused
        let err = engine
            .mark_shipped(
                tx.id,
                seller,
                ShipRequest {
                    tracking_code: "   ".to_string(),
                    tracking_url: None,
                    photos: vec![],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));

        // Seller ships
        let tx = engine
            .mark_shipped(
                tx.id,
                seller,
                ShipRequest {
                    tracking_code: "AA123456789BR".to_string(),
                    tracking_url: None,
                    photos: vec!["https://img.example/parcel.jpg".to_string()],
                },
            )
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Shipped);
        assert_eq!(tx.tracking_code.as_deref(), Some("AA123456789BR"));

        // Carrier delivers, buyer confirms
        let tx = engine.mark_delivered(tx.id, None).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Delivered);

        let tx = engine.confirm_receipt(tx.id, buyer).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(tx.completed_at.is_some());
        assert_eq!(card_status(&pool, card.id).await, CardStatus::Sold);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn confirm_receipt_refuses_second_call() {
        let pool = setup_test_db().await;
        let (listings, engine, _, _) = services(&pool);

        let seller = seed_user(&pool, "seller").await;
        let buyer = seed_user(&pool, "buyer").await;
        let card = listings
            .create_card(seller, card_request(10_000, false))
            .await
            .unwrap();

        let tx = engine
            .create_sale(
                buyer,
                CreateSaleRequest {
                    card_id: card.id,
                    payment_method: PaymentMethod::CreditCard,
                    notes: None,
                },
            )
            .await
            .unwrap();
        engine.confirm_payment(tx.id).await.unwrap();
        engine
            .mark_shipped(
                tx.id,
                seller,
                ShipRequest {
                    tracking_code: "BB987654321BR".to_string(),
                    tracking_url: None,
                    photos: vec![],
                },
            )
            .await
            .unwrap();
        engine.mark_delivered(tx.id, None).await.unwrap();

        let first = engine.confirm_receipt(tx.id, buyer).await;
        assert!(first.is_ok());

        let second = engine.confirm_receipt(tx.id, buyer).await.unwrap_err();
        assert!(matches!(second, ApiError::InvalidState(_)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn card_held_by_live_transaction_cannot_be_sold_again() {
        let pool = setup_test_db().await;
        let (listings, engine, _, _) = services(&pool);

        let seller = seed_user(&pool, "seller").await;
        let buyer_a = seed_user(&pool, "buyer-a").await;
        let buyer_b = seed_user(&pool, "buyer-b").await;
        let card = listings
            .create_card(seller, card_request(20_000, false))
            .await
            .unwrap();

        engine
            .create_sale(
                buyer_a,
                CreateSaleRequest {
                    card_id: card.id,
                    payment_method: PaymentMethod::Pix,
                    notes: None,
                },
            )
            .await
            .unwrap();

        let err = engine
            .create_sale(
                buyer_b,
                CreateSaleRequest {
                    card_id: card.id,
                    payment_method: PaymentMethod::Pix,
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn reviews_require_a_completed_transaction() {
        let pool = setup_test_db().await;
        let (listings, engine, _, reviews) = services(&pool);

        let seller = seed_user(&pool, "seller").await;
        let buyer = seed_user(&pool, "buyer").await;
        let card = listings
            .create_card(seller, card_request(15_000, false))
            .await
            .unwrap();

        let tx = engine
            .create_sale(
                buyer,
                CreateSaleRequest {
                    card_id: card.id,
                    payment_method: PaymentMethod::Pix,
                    notes: None,
                },
            )
            .await
            .unwrap();
        engine.confirm_payment(tx.id).await.unwrap();
        engine
            .mark_shipped(
                tx.id,
                seller,
                ShipRequest {
                    tracking_code: "CC111222333BR".to_string(),
                    tracking_url: None,
                    photos: vec![],
                },
            )
            .await
            .unwrap();

        let review_request = CreateReviewRequest {
            transaction_id: tx.id,
            rating: 5,
            comment: Some("Exactly as described".to_string()),
            card_condition_accuracy: Some(5),
            communication_rating: Some(5),
            shipping_rating: Some(4),
            photos: vec![],
        };

        // Still shipped: refused
        let err = reviews
            .create(buyer, review_request)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));

        engine.mark_delivered(tx.id, None).await.unwrap();
        engine.confirm_receipt(tx.id, buyer).await.unwrap();

        // Completed: accepted, and folded into the seller's aggregate
        let review = reviews
            .create(
                buyer,
                CreateReviewRequest {
                    transaction_id: tx.id,
                    rating: 5,
                    comment: None,
                    card_condition_accuracy: None,
                    communication_rating: None,
                    shipping_rating: None,
                    photos: vec![],
                },
            )
            .await
            .unwrap();
        assert_eq!(review.to_user_id, seller);

        let (rating_avg, rating_count): (f64, i64) =
            sqlx::query_as("SELECT rating_avg, rating_count FROM users WHERE id = $1")
                .bind(seller)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(rating_count, 1);
        assert!((rating_avg - 5.0).abs() < f64::EPSILON);

        // One review per direction
        let err = reviews
            .create(
                buyer,
                CreateReviewRequest {
                    transaction_id: tx.id,
                    rating: 4,
                    comment: None,
                    card_condition_accuracy: None,
                    communication_rating: None,
                    shipping_rating: None,
                    photos: vec![],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn concurrent_mark_shipped_admits_exactly_one() {
        let pool = setup_test_db().await;
        let (listings, engine, _, _) = services(&pool);

        let seller = seed_user(&pool, "seller").await;
        let buyer = seed_user(&pool, "buyer").await;
        let card = listings
            .create_card(seller, card_request(30_000, false))
            .await
            .unwrap();

        let tx = engine
            .create_sale(
                buyer,
                CreateSaleRequest {
                    card_id: card.id,
                    payment_method: PaymentMethod::Pix,
                    notes: None,
                },
            )
            .await
            .unwrap();
        engine.confirm_payment(tx.id).await.unwrap();

        let ship = |code: &str| {
            let engine = engine.clone();
            let code = code.to_string();
            let id = tx.id;
            async move {
                engine
                    .mark_shipped(
                        id,
                        seller,
                        ShipRequest {
                            tracking_code: code,
                            tracking_url: None,
                            photos: vec![],
                        },
                    )
                    .await
            }
        };

        let (a, b) = tokio::join!(ship("DD000000001BR"), ship("DD000000002BR"));

        let succeeded = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(succeeded, 1, "exactly one ship call must win");

        // The loser observes the conflict either at the conditional update or
        // at its pre-transition re-read
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(
            loser.unwrap_err(),
            ApiError::ConcurrentModification(_) | ApiError::InvalidState(_)
        ));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn lapsed_shipment_deadline_cancels_on_next_access() {
        let pool = setup_test_db().await;
        let (listings, engine, _, _) = services(&pool);

        let seller = seed_user(&pool, "seller").await;
        let buyer = seed_user(&pool, "buyer").await;
        let card = listings
            .create_card(seller, card_request(25_000, false))
            .await
            .unwrap();

        let tx = engine
            .create_sale(
                buyer,
                CreateSaleRequest {
                    card_id: card.id,
                    payment_method: PaymentMethod::BankTransfer,
                    notes: None,
                },
            )
            .await
            .unwrap();
        engine.confirm_payment(tx.id).await.unwrap();

        // Rewind the payment confirmation three days
        sqlx::query(
            "UPDATE transactions SET payment_confirmed_at = now() - interval '3 days' WHERE id = $1",
        )
        .bind(tx.id)
        .execute(&pool)
        .await
        .unwrap();

        // The next read notices the lapsed window, cancels and refunds
        let tx = engine.get_for_user(tx.id, buyer).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Cancelled);
        assert_eq!(tx.payment_status, PaymentStatus::Refunded);
        assert_eq!(card_status(&pool, card.id).await, CardStatus::Active);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn cancel_refunds_and_releases_the_card() {
        let pool = setup_test_db().await;
        let (listings, engine, _, _) = services(&pool);

        let seller = seed_user(&pool, "seller").await;
        let buyer = seed_user(&pool, "buyer").await;
        let card = listings
            .create_card(seller, card_request(12_000, false))
            .await
            .unwrap();

        let tx = engine
            .create_sale(
                buyer,
                CreateSaleRequest {
                    card_id: card.id,
                    payment_method: PaymentMethod::Pix,
                    notes: None,
                },
            )
            .await
            .unwrap();
        engine.confirm_payment(tx.id).await.unwrap();

        let tx = engine
            .cancel(
                tx.id,
                Some(buyer),
                CancelRequest {
                    reason: Some("changed my mind".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Cancelled);
        assert_eq!(tx.payment_status, PaymentStatus::Refunded);
        assert_eq!(card_status(&pool, card.id).await, CardStatus::Active);

        // Terminal states absorb
        let err = engine.confirm_payment(tx.id).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn dispute_freezes_until_resolution() {
        let pool = setup_test_db().await;
        let (listings, engine, _, _) = services(&pool);

        let seller = seed_user(&pool, "seller").await;
        let buyer = seed_user(&pool, "buyer").await;
        let card = listings
            .create_card(seller, card_request(18_000, false))
            .await
            .unwrap();

        let tx = engine
            .create_sale(
                buyer,
                CreateSaleRequest {
                    card_id: card.id,
                    payment_method: PaymentMethod::Pix,
                    notes: None,
                },
            )
            .await
            .unwrap();
        engine.confirm_payment(tx.id).await.unwrap();
        engine
            .mark_shipped(
                tx.id,
                seller,
                ShipRequest {
                    tracking_code: "EE555666777BR".to_string(),
                    tracking_url: None,
                    photos: vec![],
                },
            )
            .await
            .unwrap();

        let dispute = engine
            .file_dispute(
                tx.id,
                buyer,
                FileDisputeRequest {
                    reason: "parcel stuck for weeks".to_string(),
                    description: None,
                    evidence: vec![],
                },
            )
            .await
            .unwrap();

        // Frozen: neither delivery nor cancellation may proceed
        let err = engine.mark_delivered(tx.id, None).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
        let err = engine
            .cancel(tx.id, Some(buyer), CancelRequest { reason: None })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));

        // Refund outcome cancels and releases
        let (resolved, tx) = engine
            .resolve_dispute(
                dispute.id,
                ResolveDisputeRequest {
                    resolution: "refund issued, carrier lost the parcel".to_string(),
                    outcome: DisputeOutcome::Refund,
                },
            )
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Cancelled);
        assert_eq!(tx.payment_status, PaymentStatus::Refunded);
        assert!(resolved.resolved_at.is_some());
        assert_eq!(card_status(&pool, card.id).await, CardStatus::Active);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn trade_completes_on_mutual_confirmation() {
        let pool = setup_test_db().await;
        let (listings, engine, proposals, _) = services(&pool);

        let proposer = seed_user(&pool, "proposer").await;
        let recipient = seed_user(&pool, "recipient").await;
        let offered = listings
            .create_card(proposer, card_request(28_000, true))
            .await
            .unwrap();
        let wanted = listings
            .create_card(recipient, card_request(45_000, true))
            .await
            .unwrap();

        let proposal = proposals
            .create(
                proposer,
                CreateProposalRequest {
                    proposer_card_id: offered.id,
                    recipient_card_id: wanted.id,
                    message: Some("Fair swap?".to_string()),
                    meeting_location: None,
                    meeting_at: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(proposal.status, ProposalStatus::Pending);

        // Only the recipient may accept
        let err = proposals.accept(proposal.id, proposer).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let accepted = proposals.accept(proposal.id, recipient).await.unwrap();
        let tx = accepted.transaction;
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.amount_cents, 45_000);
        assert_eq!(tx.trade_amount_cents, Some(28_000));
        assert_eq!(card_status(&pool, offered.id).await, CardStatus::Pending);
        assert_eq!(card_status(&pool, wanted.id).await, CardStatus::Pending);

        // Both guarantees charged
        let tx = engine.confirm_payment(tx.id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::PaymentConfirmed);
        assert_eq!(tx.buyer_side, Some(TradeSideStatus::Packaging));

        // Proposer ships first; aggregate still waits for the slower side
        let tx = engine
            .mark_shipped(
                tx.id,
                proposer,
                ShipRequest {
                    tracking_code: "FF100000001BR".to_string(),
                    tracking_url: None,
                    photos: vec![],
                },
            )
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::PaymentConfirmed);
        assert_eq!(tx.buyer_side, Some(TradeSideStatus::Shipped));

        let tx = engine
            .mark_shipped(
                tx.id,
                recipient,
                ShipRequest {
                    tracking_code: "FF100000002BR".to_string(),
                    tracking_url: None,
                    photos: vec![],
                },
            )
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Shipped);

        // Each receiver asserts delivery of the counterparty's parcel
        let tx = engine.mark_delivered(tx.id, Some(recipient)).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Shipped);
        assert_eq!(tx.buyer_side, Some(TradeSideStatus::Delivered));

        let tx = engine.mark_delivered(tx.id, Some(proposer)).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Delivered);

        // First confirmation is not enough
        let tx = engine.confirm_receipt(tx.id, proposer).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Delivered);
        assert!(tx.completed_at.is_none());

        // Confirming twice from the same party is refused
        let err = engine.confirm_receipt(tx.id, proposer).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        // Mutual confirmation completes, refunds guarantees, flips cards
        let tx = engine.confirm_receipt(tx.id, recipient).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(tx.completed_at.is_some());
        assert_eq!(tx.payment_status, PaymentStatus::Refunded);
        assert_eq!(card_status(&pool, offered.id).await, CardStatus::Traded);
        assert_eq!(card_status(&pool, wanted.id).await, CardStatus::Traded);

        let status: ProposalStatus =
            sqlx::query_scalar("SELECT status FROM trade_proposals WHERE id = $1")
                .bind(proposal.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, ProposalStatus::Completed);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn in_person_trade_negotiates_before_pending() {
        let pool = setup_test_db().await;
        let (listings, engine, proposals, _) = services(&pool);

        let proposer = seed_user(&pool, "proposer").await;
        let recipient = seed_user(&pool, "recipient").await;
        let offered = listings
            .create_card(proposer, card_request(8_000, true))
            .await
            .unwrap();
        let wanted = listings
            .create_card(recipient, card_request(9_000, true))
            .await
            .unwrap();

        let proposal = proposals
            .create(
                proposer,
                CreateProposalRequest {
                    proposer_card_id: offered.id,
                    recipient_card_id: wanted.id,
                    message: None,
                    meeting_location: Some("Praça da Liberdade".to_string()),
                    meeting_at: None,
                },
            )
            .await
            .unwrap();

        let accepted = proposals.accept(proposal.id, recipient).await.unwrap();
        let tx = accepted.transaction;
        assert_eq!(tx.status, TransactionStatus::Negotiating);
        assert_eq!(tx.payment_method, Some(PaymentMethod::InPerson));
        assert_eq!(tx.fee_cents, 0);

        // Payment cannot be confirmed before the meeting is agreed
        let err = engine.confirm_payment(tx.id).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));

        let tx = engine
            .agree_meeting(
                tx.id,
                recipient,
                tradebinder_server::transaction::AgreeMeetingRequest {
                    location: "Praça da Liberdade".to_string(),
                    meeting_at: chrono::Utc::now() + chrono::Duration::days(1),
                },
            )
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.fee_cents, 1_000); // fixed negotiation fee

        let tx = engine.confirm_payment(tx.id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::PaymentConfirmed);
    }
}
