//! Transaction lifecycle rules
//!
//! The pure half of the transaction engine: which status edges are legal,
//! how the two sides of a trade fold into the aggregate status, the shipment
//! deadline, and the fee arithmetic. Everything here is side-effect free so
//! the rules can be tested without a database.

use chrono::{DateTime, Duration, Utc};

use super::model::{TradeSideStatus, TransactionStatus};

/// Platform fee on sales, in basis points (3% of the card price, charged to
/// the buyer on top of the price).
pub const PLATFORM_FEE_BPS: i64 = 300;

/// Fixed fee charged when an in-person trade meeting is agreed (R$ 10.00).
pub const NEGOTIATION_FEE_CENTS: i64 = 1_000;

/// Days a seller (or both trade parties) has to ship after payment is
/// confirmed.
pub const SHIPMENT_DEADLINE_DAYS: i64 = 2;

impl TransactionStatus {
    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Cancelled)
    }
}

/// Whether `from -> to` is a legal edge of the transaction state machine.
///
/// Sales and trades share the same aggregate edges; `Negotiating` is only
/// ever entered by in-person trades. `Cancelled` is reachable from any
/// non-terminal state except `Disputed`, which freezes the transaction until
/// the dispute resolves (to `Completed` or `Cancelled`).
pub fn can_transition(from: TransactionStatus, to: TransactionStatus) -> bool {
    use TransactionStatus::*;

    if from.is_terminal() {
        return false;
    }
    match (from, to) {
        (Negotiating, Pending) => true,
        (Pending, PaymentConfirmed) => true,
        (PaymentConfirmed, Shipped) => true,
        (Shipped, Delivered) => true,
        (Delivered, Completed) => true,
        (PaymentConfirmed | Shipped | Delivered, Disputed) => true,
        (Disputed, Completed | Cancelled) => true,
        (Disputed, _) => false,
        (_, Cancelled) => true,
        _ => false,
    }
}

impl TradeSideStatus {
    fn rank(&self) -> u8 {
        match self {
            TradeSideStatus::Packaging => 0,
            TradeSideStatus::Shipped => 1,
            TradeSideStatus::Delivered => 2,
            TradeSideStatus::Confirmed => 3,
        }
    }

    /// Side progress is strictly forward, one step at a time.
    pub fn can_advance_to(&self, next: TradeSideStatus) -> bool {
        next.rank() == self.rank() + 1
    }
}

/// Fold the two sides of a trade into the aggregate status.
///
/// The aggregate lags the slower side: it only reads `shipped` once both
/// parcels are in the mail, `delivered` once both arrived, and `completed`
/// once both parties confirmed what they received.
pub fn aggregate_trade_status(
    buyer_side: TradeSideStatus,
    seller_side: TradeSideStatus,
) -> TransactionStatus {
    let min = buyer_side.rank().min(seller_side.rank());
    match min {
        0 => TransactionStatus::PaymentConfirmed,
        1 => TransactionStatus::Shipped,
        2 => TransactionStatus::Delivered,
        _ => TransactionStatus::Completed,
    }
}

/// Absolute deadline for shipment, anchored at payment confirmation.
pub fn shipment_deadline(payment_confirmed_at: DateTime<Utc>) -> DateTime<Utc> {
    payment_confirmed_at + Duration::days(SHIPMENT_DEADLINE_DAYS)
}

/// Whether a transaction sitting in `payment_confirmed` has outlived its
/// shipment window. Evaluated lazily on the next access; there is no
/// background timer.
pub fn past_shipment_deadline(
    status: TransactionStatus,
    payment_confirmed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    status == TransactionStatus::PaymentConfirmed
        && payment_confirmed_at
            .map(|t| now > shipment_deadline(t))
            .unwrap_or(false)
}

/// Platform fee for a sale of the given amount, rounded down to the cent.
pub fn sale_fee_cents(amount_cents: i64) -> i64 {
    amount_cents * PLATFORM_FEE_BPS / 10_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use TradeSideStatus::*;
    use TransactionStatus::*;

    #[test]
    fn test_happy_path_edges() {
        assert!(can_transition(Pending, PaymentConfirmed));
        assert!(can_transition(PaymentConfirmed, TransactionStatus::Shipped));
        assert!(can_transition(TransactionStatus::Shipped, TransactionStatus::Delivered));
        assert!(can_transition(TransactionStatus::Delivered, Completed));
    }

    #[test]
    fn test_no_skipping_forward() {
        assert!(!can_transition(Pending, TransactionStatus::Shipped));
        assert!(!can_transition(Pending, TransactionStatus::Delivered));
        assert!(!can_transition(PaymentConfirmed, TransactionStatus::Delivered));
        assert!(!can_transition(PaymentConfirmed, Completed));
        assert!(!can_transition(TransactionStatus::Shipped, Completed));
    }

    #[test]
    fn test_no_moving_backward() {
        assert!(!can_transition(TransactionStatus::Shipped, PaymentConfirmed));
        assert!(!can_transition(TransactionStatus::Delivered, TransactionStatus::Shipped));
        assert!(!can_transition(Completed, TransactionStatus::Delivered));
    }

    #[test]
    fn test_cancel_from_non_terminal() {
        assert!(can_transition(Negotiating, Cancelled));
        assert!(can_transition(Pending, Cancelled));
        assert!(can_transition(PaymentConfirmed, Cancelled));
        assert!(can_transition(TransactionStatus::Shipped, Cancelled));
        assert!(can_transition(TransactionStatus::Delivered, Cancelled));
    }

    #[test]
    fn test_terminal_states_are_dead_ends() {
        for to in [
            Negotiating,
            Pending,
            PaymentConfirmed,
            TransactionStatus::Shipped,
            TransactionStatus::Delivered,
            Completed,
            Cancelled,
            Disputed,
        ] {
            assert!(!can_transition(Completed, to), "completed -> {:?}", to);
            assert!(!can_transition(Cancelled, to), "cancelled -> {:?}", to);
        }
    }

    #[test]
    fn test_dispute_window() {
        assert!(!can_transition(Pending, Disputed));
        assert!(can_transition(PaymentConfirmed, Disputed));
        assert!(can_transition(TransactionStatus::Shipped, Disputed));
        assert!(can_transition(TransactionStatus::Delivered, Disputed));

        // Disputed is frozen except for resolution outcomes
        assert!(can_transition(Disputed, Completed));
        assert!(can_transition(Disputed, Cancelled));
        assert!(!can_transition(Disputed, TransactionStatus::Shipped));
        assert!(!can_transition(Disputed, TransactionStatus::Delivered));
    }

    #[test]
    fn test_side_advances_one_step() {
        assert!(Packaging.can_advance_to(TradeSideStatus::Shipped));
        assert!(TradeSideStatus::Shipped.can_advance_to(TradeSideStatus::Delivered));
        assert!(TradeSideStatus::Delivered.can_advance_to(Confirmed));

        assert!(!Packaging.can_advance_to(TradeSideStatus::Delivered));
        assert!(!TradeSideStatus::Shipped.can_advance_to(Confirmed));
        assert!(!Confirmed.can_advance_to(Packaging));
        assert!(!TradeSideStatus::Delivered.can_advance_to(TradeSideStatus::Shipped));
    }

    #[test]
    fn test_aggregate_lags_slower_side() {
        assert_eq!(aggregate_trade_status(Packaging, Packaging), PaymentConfirmed);
        assert_eq!(aggregate_trade_status(TradeSideStatus::Shipped, Packaging), PaymentConfirmed);
        assert_eq!(
            aggregate_trade_status(TradeSideStatus::Shipped, TradeSideStatus::Shipped),
            TransactionStatus::Shipped
        );
        assert_eq!(
            aggregate_trade_status(TradeSideStatus::Delivered, TradeSideStatus::Shipped),
            TransactionStatus::Shipped
        );
        assert_eq!(
            aggregate_trade_status(TradeSideStatus::Delivered, TradeSideStatus::Delivered),
            TransactionStatus::Delivered
        );
        assert_eq!(
            aggregate_trade_status(Confirmed, TradeSideStatus::Delivered),
            TransactionStatus::Delivered
        );
        assert_eq!(aggregate_trade_status(Confirmed, Confirmed), Completed);
    }

    #[test]
    fn test_shipment_deadline_math() {
        let paid_at = Utc::now();
        let deadline = shipment_deadline(paid_at);
        assert_eq!(deadline - paid_at, Duration::days(2));

        assert!(!past_shipment_deadline(
            PaymentConfirmed,
            Some(paid_at),
            paid_at + Duration::days(1)
        ));
        assert!(past_shipment_deadline(
            PaymentConfirmed,
            Some(paid_at),
            paid_at + Duration::days(3)
        ));
        // Only payment_confirmed is subject to the window
        assert!(!past_shipment_deadline(
            TransactionStatus::Shipped,
            Some(paid_at),
            paid_at + Duration::days(3)
        ));
        assert!(!past_shipment_deadline(
            PaymentConfirmed,
            None,
            paid_at + Duration::days(3)
        ));
    }

    #[test]
    fn test_sale_fee() {
        // 3% of R$ 450.00 is R$ 13.50
        assert_eq!(sale_fee_cents(45_000), 1_350);
        // rounds down to the cent
        assert_eq!(sale_fee_cents(33), 0);
        assert_eq!(sale_fee_cents(100), 3);
    }
}
