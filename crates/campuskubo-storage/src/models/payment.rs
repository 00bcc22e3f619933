use campuskubo_core::PaymentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payment for a listing or reservation.
///
/// Refunds do not create ledger rows; `refunded_amount` is a running total
/// that never exceeds `amount`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub listing_id: Option<i64>,
    pub reservation_id: Option<i64>,
    pub amount: f64,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    pub refunded_amount: f64,
    pub refund_reason: Option<String>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Amount still available for refund
    pub fn refundable_balance(&self) -> f64 {
        (self.amount - self.refunded_amount).max(0.0)
    }

    /// Amount kept after refunds
    pub fn net_amount(&self) -> f64 {
        self.amount - self.refunded_amount
    }
}

/// Input for [`crate::repositories::PaymentRepository::create_payment`].
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: i64,
    pub listing_id: Option<i64>,
    pub reservation_id: Option<i64>,
    pub amount: f64,
    pub payment_method: Option<String>,
    pub status: PaymentStatus,
}

impl NewPayment {
    pub fn new(user_id: i64, amount: f64) -> Self {
        Self {
            user_id,
            listing_id: None,
            reservation_id: None,
            amount,
            payment_method: None,
            status: PaymentStatus::Pending,
        }
    }

    pub fn for_reservation(mut self, listing_id: i64, reservation_id: i64) -> Self {
        self.listing_id = Some(listing_id);
        self.reservation_id = Some(reservation_id);
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = Some(method.into());
        self
    }

    pub fn status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }
}
