#![allow(async_fn_in_trait)]

use crate::activity::ActivityLog;
use crate::error::{StorageError, StorageResult};
use crate::models::{NewPayment, Payment};
use campuskubo_core::PaymentStatus;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

const PAYMENT_COLUMNS: &str = "id, user_id, listing_id, reservation_id, amount, status, \
    refunded_amount, refund_reason, payment_method, created_at, updated_at";

/// Tolerance for comparing money amounts stored as REAL.
const AMOUNT_EPSILON: f64 = 1e-9;

/// Payments and refunds
///
/// A refund raises the payment's running `refunded_amount`; once it reaches
/// the paid amount the payment is `refunded`, before that it is
/// `partially_refunded`.
pub trait PaymentRepository: Send + Sync {
    async fn create_payment(&self, payment: &NewPayment) -> StorageResult<i64>;

    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Payment>>;

    /// Payments made by one user, newest first
    async fn list_for_user(&self, user_id: i64) -> StorageResult<Vec<Payment>>;

    /// Refund statuses are rejected; use [`PaymentRepository::refund`]
    async fn update_status(&self, id: i64, status: PaymentStatus) -> StorageResult<()>;

    /// Refund part or all of a completed payment; returns the new status
    async fn refund(&self, id: i64, amount: f64, reason: &str) -> StorageResult<PaymentStatus>;
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
    activity: ActivityLog,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool, activity: ActivityLog) -> Self {
        Self { pool, activity }
    }
}

impl PaymentRepository for SqlitePaymentRepository {
    async fn create_payment(&self, payment: &NewPayment) -> StorageResult<i64> {
        if !payment.amount.is_finite() || payment.amount <= 0.0 {
            return Err(StorageError::validation("Amount must be greater than zero"));
        }
        if matches!(
            payment.status,
            PaymentStatus::PartiallyRefunded | PaymentStatus::Refunded
        ) {
            return Err(StorageError::validation(
                "New payments cannot start refunded",
            ));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO payments (user_id, listing_id, reservation_id, amount, status, payment_method, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.user_id)
        .bind(payment.listing_id)
        .bind(payment.reservation_id)
        .bind(payment.amount)
        .bind(payment.status.as_str())
        .bind(&payment.payment_method)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!(payment_id = id, amount = payment.amount, "Payment recorded");
        self.activity
            .log(
                Some(payment.user_id),
                "payment_created",
                Some(&format!("Payment #{id} of {:.2}", payment.amount)),
            )
            .await;
        Ok(id)
    }

    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    async fn list_for_user(&self, user_id: i64) -> StorageResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = ? ORDER BY created_at DESC, id DESC"
        );
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }

    async fn update_status(&self, id: i64, status: PaymentStatus) -> StorageResult<()> {
        if matches!(status, PaymentStatus::PartiallyRefunded | PaymentStatus::Refunded) {
            return Err(StorageError::validation("Refund statuses are set by recording a refund"));
        }

        let result = sqlx::query("UPDATE payments SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Payment", "id", id));
        }

        self.activity
            .log(
                None,
                "payment_status_changed",
                Some(&format!("Payment #{id} set to {status}")),
            )
            .await;
        Ok(())
    }

    async fn refund(&self, id: i64, amount: f64, reason: &str) -> StorageResult<PaymentStatus> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(StorageError::validation(
                "Refund amount must be greater than zero",
            ));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(StorageError::validation("Refund reason is required"));
        }

        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StorageError::not_found("Payment", "id", id))?;

        if !payment.status.is_refundable() {
            return Err(StorageError::conflict(format!(
                "Payment #{id} is {} and cannot be refunded",
                payment.status
            )));
        }
        let balance = payment.refundable_balance();
        if amount > balance + AMOUNT_EPSILON {
            return Err(StorageError::validation(format!(
                "Refund of {amount:.2} exceeds the refundable balance of {balance:.2}"
            )));
        }

        let refunded = (payment.refunded_amount + amount).min(payment.amount);
        let status = if payment.amount - refunded <= AMOUNT_EPSILON {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };

        sqlx::query(
            r#"
            UPDATE payments
            SET refunded_amount = ?, refund_reason = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(refunded)
        .bind(reason)
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(payment_id = id, amount, status = %status, "Payment refunded");
        self.activity
            .log(
                Some(payment.user_id),
                "payment_refunded",
                Some(&format!("Refunded {amount:.2} of payment #{id}: {reason}")),
            )
            .await;
        Ok(status)
    }
}
