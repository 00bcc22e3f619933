use campuskubo_core::ReservationStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A tenant's booking request for a listing.
///
/// Dates are calendar days. Overlapping reservations are allowed; the
/// property manager resolves them by approving or rejecting.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reservation {
    pub id: i64,
    pub listing_id: i64,
    pub tenant_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Length of stay in days
    pub fn nights(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }
}

/// Input for [`crate::repositories::ReservationRepository::create_reservation`].
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub listing_id: i64,
    pub tenant_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Room-occupancy record created when a tenant moves in.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantRecord {
    pub id: i64,
    pub user_id: i64,
    pub listing_id: i64,
    pub room_number: Option<String>,
    pub move_in_date: Option<NaiveDate>,
    pub move_out_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}
