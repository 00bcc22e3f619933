#![allow(async_fn_in_trait)]

use crate::activity::ActivityLog;
use crate::error::{StorageError, StorageResult};
use crate::models::{NewReservation, Reservation, TenantRecord};
use campuskubo_core::{ListingStatus, ReservationStatus};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, warn};

const RESERVATION_COLUMNS: &str =
    "r.id, r.listing_id, r.tenant_id, r.start_date, r.end_date, r.status, r.created_at, r.updated_at";

/// Repository trait for reservations and the room records they turn into
///
/// Overlapping date ranges are not rejected; the property manager decides
/// between competing requests.
pub trait ReservationRepository: Send + Sync {
    /// Request a stay at an approved listing
    async fn create_reservation(&self, reservation: &NewReservation) -> StorageResult<i64>;

    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Reservation>>;

    /// Reservations made by one tenant, newest first
    async fn list_for_tenant(&self, tenant_id: i64) -> StorageResult<Vec<Reservation>>;

    /// Reservations on every listing owned by `pm_id`, newest first
    async fn list_for_listing_owner(&self, pm_id: i64) -> StorageResult<Vec<Reservation>>;

    /// Property-manager decision on a reservation for one of their listings
    async fn update_status(
        &self,
        id: i64,
        pm_id: i64,
        status: ReservationStatus,
    ) -> StorageResult<()>;

    /// Tenant withdraws their own reservation
    async fn cancel(&self, id: i64, tenant_id: i64) -> StorageResult<()>;

    /// Turn an accepted reservation into a room-occupancy record
    async fn record_move_in(
        &self,
        reservation_id: i64,
        pm_id: i64,
        room_number: Option<&str>,
    ) -> StorageResult<i64>;

    /// Close a room-occupancy record
    async fn record_move_out(
        &self,
        record_id: i64,
        pm_id: i64,
        date: NaiveDate,
    ) -> StorageResult<()>;

    /// Tenants currently living at a listing
    async fn occupants(&self, listing_id: i64) -> StorageResult<Vec<TenantRecord>>;
}

/// SQLite implementation of ReservationRepository
pub struct SqliteReservationRepository {
    pool: SqlitePool,
    activity: ActivityLog,
}

impl SqliteReservationRepository {
    pub fn new(pool: SqlitePool, activity: ActivityLog) -> Self {
        Self { pool, activity }
    }

    /// Reservation joined with the owner of its listing.
    async fn with_owner(&self, id: i64) -> StorageResult<(Reservation, i64)> {
        let reservation = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| StorageError::not_found("Reservation", "id", id))?;

        let owner: i64 = sqlx::query_scalar("SELECT pm_id FROM listings WHERE id = ?")
            .bind(reservation.listing_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((reservation, owner))
    }

    async fn write_status(
        &self,
        reservation: &Reservation,
        status: ReservationStatus,
        notify_user: i64,
        message: &str,
    ) -> StorageResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE reservations SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now)
            .bind(reservation.id)
            .execute(&mut *tx)
            .await?;

        notify(&mut tx, notify_user, message, reservation.id, now).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Queue a reservation notification inside an open transaction.
async fn notify(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    message: &str,
    reservation_id: i64,
    now: DateTime<Utc>,
) -> StorageResult<()> {
    sqlx::query(
        r#"
        INSERT INTO notifications (user_id, type, category, message, reference_id, reference_type, created_at)
        VALUES (?, 'info', 'reservation', ?, ?, 'reservation', ?)
        "#,
    )
    .bind(user_id)
    .bind(message)
    .bind(reservation_id)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn ensure_open(reservation: &Reservation) -> StorageResult<()> {
    if reservation.status.is_terminal() {
        return Err(StorageError::conflict(format!(
            "Reservation #{} is already {}",
            reservation.id, reservation.status
        )));
    }
    Ok(())
}

impl ReservationRepository for SqliteReservationRepository {
    async fn create_reservation(&self, reservation: &NewReservation) -> StorageResult<i64> {
        if reservation.end_date < reservation.start_date {
            return Err(StorageError::validation(
                "End date must not be before start date",
            ));
        }

        let listing: Option<(i64, String)> =
            sqlx::query_as("SELECT pm_id, status FROM listings WHERE id = ?")
                .bind(reservation.listing_id)
                .fetch_optional(&self.pool)
                .await?;
        let Some((pm_id, status)) = listing else {
            return Err(StorageError::not_found("Listing", "id", reservation.listing_id));
        };
        let status: ListingStatus = status.parse()?;
        if !status.is_bookable() {
            return Err(StorageError::validation(
                "Listing is not available for booking",
            ));
        }

        let tenant: Option<(bool, Option<DateTime<Utc>>)> =
            sqlx::query_as("SELECT is_active, deleted_at FROM users WHERE id = ?")
                .bind(reservation.tenant_id)
                .fetch_optional(&self.pool)
                .await?;
        match tenant {
            None => return Err(StorageError::not_found("User", "id", reservation.tenant_id)),
            Some((active, deleted_at)) if !active || deleted_at.is_some() => {
                return Err(StorageError::unauthorized(
                    "Deactivated accounts cannot make reservations",
                ));
            }
            Some(_) => {}
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO reservations (listing_id, tenant_id, start_date, end_date, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(reservation.listing_id)
        .bind(reservation.tenant_id)
        .bind(reservation.start_date)
        .bind(reservation.end_date)
        .bind(ReservationStatus::Pending.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        notify(
            &mut tx,
            pm_id,
            &format!("New reservation request for listing #{}", reservation.listing_id),
            id,
            now,
        )
        .await?;
        tx.commit().await?;

        info!(reservation_id = id, listing_id = reservation.listing_id, "Reservation created");
        self.activity
            .log(
                Some(reservation.tenant_id),
                "reservation_created",
                Some(&format!(
                    "Reserved listing #{} from {} to {}",
                    reservation.listing_id, reservation.start_date, reservation.end_date
                )),
            )
            .await;
        Ok(id)
    }

    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Reservation>> {
        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations r WHERE r.id = ?");
        let reservation = sqlx::query_as::<_, Reservation>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(reservation)
    }

    async fn list_for_tenant(&self, tenant_id: i64) -> StorageResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations r WHERE r.tenant_id = ? \
             ORDER BY r.created_at DESC, r.id DESC"
        );
        let reservations = sqlx::query_as::<_, Reservation>(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(reservations)
    }

    async fn list_for_listing_owner(&self, pm_id: i64) -> StorageResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations r \
             JOIN listings l ON l.id = r.listing_id \
             WHERE l.pm_id = ? \
             ORDER BY r.created_at DESC, r.id DESC"
        );
        let reservations = sqlx::query_as::<_, Reservation>(&sql)
            .bind(pm_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(reservations)
    }

    async fn update_status(
        &self,
        id: i64,
        pm_id: i64,
        status: ReservationStatus,
    ) -> StorageResult<()> {
        let (reservation, owner) = self.with_owner(id).await?;
        if owner != pm_id {
            warn!(reservation_id = id, pm_id, owner, "Reservation ownership check failed");
            return Err(StorageError::unauthorized(
                "You can only manage reservations for your own listings",
            ));
        }
        ensure_open(&reservation)?;

        self.write_status(
            &reservation,
            status,
            reservation.tenant_id,
            &format!("Your reservation #{id} is now {status}"),
        )
        .await?;

        info!(reservation_id = id, status = %status, "Reservation status changed");
        self.activity
            .log(
                Some(pm_id),
                "reservation_status_changed",
                Some(&format!("Reservation #{id} set to {status}")),
            )
            .await;
        Ok(())
    }

    async fn cancel(&self, id: i64, tenant_id: i64) -> StorageResult<()> {
        let (reservation, owner) = self.with_owner(id).await?;
        if reservation.tenant_id != tenant_id {
            return Err(StorageError::unauthorized(
                "You can only cancel your own reservations",
            ));
        }
        ensure_open(&reservation)?;

        self.write_status(
            &reservation,
            ReservationStatus::Cancelled,
            owner,
            &format!("Reservation #{id} was cancelled by the tenant"),
        )
        .await?;

        self.activity
            .log(
                Some(tenant_id),
                "reservation_cancelled",
                Some(&format!("Cancelled reservation #{id}")),
            )
            .await;
        Ok(())
    }

    async fn record_move_in(
        &self,
        reservation_id: i64,
        pm_id: i64,
        room_number: Option<&str>,
    ) -> StorageResult<i64> {
        let (reservation, owner) = self.with_owner(reservation_id).await?;
        if owner != pm_id {
            return Err(StorageError::unauthorized(
                "You can only manage tenants of your own listings",
            ));
        }
        if !matches!(
            reservation.status,
            ReservationStatus::Approved | ReservationStatus::Confirmed
        ) {
            return Err(StorageError::validation(
                "Only approved reservations can move in",
            ));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let open: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tenants
            WHERE user_id = ? AND listing_id = ? AND move_out_date IS NULL
            "#,
        )
        .bind(reservation.tenant_id)
        .bind(reservation.listing_id)
        .fetch_one(&mut *tx)
        .await?;
        if open > 0 {
            return Err(StorageError::conflict("Tenant already occupies a room in this listing"));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO tenants (user_id, listing_id, room_number, move_in_date, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(reservation.tenant_id)
        .bind(reservation.listing_id)
        .bind(room_number.map(str::trim).filter(|r| !r.is_empty()))
        .bind(reservation.start_date)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE reservations SET status = ?, updated_at = ? WHERE id = ?")
            .bind(ReservationStatus::Confirmed.as_str())
            .bind(now)
            .bind(reservation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let record_id = result.last_insert_rowid();
        self.activity
            .log(
                Some(pm_id),
                "tenant_moved_in",
                Some(&format!(
                    "Tenant #{} moved into listing #{}",
                    reservation.tenant_id, reservation.listing_id
                )),
            )
            .await;
        Ok(record_id)
    }

    async fn record_move_out(
        &self,
        record_id: i64,
        pm_id: i64,
        date: NaiveDate,
    ) -> StorageResult<()> {
        let record: Option<(i64, Option<NaiveDate>, Option<NaiveDate>)> = sqlx::query_as(
            r#"
            SELECT l.pm_id, t.move_in_date, t.move_out_date
            FROM tenants t
            JOIN listings l ON l.id = t.listing_id
            WHERE t.id = ?
            "#,
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((owner, move_in, move_out)) = record else {
            return Err(StorageError::not_found("TenantRecord", "id", record_id));
        };
        if owner != pm_id {
            return Err(StorageError::unauthorized(
                "You can only manage tenants of your own listings",
            ));
        }
        if move_out.is_some() {
            return Err(StorageError::conflict("Tenant has already moved out"));
        }
        if let Some(move_in) = move_in
            && date < move_in
        {
            return Err(StorageError::validation(
                "Move-out date must not be before move-in date",
            ));
        }

        sqlx::query("UPDATE tenants SET move_out_date = ? WHERE id = ?")
            .bind(date)
            .bind(record_id)
            .execute(&self.pool)
            .await?;

        self.activity
            .log(
                Some(pm_id),
                "tenant_moved_out",
                Some(&format!("Room record #{record_id} closed on {date}")),
            )
            .await;
        Ok(())
    }

    async fn occupants(&self, listing_id: i64) -> StorageResult<Vec<TenantRecord>> {
        let records = sqlx::query_as::<_, TenantRecord>(
            r#"
            SELECT id, user_id, listing_id, room_number, move_in_date, move_out_date, created_at
            FROM tenants
            WHERE listing_id = ? AND move_out_date IS NULL
            ORDER BY room_number, id
            "#,
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
