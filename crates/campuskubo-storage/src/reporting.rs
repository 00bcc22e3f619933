//! Aggregate queries behind the admin dashboard.

use crate::error::{StorageError, StorageResult};
use crate::schema::{ensure_allowed_table, ensure_timestamped_table};
use campuskubo_core::{ListingStatus, PaymentStatus, ReportStatus, ReservationStatus, Role};
use chrono::{TimeDelta, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

/// Length of one trend window in days.
pub const TREND_WINDOW_DAYS: i64 = 7;

/// Percentage change between two periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Trend {
    /// Magnitude of the change, rounded to whole percent
    pub percent: i64,
    /// True when the current period grew
    pub up: bool,
}

/// Compare `current` against `previous`.
///
/// Growth from zero reports 100% up.
///
/// # Examples
///
/// ```
/// use campuskubo_storage::reporting::{compute_trend, Trend};
///
/// assert_eq!(compute_trend(5, 0), Trend { percent: 100, up: true });
/// assert_eq!(compute_trend(8, 10), Trend { percent: 20, up: false });
/// ```
pub fn compute_trend(current: i64, previous: i64) -> Trend {
    if previous == 0 {
        return Trend {
            percent: if current > 0 { 100 } else { 0 },
            up: current > 0,
        };
    }

    let change = (current - previous) as f64 / previous as f64 * 100.0;
    Trend {
        percent: change.abs().round() as i64,
        up: current > previous,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleCounts {
    pub tenants: i64,
    pub property_managers: i64,
    pub admins: i64,
    /// Property managers still waiting for approval
    pub pending_property_managers: i64,
}

impl RoleCounts {
    pub fn total(&self) -> i64 {
        self.tenants + self.property_managers + self.admins
    }
}

/// This week's count next to its trend against the week before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeeklyCount {
    pub this_week: i64,
    pub last_week: i64,
    pub trend: Trend,
}

impl WeeklyCount {
    fn new(this_week: i64, last_week: i64) -> Self {
        Self {
            this_week,
            last_week,
            trend: compute_trend(this_week, last_week),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub users: RoleCounts,
    pub listings: Vec<(ListingStatus, i64)>,
    pub reservations: i64,
    pub active_reservations: i64,
    /// Settled payments minus refunds
    pub net_revenue: f64,
    pub open_reports: i64,
    pub new_users: WeeklyCount,
    pub new_listings: WeeklyCount,
    pub new_reservations: WeeklyCount,
}

impl DashboardStats {
    pub fn listings_with(&self, status: ListingStatus) -> i64 {
        self.listings
            .iter()
            .find(|(s, _)| *s == status)
            .map_or(0, |(_, n)| *n)
    }
}

#[derive(Debug, Clone)]
pub struct Reporting {
    pool: SqlitePool,
}

impl Reporting {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Rows of `table` created between `start_days_ago` and `end_days_ago`.
    ///
    /// The window is half-open: `[now - start, now - end)`.
    ///
    /// # Errors
    ///
    /// `Validation` for a table outside the allow-list, a table without
    /// `created_at`, or a window whose start is more recent than its end.
    pub async fn count_rows_in_period(
        &self,
        table: &str,
        start_days_ago: i64,
        end_days_ago: i64,
    ) -> StorageResult<i64> {
        ensure_allowed_table(table)?;
        ensure_timestamped_table(table)?;
        if start_days_ago < end_days_ago || end_days_ago < 0 {
            return Err(StorageError::validation(format!(
                "Invalid period: {start_days_ago} to {end_days_ago} days ago"
            )));
        }

        let now = Utc::now();
        let from = now - TimeDelta::days(start_days_ago);
        let until = now - TimeDelta::days(end_days_ago);

        let sql = format!("SELECT COUNT(*) FROM {table} WHERE created_at >= ? AND created_at < ?");
        let count = sqlx::query_scalar(&sql)
            .bind(from)
            .bind(until)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn weekly(&self, table: &str) -> StorageResult<WeeklyCount> {
        let this_week = self.count_rows_in_period(table, TREND_WINDOW_DAYS, 0).await?;
        let last_week = self
            .count_rows_in_period(table, 2 * TREND_WINDOW_DAYS, TREND_WINDOW_DAYS)
            .await?;
        Ok(WeeklyCount::new(this_week, last_week))
    }

    async fn role_counts(&self) -> StorageResult<RoleCounts> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT role, COUNT(*), SUM(CASE WHEN is_verified = 0 THEN 1 ELSE 0 END)
            FROM users
            WHERE deleted_at IS NULL
            GROUP BY role
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = RoleCounts::default();
        for (role, count, unverified) in rows {
            match Role::normalize(&role) {
                Some(Role::Tenant) => counts.tenants += count,
                Some(Role::PropertyManager) => {
                    counts.property_managers += count;
                    counts.pending_property_managers += unverified;
                }
                Some(Role::Admin) => counts.admins += count,
                None => {}
            }
        }
        Ok(counts)
    }

    async fn listing_counts(&self) -> StorageResult<Vec<(ListingStatus, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM listings GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts: Vec<(ListingStatus, i64)> =
            ListingStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for (raw, count) in rows {
            if let Ok(status) = raw.parse::<ListingStatus>()
                && let Some(slot) = counts.iter_mut().find(|(s, _)| *s == status)
            {
                slot.1 += count;
            }
        }
        Ok(counts)
    }

    async fn net_revenue(&self) -> StorageResult<f64> {
        let revenue: f64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount - refunded_amount), 0.0)
            FROM payments
            WHERE status IN (?, ?, ?)
            "#,
        )
        .bind(PaymentStatus::Completed.as_str())
        .bind(PaymentStatus::PartiallyRefunded.as_str())
        .bind(PaymentStatus::Refunded.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(revenue)
    }

    /// Everything the admin dashboard shows, in one call.
    pub async fn dashboard_stats(&self) -> StorageResult<DashboardStats> {
        let reservations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations")
            .fetch_one(&self.pool)
            .await?;

        let active_reservations: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE status IN (?, ?, ?)")
                .bind(ReservationStatus::Pending.as_str())
                .bind(ReservationStatus::Approved.as_str())
                .bind(ReservationStatus::Confirmed.as_str())
                .fetch_one(&self.pool)
                .await?;

        let open_reports: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports WHERE status = ?")
            .bind(ReportStatus::Open.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(DashboardStats {
            users: self.role_counts().await?,
            listings: self.listing_counts().await?,
            reservations,
            active_reservations,
            net_revenue: self.net_revenue().await?,
            open_reports,
            new_users: self.weekly("users").await?,
            new_listings: self.weekly("listings").await?,
            new_reservations: self.weekly("reservations").await?,
        })
    }
}
