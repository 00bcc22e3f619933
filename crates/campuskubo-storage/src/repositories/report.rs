#![allow(async_fn_in_trait)]

use crate::activity::ActivityLog;
use crate::error::{StorageError, StorageResult};
use crate::models::Report;
use campuskubo_core::ReportStatus;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

const REPORT_COLUMNS: &str =
    "id, reporter_id, listing_id, reason, details, status, created_at, resolved_at";

/// User-filed reports for administrators
pub trait ReportRepository: Send + Sync {
    async fn create(
        &self,
        reporter_id: i64,
        listing_id: Option<i64>,
        reason: &str,
        details: Option<&str>,
    ) -> StorageResult<i64>;

    /// Reports, optionally in one status, newest first
    async fn list(&self, status: Option<ReportStatus>) -> StorageResult<Vec<Report>>;

    /// Resolve, dismiss or reopen a report
    async fn update_status(
        &self,
        id: i64,
        status: ReportStatus,
        admin_id: Option<i64>,
    ) -> StorageResult<()>;
}

pub struct SqliteReportRepository {
    pool: SqlitePool,
    activity: ActivityLog,
}

impl SqliteReportRepository {
    pub fn new(pool: SqlitePool, activity: ActivityLog) -> Self {
        Self { pool, activity }
    }
}

impl ReportRepository for SqliteReportRepository {
    async fn create(
        &self,
        reporter_id: i64,
        listing_id: Option<i64>,
        reason: &str,
        details: Option<&str>,
    ) -> StorageResult<i64> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(StorageError::validation("A reason is required"));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO reports (reporter_id, listing_id, reason, details, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(reporter_id)
        .bind(listing_id)
        .bind(reason)
        .bind(details.map(str::trim).filter(|d| !d.is_empty()))
        .bind(ReportStatus::Open.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.activity
            .log(Some(reporter_id), "report_filed", Some(&format!("Report #{id}: {reason}")))
            .await;
        Ok(id)
    }

    async fn list(&self, status: Option<ReportStatus>) -> StorageResult<Vec<Report>> {
        let reports = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {REPORT_COLUMNS} FROM reports WHERE status = ? ORDER BY created_at DESC, id DESC"
                );
                sqlx::query_as::<_, Report>(&sql)
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {REPORT_COLUMNS} FROM reports ORDER BY created_at DESC, id DESC"
                );
                sqlx::query_as::<_, Report>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(reports)
    }

    async fn update_status(
        &self,
        id: i64,
        status: ReportStatus,
        admin_id: Option<i64>,
    ) -> StorageResult<()> {
        let resolved_at = (status != ReportStatus::Open).then(Utc::now);

        let result = sqlx::query("UPDATE reports SET status = ?, resolved_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(resolved_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Report", "id", id));
        }

        info!(report_id = id, status = %status, "Report status changed");
        self.activity
            .log(admin_id, "report_updated", Some(&format!("Report #{id} set to {status}")))
            .await;
        Ok(())
    }
}
