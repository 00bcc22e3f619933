//! Tenant-facing interaction records: reviews, messages and reports.

use campuskubo_core::ReportStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rating left by a user on a listing. One per user per listing.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub listing_id: i64,
    pub user_id: i64,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Direct message between two users, optionally about a listing.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub listing_id: Option<i64>,
    pub body: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Abuse or problem report filed by a user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Report {
    pub id: i64,
    pub reporter_id: i64,
    pub listing_id: Option<i64>,
    pub reason: String,
    pub details: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}
