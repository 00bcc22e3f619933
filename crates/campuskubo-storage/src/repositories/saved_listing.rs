#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::Listing;
use chrono::Utc;
use sqlx::SqlitePool;

/// A tenant's bookmarked listings
pub trait SavedListingRepository: Send + Sync {
    /// Bookmark a listing. Saving twice is a no-op; returns whether a row was added.
    async fn save(&self, user_id: i64, listing_id: i64) -> StorageResult<bool>;

    /// Remove a bookmark; returns whether one existed
    async fn unsave(&self, user_id: i64, listing_id: i64) -> StorageResult<bool>;

    async fn is_saved(&self, user_id: i64, listing_id: i64) -> StorageResult<bool>;

    /// Bookmarked listings, most recently saved first
    async fn list_saved(&self, user_id: i64) -> StorageResult<Vec<Listing>>;
}

pub struct SqliteSavedListingRepository {
    pool: SqlitePool,
}

impl SqliteSavedListingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SavedListingRepository for SqliteSavedListingRepository {
    async fn save(&self, user_id: i64, listing_id: i64) -> StorageResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO saved_listings (user_id, listing_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(listing_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn unsave(&self, user_id: i64, listing_id: i64) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM saved_listings WHERE user_id = ? AND listing_id = ?")
            .bind(user_id)
            .bind(listing_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_saved(&self, user_id: i64, listing_id: i64) -> StorageResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM saved_listings WHERE user_id = ? AND listing_id = ?",
        )
        .bind(user_id)
        .bind(listing_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn list_saved(&self, user_id: i64) -> StorageResult<Vec<Listing>> {
        let listings = sqlx::query_as::<_, Listing>(
            r#"
            SELECT l.id, l.pm_id, l.address, l.price, l.description, l.lodging_details,
                   l.status, l.created_at, l.updated_at
            FROM saved_listings s
            JOIN listings l ON l.id = s.listing_id
            WHERE s.user_id = ?
            ORDER BY s.created_at DESC, s.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(listings)
    }
}
