#![allow(async_fn_in_trait)]

use crate::activity::ActivityLog;
use crate::error::{StorageError, StorageResult};
use crate::models::Review;
use campuskubo_core::constants::{MAX_REVIEW_RATING, MIN_REVIEW_RATING};
use chrono::Utc;
use sqlx::SqlitePool;

/// Listing reviews. Each user may review a listing once.
pub trait ReviewRepository: Send + Sync {
    async fn create(
        &self,
        listing_id: i64,
        user_id: i64,
        rating: i64,
        comment: Option<&str>,
    ) -> StorageResult<i64>;

    /// Reviews of a listing, newest first
    async fn list_for_listing(&self, listing_id: i64) -> StorageResult<Vec<Review>>;

    /// Mean rating, `None` without reviews
    async fn average_rating(&self, listing_id: i64) -> StorageResult<Option<f64>>;

    /// Delete a review written by `user_id`
    async fn delete(&self, id: i64, user_id: i64) -> StorageResult<()>;
}

pub struct SqliteReviewRepository {
    pool: SqlitePool,
    activity: ActivityLog,
}

impl SqliteReviewRepository {
    pub fn new(pool: SqlitePool, activity: ActivityLog) -> Self {
        Self { pool, activity }
    }
}

impl ReviewRepository for SqliteReviewRepository {
    async fn create(
        &self,
        listing_id: i64,
        user_id: i64,
        rating: i64,
        comment: Option<&str>,
    ) -> StorageResult<i64> {
        if !(MIN_REVIEW_RATING..=MAX_REVIEW_RATING).contains(&rating) {
            return Err(StorageError::validation(format!(
                "Rating must be between {MIN_REVIEW_RATING} and {MAX_REVIEW_RATING}"
            )));
        }

        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reviews WHERE listing_id = ? AND user_id = ?",
        )
        .bind(listing_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        if existing > 0 {
            return Err(StorageError::conflict("You have already reviewed this listing"));
        }

        let result = sqlx::query(
            "INSERT INTO reviews (listing_id, user_id, rating, comment, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(listing_id)
        .bind(user_id)
        .bind(rating)
        .bind(comment.map(str::trim).filter(|c| !c.is_empty()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.activity
            .log(
                Some(user_id),
                "review_created",
                Some(&format!("Rated listing #{listing_id} {rating}/5")),
            )
            .await;
        Ok(id)
    }

    async fn list_for_listing(&self, listing_id: i64) -> StorageResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(
            r#"
            SELECT id, listing_id, user_id, rating, comment, created_at
            FROM reviews
            WHERE listing_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    async fn average_rating(&self, listing_id: i64) -> StorageResult<Option<f64>> {
        let average: Option<f64> =
            sqlx::query_scalar("SELECT AVG(rating) FROM reviews WHERE listing_id = ?")
                .bind(listing_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(average)
    }

    async fn delete(&self, id: i64, user_id: i64) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Review", "id", id));
        }

        self.activity
            .log(Some(user_id), "review_deleted", Some(&format!("Deleted review #{id}")))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(6)]
    #[case(-1)]
    #[tokio::test]
    async fn test_rating_out_of_range(#[case] rating: i64) {
        let store = test_support::store().await;
        let pm = test_support::pm(&store, "pm@x.com").await;
        let tenant = test_support::tenant(&store, "t@x.com").await;
        let listing = test_support::approved_listing(&store, pm, "1 Main St").await;

        let err = store
            .reviews()
            .create(listing, tenant, rating, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_one_review_per_user_and_average() {
        let store = test_support::store().await;
        let pm = test_support::pm(&store, "pm@x.com").await;
        let a = test_support::tenant(&store, "a@x.com").await;
        let b = test_support::tenant(&store, "b@x.com").await;
        let listing = test_support::approved_listing(&store, pm, "1 Main St").await;
        let reviews = store.reviews();

        assert_eq!(reviews.average_rating(listing).await.unwrap(), None);

        let first = reviews.create(listing, a, 5, Some("Great")).await.unwrap();
        reviews.create(listing, b, 2, None).await.unwrap();
        let err = reviews.create(listing, a, 4, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        assert_eq!(reviews.average_rating(listing).await.unwrap(), Some(3.5));
        assert_eq!(reviews.list_for_listing(listing).await.unwrap().len(), 2);

        assert_eq!(reviews.delete(first, b).await.unwrap_err().kind(), ErrorKind::NotFound);
        reviews.delete(first, a).await.unwrap();
        assert_eq!(reviews.average_rating(listing).await.unwrap(), Some(2.0));
    }
}
