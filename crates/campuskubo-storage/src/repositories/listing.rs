#![allow(async_fn_in_trait)]

use crate::activity::ActivityLog;
use crate::error::{StorageError, StorageResult};
use crate::models::{Listing, ListingFilter, ListingImage, ListingUpdate, NewListing};
use campuskubo_core::{ListingStatus, Role};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};

const LISTING_COLUMNS: &str =
    "id, pm_id, address, price, description, lodging_details, status, created_at, updated_at";

/// Repository trait for listings and their images
///
/// Methods taking a `pm_id` enforce ownership: the listing's stored owner
/// must equal the caller. The admin variants ([`ListingRepository::set_status`],
/// [`ListingRepository::admin_delete`]) skip that check.
pub trait ListingRepository: Send + Sync {
    /// Create a pending listing together with its images.
    ///
    /// The owner must be an active property manager, the address must be
    /// non-empty and the price positive.
    async fn create_listing(&self, listing: &NewListing) -> StorageResult<i64>;

    /// Find a listing by id, images included
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Listing>>;

    /// All listings in one status, newest first
    async fn list_by_status(&self, status: ListingStatus) -> StorageResult<Vec<Listing>>;

    /// All listings of one property manager, newest first
    async fn list_by_owner(&self, pm_id: i64) -> StorageResult<Vec<Listing>>;

    /// Text and price search; approved listings unless a status is given
    async fn search(&self, filter: &ListingFilter) -> StorageResult<Vec<Listing>>;

    /// Apply a partial update to a listing owned by `pm_id`
    async fn update_listing(
        &self,
        id: i64,
        pm_id: i64,
        update: &ListingUpdate,
    ) -> StorageResult<()>;

    /// Delete a listing owned by `pm_id`
    async fn delete_listing(&self, id: i64, pm_id: i64) -> StorageResult<()>;

    /// Moderation: change the status of any listing
    async fn set_status(
        &self,
        id: i64,
        status: ListingStatus,
        admin_id: Option<i64>,
    ) -> StorageResult<()>;

    /// Moderation: delete any listing
    async fn admin_delete(&self, id: i64, admin_id: Option<i64>) -> StorageResult<()>;

    /// Attach an image to a listing owned by `pm_id`
    async fn add_image(&self, listing_id: i64, pm_id: i64, image_path: &str)
    -> StorageResult<i64>;

    /// Images of a listing in upload order
    async fn images(&self, listing_id: i64) -> StorageResult<Vec<ListingImage>>;

    /// Remove one image from a listing owned by `pm_id`
    async fn remove_image(&self, image_id: i64, pm_id: i64) -> StorageResult<()>;
}

/// SQLite implementation of ListingRepository
pub struct SqliteListingRepository {
    pool: SqlitePool,
    activity: ActivityLog,
}

impl SqliteListingRepository {
    pub fn new(pool: SqlitePool, activity: ActivityLog) -> Self {
        Self { pool, activity }
    }

    /// Owner of a listing, or not-found.
    async fn owner_of(&self, id: i64) -> StorageResult<i64> {
        let owner: Option<i64> = sqlx::query_scalar("SELECT pm_id FROM listings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        owner.ok_or_else(|| StorageError::not_found("Listing", "id", id))
    }

    async fn require_owner(&self, id: i64, pm_id: i64) -> StorageResult<()> {
        let owner = self.owner_of(id).await?;
        if owner != pm_id {
            warn!(listing_id = id, pm_id, owner, "Listing ownership check failed");
            return Err(StorageError::unauthorized(
                "You can only modify your own listings",
            ));
        }
        Ok(())
    }

    /// Fill `images` of every listing with one query.
    async fn attach_images(&self, listings: &mut [Listing]) -> StorageResult<()> {
        if listings.is_empty() {
            return Ok(());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, listing_id, image_path, created_at FROM listing_images WHERE listing_id IN (",
        );
        let mut ids = query.separated(", ");
        for listing in listings.iter() {
            ids.push_bind(listing.id);
        }
        ids.push_unseparated(") ORDER BY id");

        let rows = query
            .build_query_as::<ListingImage>()
            .fetch_all(&self.pool)
            .await?;

        let mut by_listing: HashMap<i64, Vec<String>> = HashMap::new();
        for image in rows {
            by_listing
                .entry(image.listing_id)
                .or_default()
                .push(image.image_path);
        }

        for listing in listings.iter_mut() {
            listing.images = by_listing.remove(&listing.id).unwrap_or_default();
        }
        Ok(())
    }
}

fn validate_address(address: &str) -> StorageResult<()> {
    if address.trim().is_empty() {
        return Err(StorageError::validation("Address is required"));
    }
    Ok(())
}

fn validate_price(price: f64) -> StorageResult<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(StorageError::validation("Price must be greater than zero"));
    }
    Ok(())
}

/// `LIKE` pattern matching `text` literally anywhere, escaped with `\`.
fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn clean_images(images: &[String]) -> impl Iterator<Item = &str> {
    images.iter().map(|p| p.trim()).filter(|p| !p.is_empty())
}

impl ListingRepository for SqliteListingRepository {
    async fn create_listing(&self, listing: &NewListing) -> StorageResult<i64> {
        validate_address(&listing.address)?;
        validate_price(listing.price)?;

        let owner: Option<(String, bool, Option<chrono::DateTime<Utc>>)> =
            sqlx::query_as("SELECT role, is_active, deleted_at FROM users WHERE id = ?")
                .bind(listing.pm_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some((role, is_active, deleted_at)) = owner else {
            return Err(StorageError::not_found("User", "id", listing.pm_id));
        };
        if Role::normalize(&role) != Some(Role::PropertyManager) {
            return Err(StorageError::unauthorized(
                "Only property managers can create listings",
            ));
        }
        if !is_active || deleted_at.is_some() {
            return Err(StorageError::unauthorized(
                "Deactivated accounts cannot create listings",
            ));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO listings (pm_id, address, price, description, lodging_details, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(listing.pm_id)
        .bind(listing.address.trim())
        .bind(listing.price)
        .bind(listing.description.trim())
        .bind(listing.lodging_details.as_deref())
        .bind(ListingStatus::Pending.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        for path in clean_images(&listing.images) {
            sqlx::query(
                "INSERT INTO listing_images (listing_id, image_path, created_at) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(path)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(listing_id = id, pm_id = listing.pm_id, "Listing created");
        self.activity
            .log(
                Some(listing.pm_id),
                "listing_created",
                Some(&format!("Created listing #{id} at {}", listing.address.trim())),
            )
            .await;
        Ok(id)
    }

    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Listing>> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?");
        let listing = sqlx::query_as::<_, Listing>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match listing {
            Some(listing) => {
                let mut one = [listing];
                self.attach_images(&mut one).await?;
                let [listing] = one;
                Ok(Some(listing))
            }
            None => Ok(None),
        }
    }

    async fn list_by_status(&self, status: ListingStatus) -> StorageResult<Vec<Listing>> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE status = ? ORDER BY created_at DESC, id DESC"
        );
        let mut listings = sqlx::query_as::<_, Listing>(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        self.attach_images(&mut listings).await?;
        Ok(listings)
    }

    async fn list_by_owner(&self, pm_id: i64) -> StorageResult<Vec<Listing>> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE pm_id = ? ORDER BY created_at DESC, id DESC"
        );
        let mut listings = sqlx::query_as::<_, Listing>(&sql)
            .bind(pm_id)
            .fetch_all(&self.pool)
            .await?;

        self.attach_images(&mut listings).await?;
        Ok(listings)
    }

    async fn search(&self, filter: &ListingFilter) -> StorageResult<Vec<Listing>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE status = "
        ));
        query.push_bind(filter.status.unwrap_or(ListingStatus::Approved).as_str());

        if let Some(text) = filter.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = contains_pattern(&text.to_lowercase());
            query
                .push(" AND (LOWER(address) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR LOWER(description) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR LOWER(COALESCE(lodging_details, '')) LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(min) = filter.min_price {
            query.push(" AND price >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            query.push(" AND price <= ").push_bind(max);
        }

        query.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit.max(0));
        }

        let mut listings = query
            .build_query_as::<Listing>()
            .fetch_all(&self.pool)
            .await?;

        self.attach_images(&mut listings).await?;
        debug!(results = listings.len(), "Listing search");
        Ok(listings)
    }

    async fn update_listing(
        &self,
        id: i64,
        pm_id: i64,
        update: &ListingUpdate,
    ) -> StorageResult<()> {
        if let Some(address) = &update.address {
            validate_address(address)?;
        }
        if let Some(price) = update.price {
            validate_price(price)?;
        }

        self.require_owner(id, pm_id).await?;
        if update.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE listings
            SET address = COALESCE(?, address),
                price = COALESCE(?, price),
                description = COALESCE(?, description),
                lodging_details = COALESCE(?, lodging_details),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.address.as_deref().map(str::trim))
        .bind(update.price)
        .bind(update.description.as_deref().map(str::trim))
        .bind(update.lodging_details.as_deref())
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(images) = &update.images {
            sqlx::query("DELETE FROM listing_images WHERE listing_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            for path in clean_images(images) {
                sqlx::query(
                    "INSERT INTO listing_images (listing_id, image_path, created_at) VALUES (?, ?, ?)",
                )
                .bind(id)
                .bind(path)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        self.activity
            .log(Some(pm_id), "listing_updated", Some(&format!("Updated listing #{id}")))
            .await;
        Ok(())
    }

    async fn delete_listing(&self, id: i64, pm_id: i64) -> StorageResult<()> {
        self.require_owner(id, pm_id).await?;

        sqlx::query("DELETE FROM listings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(listing_id = id, pm_id, "Listing deleted");
        self.activity
            .log(Some(pm_id), "listing_deleted", Some(&format!("Deleted listing #{id}")))
            .await;
        Ok(())
    }

    async fn set_status(
        &self,
        id: i64,
        status: ListingStatus,
        admin_id: Option<i64>,
    ) -> StorageResult<()> {
        let result = sqlx::query("UPDATE listings SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Listing", "id", id));
        }

        info!(listing_id = id, status = %status, "Listing status changed");
        self.activity
            .log(
                admin_id,
                "listing_status_changed",
                Some(&format!("Listing #{id} set to {status}")),
            )
            .await;
        Ok(())
    }

    async fn admin_delete(&self, id: i64, admin_id: Option<i64>) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM listings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Listing", "id", id));
        }

        info!(listing_id = id, "Listing removed by admin");
        self.activity
            .log(
                admin_id,
                "listing_removed",
                Some(&format!("Admin removed listing #{id}")),
            )
            .await;
        Ok(())
    }

    async fn add_image(
        &self,
        listing_id: i64,
        pm_id: i64,
        image_path: &str,
    ) -> StorageResult<i64> {
        let image_path = image_path.trim();
        if image_path.is_empty() {
            return Err(StorageError::validation("Image path is required"));
        }
        self.require_owner(listing_id, pm_id).await?;

        let result = sqlx::query(
            "INSERT INTO listing_images (listing_id, image_path, created_at) VALUES (?, ?, ?)",
        )
        .bind(listing_id)
        .bind(image_path)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn images(&self, listing_id: i64) -> StorageResult<Vec<ListingImage>> {
        let images = sqlx::query_as::<_, ListingImage>(
            "SELECT id, listing_id, image_path, created_at FROM listing_images WHERE listing_id = ? ORDER BY id",
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(images)
    }

    async fn remove_image(&self, image_id: i64, pm_id: i64) -> StorageResult<()> {
        let listing_id: Option<i64> =
            sqlx::query_scalar("SELECT listing_id FROM listing_images WHERE id = ?")
                .bind(image_id)
                .fetch_optional(&self.pool)
                .await?;

        let listing_id =
            listing_id.ok_or_else(|| StorageError::not_found("ListingImage", "id", image_id))?;
        self.require_owner(listing_id, pm_id).await?;

        sqlx::query("DELETE FROM listing_images WHERE id = ?")
            .bind(image_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
