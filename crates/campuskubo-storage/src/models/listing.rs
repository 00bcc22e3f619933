use campuskubo_core::ListingStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Boarding-house or apartment listing owned by a property manager.
///
/// `images` is not a column; repositories fill it from `listing_images`
/// after fetching the row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Listing {
    pub id: i64,

    /// Owning property manager
    pub pm_id: i64,

    pub address: String,

    /// Monthly rent, always positive
    pub price: f64,

    pub description: String,

    /// Free-form room/amenity details
    pub lodging_details: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: ListingStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: Option<DateTime<Utc>>,

    #[sqlx(skip)]
    pub images: Vec<String>,
}

impl Listing {
    /// Whether `pm_id` owns this listing
    pub fn is_owned_by(&self, pm_id: i64) -> bool {
        self.pm_id == pm_id
    }
}

/// One image attached to a listing.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ListingImage {
    pub id: i64,
    pub listing_id: i64,
    pub image_path: String,
    pub created_at: DateTime<Utc>,
}

/// Input for [`crate::repositories::ListingRepository::create_listing`].
#[derive(Debug, Clone)]
pub struct NewListing {
    pub pm_id: i64,
    pub address: String,
    pub price: f64,
    pub description: String,
    pub lodging_details: Option<String>,
    pub images: Vec<String>,
}

impl NewListing {
    pub fn new(pm_id: i64, address: impl Into<String>, price: f64) -> Self {
        Self {
            pm_id,
            address: address.into(),
            price,
            description: String::new(),
            lodging_details: None,
            images: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn lodging_details(mut self, details: impl Into<String>) -> Self {
        self.lodging_details = Some(details.into());
        self
    }

    pub fn image(mut self, path: impl Into<String>) -> Self {
        self.images.push(path.into());
        self
    }
}

/// Partial listing update; `None` leaves a field unchanged.
///
/// When `images` is `Some`, the listing's image set is replaced.
#[derive(Debug, Clone, Default)]
pub struct ListingUpdate {
    pub address: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub lodging_details: Option<String>,
    pub images: Option<Vec<String>>,
}

impl ListingUpdate {
    pub fn is_empty(&self) -> bool {
        self.address.is_none()
            && self.price.is_none()
            && self.description.is_none()
            && self.lodging_details.is_none()
            && self.images.is_none()
    }
}

/// Search criteria for [`crate::repositories::ListingRepository::search`].
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    /// Substring matched against address, description and lodging details
    pub text: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Defaults to approved listings only
    pub status: Option<ListingStatus>,
    pub limit: Option<i64>,
}
