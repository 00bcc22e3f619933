//! Fixtures shared by the unit tests.

use crate::config::AuthConfig;
use crate::models::{NewListing, NewUser};
use crate::repositories::{ListingRepository, UserRepository};
use crate::store::Store;
use campuskubo_core::ListingStatus;

pub(crate) const PASSWORD: &str = "Passw0rd!";

pub(crate) async fn store() -> Store {
    Store::in_memory(AuthConfig::for_tests()).await.unwrap()
}

async fn user(store: &Store, email: &str, role: &str) -> i64 {
    store
        .users()
        .create_user(&NewUser::new("Test User", email, PASSWORD, role))
        .await
        .unwrap()
}

pub(crate) async fn tenant(store: &Store, email: &str) -> i64 {
    user(store, email, "tenant").await
}

pub(crate) async fn pm(store: &Store, email: &str) -> i64 {
    user(store, email, "pm").await
}

pub(crate) async fn admin(store: &Store, email: &str) -> i64 {
    user(store, email, "admin").await
}

/// A listing owned by `pm_id`, already approved by an admin.
pub(crate) async fn approved_listing(store: &Store, pm_id: i64, address: &str) -> i64 {
    let listings = store.listings();
    let id = listings
        .create_listing(&NewListing::new(pm_id, address, 3500.0).description("Near campus"))
        .await
        .unwrap();
    listings
        .set_status(id, ListingStatus::Approved, None)
        .await
        .unwrap();
    id
}
