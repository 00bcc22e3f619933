pub mod activity;
pub mod auth;
pub mod community;
pub mod listing;
pub mod notification;
pub mod payment;
pub mod profile;
pub mod reservation;
pub mod user;

pub use activity::ActivityEntry;
pub use auth::{LockStatus, LoginAttempt, PasswordResetToken};
pub use community::{Message, Report, Review};
pub use listing::{Listing, ListingFilter, ListingImage, ListingUpdate, NewListing};
pub use notification::{NewNotification, Notification};
pub use payment::{NewPayment, Payment};
pub use profile::{SystemSetting, UserAddress, UserSettings};
pub use reservation::{NewReservation, Reservation, TenantRecord};
pub use user::{NewUser, ProfileUpdate, User};
