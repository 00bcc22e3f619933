pub mod listing;
pub mod message;
pub mod notification;
pub mod payment;
pub mod profile;
pub mod report;
pub mod reservation;
pub mod reset_token;
pub mod review;
pub mod saved_listing;
pub mod user;

pub use listing::{ListingRepository, SqliteListingRepository};
pub use message::{MessageRepository, SqliteMessageRepository};
pub use notification::{NotificationRepository, SqliteNotificationRepository};
pub use payment::{PaymentRepository, SqlitePaymentRepository};
pub use profile::{ProfileRepository, SqliteProfileRepository};
pub use report::{ReportRepository, SqliteReportRepository};
pub use reservation::{ReservationRepository, SqliteReservationRepository};
pub use reset_token::{ResetTokenRepository, SqliteResetTokenRepository};
pub use review::{ReviewRepository, SqliteReviewRepository};
pub use saved_listing::{SavedListingRepository, SqliteSavedListingRepository};
pub use user::{SqliteUserRepository, UserRepository};
