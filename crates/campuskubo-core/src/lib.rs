//! Domain types shared by every CampusKubo crate.
//!
//! Nothing in here touches the database. The storage crate maps rows onto
//! these types right after fetching them, so free-text roles and statuses
//! never leak past the persistence boundary.

pub mod constants;
pub mod error;
pub mod password;
pub mod types;

pub use error::{Error, Result};
pub use password::{PasswordCheck, PasswordRule};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
