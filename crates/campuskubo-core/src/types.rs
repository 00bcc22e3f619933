use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role.
///
/// Persisted as `tenant`, `pm` or `admin`. Older databases stored free text
/// such as "PM One" or "Property Manager"; [`Role::normalize`] maps those
/// onto the closed set and is applied on every write and during migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tenant,
    #[serde(rename = "pm")]
    PropertyManager,
    Admin,
}

impl Role {
    /// Canonical storage form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Tenant => "tenant",
            Role::PropertyManager => "pm",
            Role::Admin => "admin",
        }
    }

    /// Classify a free-text role.
    ///
    /// Returns `None` when the text matches none of the known spellings.
    ///
    /// # Examples
    ///
    /// ```
    /// use campuskubo_core::Role;
    ///
    /// assert_eq!(Role::normalize("Property Manager"), Some(Role::PropertyManager));
    /// assert_eq!(Role::normalize("  ADMIN "), Some(Role::Admin));
    /// assert_eq!(Role::normalize("janitor"), None);
    /// ```
    #[must_use]
    pub fn normalize(raw: &str) -> Option<Self> {
        let value = raw.trim().to_lowercase();
        if value.is_empty() {
            return None;
        }

        if value.contains("admin") {
            return Some(Role::Admin);
        }

        let words: Vec<&str> = value
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let is_pm = value == "pm"
            || words.first() == Some(&"pm")
            || value.contains("property manager")
            || value.contains("property_manager")
            || value.contains("landlord")
            || value.contains("manager");
        if is_pm {
            return Some(Role::PropertyManager);
        }

        if value.contains("tenant") || value.contains("student") {
            return Some(Role::Tenant);
        }

        None
    }

    /// Returns `true` for property managers.
    #[must_use]
    pub fn is_property_manager(&self) -> bool {
        matches!(self, Role::PropertyManager)
    }

    /// Returns `true` for administrators.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Role::normalize(s).ok_or_else(|| Error::InvalidRole(s.to_string()))
    }
}

impl TryFrom<String> for Role {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Generates the storage boilerplate shared by every text-backed status enum.
macro_rules! text_status {
    ($name:ident, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical storage form.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                value.parse()
            }
        }
    };
}

/// Moderation and occupancy state of a listing.
///
/// New listings start `Pending` until an admin approves or rejects them. An
/// approved listing that is fully booked becomes `Occupied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Pending,
    Approved,
    Rejected,
    Occupied,
}

text_status!(ListingStatus, {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Occupied => "occupied",
});

impl ListingStatus {
    /// Whether tenants may book the listing.
    #[must_use]
    pub fn is_bookable(&self) -> bool {
        matches!(self, ListingStatus::Approved)
    }
}

impl FromStr for ListingStatus {
    type Err = Error;

    /// Parses both vocabularies: `pending/approved/rejected/occupied` and the
    /// legacy `Available/Occupied`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ListingStatus::Pending),
            "approved" | "available" => Ok(ListingStatus::Approved),
            "rejected" => Ok(ListingStatus::Rejected),
            "occupied" => Ok(ListingStatus::Occupied),
            _ => Err(Error::InvalidStatus {
                kind: "listing",
                value: s.to_string(),
            }),
        }
    }
}

/// Reservation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Approved,
    Confirmed,
    Cancelled,
    Rejected,
}

text_status!(ReservationStatus, {
    Pending => "pending",
    Approved => "approved",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    Rejected => "rejected",
});

impl ReservationStatus {
    /// Cancelled and rejected reservations never change again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Cancelled | ReservationStatus::Rejected)
    }

    /// Reservations that still hold a place.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Pending | ReservationStatus::Approved | ReservationStatus::Confirmed
        )
    }
}

impl FromStr for ReservationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ReservationStatus::Pending),
            "approved" => Ok(ReservationStatus::Approved),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "cancelled" | "canceled" => Ok(ReservationStatus::Cancelled),
            "rejected" => Ok(ReservationStatus::Rejected),
            _ => Err(Error::InvalidStatus {
                kind: "reservation",
                value: s.to_string(),
            }),
        }
    }
}

/// Payment state, including the two refund states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    PartiallyRefunded,
    Refunded,
}

text_status!(PaymentStatus, {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    PartiallyRefunded => "partially_refunded",
    Refunded => "refunded",
});

impl PaymentStatus {
    /// Only settled money can be refunded.
    #[must_use]
    pub fn is_refundable(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::PartiallyRefunded
        )
    }
}

impl FromStr for PaymentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" | "paid" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "partially_refunded" => Ok(PaymentStatus::PartiallyRefunded),
            "refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(Error::InvalidStatus {
                kind: "payment",
                value: s.to_string(),
            }),
        }
    }
}

/// Moderation state of a user report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Open,
    Resolved,
    Dismissed,
}

text_status!(ReportStatus, {
    Open => "open",
    Resolved => "resolved",
    Dismissed => "dismissed",
});

impl FromStr for ReportStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "open" | "pending" => Ok(ReportStatus::Open),
            "resolved" => Ok(ReportStatus::Resolved),
            "dismissed" => Ok(ReportStatus::Dismissed),
            _ => Err(Error::InvalidStatus {
                kind: "report",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("tenant", Role::Tenant)]
    #[case("Student", Role::Tenant)]
    #[case("pm", Role::PropertyManager)]
    #[case("PM One", Role::PropertyManager)]
    #[case("Property Manager", Role::PropertyManager)]
    #[case("landlord", Role::PropertyManager)]
    #[case("admin", Role::Admin)]
    #[case("Super Admin", Role::Admin)]
    fn test_role_normalize(#[case] raw: &str, #[case] expected: Role) {
        assert_eq!(Role::normalize(raw), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("janitor")]
    #[case("rpm")]
    fn test_role_normalize_rejects_unknown(#[case] raw: &str) {
        assert_eq!(Role::normalize(raw), None);
        assert!(raw.parse::<Role>().is_err());
    }

    #[test]
    fn test_role_storage_form() {
        assert_eq!(Role::PropertyManager.as_str(), "pm");
        assert_eq!(Role::try_from("pm".to_string()).unwrap(), Role::PropertyManager);
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[rstest]
    #[case("pending", ListingStatus::Pending)]
    #[case("Approved", ListingStatus::Approved)]
    #[case("Available", ListingStatus::Approved)]
    #[case("Occupied", ListingStatus::Occupied)]
    #[case("rejected", ListingStatus::Rejected)]
    fn test_listing_status_parses_both_vocabularies(
        #[case] raw: &str,
        #[case] expected: ListingStatus,
    ) {
        assert_eq!(raw.parse::<ListingStatus>().unwrap(), expected);
    }

    #[test]
    fn test_listing_status_unknown() {
        let err = "archived".parse::<ListingStatus>().unwrap_err();
        assert_eq!(
            err,
            Error::InvalidStatus {
                kind: "listing",
                value: "archived".to_string()
            }
        );
    }

    #[test]
    fn test_status_round_trip_through_storage_form() {
        for status in ReservationStatus::ALL {
            assert_eq!(status.as_str().parse::<ReservationStatus>().unwrap(), *status);
        }
        for status in PaymentStatus::ALL {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), *status);
        }
        for status in ReportStatus::ALL {
            assert_eq!(status.as_str().parse::<ReportStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn test_reservation_status_predicates() {
        assert!(ReservationStatus::Cancelled.is_terminal());
        assert!(!ReservationStatus::Pending.is_terminal());
        assert!(ReservationStatus::Confirmed.is_active());
        assert!(!ReservationStatus::Rejected.is_active());
    }

    #[test]
    fn test_payment_refundable() {
        assert!(PaymentStatus::Completed.is_refundable());
        assert!(PaymentStatus::PartiallyRefunded.is_refundable());
        assert!(!PaymentStatus::Pending.is_refundable());
        assert!(!PaymentStatus::Refunded.is_refundable());
    }
}
