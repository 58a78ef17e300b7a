//! Lease contract models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseStatus {
    Active,
    /// Ended early by the landlord or an admin
    Terminated,
    /// Ran to its end date
    Ended,
}

impl std::fmt::Display for LeaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeaseStatus::Active => write!(f, "active"),
            LeaseStatus::Terminated => write!(f, "terminated"),
            LeaseStatus::Ended => write!(f, "ended"),
        }
    }
}

impl std::str::FromStr for LeaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(LeaseStatus::Active),
            "terminated" => Ok(LeaseStatus::Terminated),
            "ended" => Ok(LeaseStatus::Ended),
            _ => Err(format!("Unknown lease status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LeaseContract {
    pub id: String,
    pub listing_id: String,
    pub room_id: Option<String>,
    pub tenant_id: String,
    pub landlord_id: String,
    pub rent_amount: i64,
    pub deposit: i64,
    /// Day of month rent falls due (clamped to short months)
    pub due_day: i64,
    pub start_date: String,
    pub end_date: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl LeaseContract {
    pub fn status_enum(&self) -> LeaseStatus {
        self.status.parse().unwrap_or(LeaseStatus::Ended)
    }

    pub fn is_active(&self) -> bool {
        self.status_enum() == LeaseStatus::Active
    }

    /// Whether `user_id` is a party to this lease
    pub fn involves(&self, user_id: &str) -> bool {
        self.tenant_id == user_id || self.landlord_id == user_id
    }
}

/// Lease with the names a dashboard shows next to it
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LeaseSummary {
    pub id: String,
    pub listing_id: String,
    pub listing_title: String,
    pub room_id: Option<String>,
    pub tenant_id: String,
    pub tenant_name: String,
    pub tenant_email: String,
    pub landlord_id: String,
    pub rent_amount: i64,
    pub due_day: i64,
    pub start_date: String,
    pub end_date: Option<String>,
    pub status: String,
}

/// Landlord request that puts a tenant into a listing or room
#[derive(Debug, Deserialize)]
pub struct CreateLeaseRequest {
    pub tenant_email: String,
    pub listing_id: String,
    pub room_id: Option<String>,
    pub rent_amount: i64,
    #[serde(default)]
    pub deposit: i64,
    pub due_day: i64,
    pub start_date: String,
    pub end_date: Option<String>,
}
