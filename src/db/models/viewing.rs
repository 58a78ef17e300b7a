//! Property viewing request models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewingStatus {
    Pending,
    Approved,
    Declined,
    Cancelled,
}

impl ViewingStatus {
    /// Landlord decisions are only taken on pending requests
    pub fn awaits_decision(&self) -> bool {
        matches!(self, ViewingStatus::Pending)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, ViewingStatus::Pending | ViewingStatus::Approved)
    }
}

impl std::fmt::Display for ViewingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewingStatus::Pending => write!(f, "pending"),
            ViewingStatus::Approved => write!(f, "approved"),
            ViewingStatus::Declined => write!(f, "declined"),
            ViewingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ViewingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ViewingStatus::Pending),
            "approved" => Ok(ViewingStatus::Approved),
            "declined" => Ok(ViewingStatus::Declined),
            "cancelled" => Ok(ViewingStatus::Cancelled),
            _ => Err(format!("Unknown viewing status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ViewingRequest {
    pub id: String,
    pub listing_id: String,
    pub tenant_id: String,
    pub landlord_id: String,
    /// RFC 3339 timestamp the tenant would like to visit at
    pub preferred_date: String,
    pub message: Option<String>,
    pub status: String,
    pub response_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ViewingRequest {
    pub fn status_enum(&self) -> ViewingStatus {
        self.status.parse().unwrap_or(ViewingStatus::Cancelled)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateViewingRequest {
    pub preferred_date: String,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ViewingDecisionRequest {
    pub response_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewing_state_rules() {
        assert!(ViewingStatus::Pending.awaits_decision());
        assert!(!ViewingStatus::Approved.awaits_decision());
        assert!(ViewingStatus::Approved.can_cancel());
        assert!(!ViewingStatus::Declined.can_cancel());
        assert!(!ViewingStatus::Cancelled.can_cancel());
    }
}
