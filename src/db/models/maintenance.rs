//! Maintenance request models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenancePriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl std::fmt::Display for MaintenancePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaintenancePriority::Low => write!(f, "low"),
            MaintenancePriority::Medium => write!(f, "medium"),
            MaintenancePriority::High => write!(f, "high"),
            MaintenancePriority::Urgent => write!(f, "urgent"),
        }
    }
}

impl std::str::FromStr for MaintenancePriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(MaintenancePriority::Low),
            "medium" => Ok(MaintenancePriority::Medium),
            "high" => Ok(MaintenancePriority::High),
            "urgent" => Ok(MaintenancePriority::Urgent),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Open,
    InProgress,
    Resolved,
    Cancelled,
}

impl MaintenanceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MaintenanceStatus::Resolved | MaintenanceStatus::Cancelled)
    }

    /// Moves the landlord may make while working a request
    pub fn landlord_can_move_to(&self, next: MaintenanceStatus) -> bool {
        matches!(
            (self, next),
            (MaintenanceStatus::Open, MaintenanceStatus::InProgress)
                | (MaintenanceStatus::Open, MaintenanceStatus::Resolved)
                | (MaintenanceStatus::InProgress, MaintenanceStatus::Resolved)
        )
    }

    /// A tenant can only withdraw a request that is still being handled
    pub fn tenant_can_move_to(&self, next: MaintenanceStatus) -> bool {
        !self.is_terminal() && next == MaintenanceStatus::Cancelled
    }
}

impl std::fmt::Display for MaintenanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaintenanceStatus::Open => write!(f, "open"),
            MaintenanceStatus::InProgress => write!(f, "in_progress"),
            MaintenanceStatus::Resolved => write!(f, "resolved"),
            MaintenanceStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for MaintenanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(MaintenanceStatus::Open),
            "in_progress" => Ok(MaintenanceStatus::InProgress),
            "resolved" => Ok(MaintenanceStatus::Resolved),
            "cancelled" => Ok(MaintenanceStatus::Cancelled),
            _ => Err(format!("Unknown maintenance status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MaintenanceRequest {
    pub id: String,
    pub lease_id: String,
    pub listing_id: String,
    pub tenant_id: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub resolved_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl MaintenanceRequest {
    pub fn status_enum(&self) -> MaintenanceStatus {
        self.status.parse().unwrap_or(MaintenanceStatus::Open)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateMaintenanceRequest {
    pub title: String,
    pub description: String,
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMaintenanceStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MaintenanceQuery {
    pub status: Option<String>,
}
