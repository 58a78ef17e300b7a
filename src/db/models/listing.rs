//! Listing and room models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::catalog::{Amenity, Category};

/// Moderation state of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    /// Awaiting admin review; hidden from search
    Pending,
    Approved,
    Rejected,
    /// Withdrawn from the marketplace
    Archived,
}

impl ListingStatus {
    pub fn is_public(&self) -> bool {
        matches!(self, ListingStatus::Approved)
    }

    /// States an admin may put a listing into
    pub fn is_moderation_outcome(&self) -> bool {
        !matches!(self, ListingStatus::Pending)
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingStatus::Pending => write!(f, "pending"),
            ListingStatus::Approved => write!(f, "approved"),
            ListingStatus::Rejected => write!(f, "rejected"),
            ListingStatus::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ListingStatus::Pending),
            "approved" => Ok(ListingStatus::Approved),
            "rejected" => Ok(ListingStatus::Rejected),
            "archived" => Ok(ListingStatus::Archived),
            _ => Err(format!("Unknown listing status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Listing {
    pub id: String,
    pub landlord_id: String,
    pub category_id: Option<String>,
    pub title: String,
    pub description: String,
    pub address: String,
    pub city: String,
    /// Minor currency units
    pub monthly_rent: i64,
    pub bedrooms: i64,
    pub bathrooms: i64,
    pub area_sqm: Option<f64>,
    pub status: String,
    pub moderation_note: Option<String>,
    pub is_available: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Listing {
    pub fn status_enum(&self) -> ListingStatus {
        self.status.parse().unwrap_or(ListingStatus::Pending)
    }
}

/// Listing with its category, amenities and rooms for the detail view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDetail {
    #[serde(flatten)]
    pub listing: Listing,
    pub category: Option<Category>,
    pub amenities: Vec<Amenity>,
    pub rooms: Vec<Room>,
}

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub title: String,
    pub description: String,
    pub address: String,
    pub city: String,
    pub monthly_rent: i64,
    #[serde(default)]
    pub bedrooms: i64,
    #[serde(default)]
    pub bathrooms: i64,
    pub area_sqm: Option<f64>,
    pub category_id: Option<String>,
    #[serde(default)]
    pub amenity_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub monthly_rent: Option<i64>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<i64>,
    pub area_sqm: Option<f64>,
    pub category_id: Option<String>,
    pub is_available: Option<bool>,
    /// Replaces the full amenity set when present
    pub amenity_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingSort {
    #[default]
    Newest,
    RentAsc,
    RentDesc,
}

impl ListingSort {
    pub fn order_clause(&self) -> &'static str {
        match self {
            ListingSort::Newest => "l.created_at DESC",
            ListingSort::RentAsc => "l.monthly_rent ASC, l.created_at DESC",
            ListingSort::RentDesc => "l.monthly_rent DESC, l.created_at DESC",
        }
    }
}

/// Public search parameters
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListingQuery {
    /// Free text matched against title, description and address
    pub q: Option<String>,
    pub city: Option<String>,
    pub category_id: Option<String>,
    pub min_rent: Option<i64>,
    pub max_rent: Option<i64>,
    /// Minimum number of bedrooms
    pub bedrooms: Option<i64>,
    pub amenity_id: Option<String>,
    #[serde(default)]
    pub sort: ListingSort,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Admin listing filter
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListingStatusQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModerateListingRequest {
    pub status: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: String,
    pub listing_id: String,
    pub name: String,
    pub size_sqm: Option<f64>,
    pub monthly_rent: i64,
    pub is_available: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub size_sqm: Option<f64>,
    pub monthly_rent: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoomRequest {
    pub name: Option<String>,
    pub size_sqm: Option<f64>,
    pub monthly_rent: Option<i64>,
    pub is_available: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_status_roundtrip_and_visibility() {
        for status in ["pending", "approved", "rejected", "archived"] {
            let parsed: ListingStatus = status.parse().unwrap();
            assert_eq!(parsed.to_string(), status);
        }
        assert!(ListingStatus::Approved.is_public());
        assert!(!ListingStatus::Pending.is_public());
        assert!(!ListingStatus::Pending.is_moderation_outcome());
        assert!(ListingStatus::Rejected.is_moderation_outcome());
    }

    #[test]
    fn test_sort_deserializes_from_snake_case() {
        let query: ListingQuery = serde_json::from_str(r#"{"sort": "rent_desc"}"#).unwrap();
        assert_eq!(query.sort, ListingSort::RentDesc);
        let query: ListingQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.sort, ListingSort::Newest);
    }
}
