//! User and session models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Marketplace roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Rents places, pays rent, files maintenance and viewing requests
    Tenant,
    /// Publishes listings and manages leases on them
    Landlord,
    /// Moderates listings and users
    Admin,
}

impl UserRole {
    /// Roles a visitor may pick during self-registration
    pub fn is_self_assignable(&self) -> bool {
        matches!(self, UserRole::Tenant | UserRole::Landlord)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Tenant => write!(f, "tenant"),
            UserRole::Landlord => write!(f, "landlord"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tenant" => Ok(UserRole::Tenant),
            "landlord" => Ok(UserRole::Landlord),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub email_verified_at: Option<String>,
    pub phone_verified_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Unknown role strings degrade to the least privileged role
    pub fn role_enum(&self) -> UserRole {
        self.role.parse().unwrap_or(UserRole::Tenant)
    }

    pub fn is_admin(&self) -> bool {
        self.role_enum() == UserRole::Admin
    }

    pub fn is_landlord(&self) -> bool {
        self.role_enum() == UserRole::Landlord
    }

    pub fn is_tenant(&self) -> bool {
        self.role_enum() == UserRole::Tenant
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub phone: Option<String>,
    pub name: String,
    pub role: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            phone: user.phone,
            name: user.name,
            role: user.role,
            is_active: user.is_active,
            email_verified: user.email_verified_at.is_some(),
            phone_verified: user.phone_verified_at.is_some(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Admin update of another account
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UserQuery {
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("tenant".parse::<UserRole>().unwrap(), UserRole::Tenant);
        assert_eq!("LANDLORD".parse::<UserRole>().unwrap(), UserRole::Landlord);
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("owner".parse::<UserRole>().is_err());
        assert_eq!(UserRole::Landlord.to_string(), "landlord");
    }

    #[test]
    fn test_self_assignable_roles() {
        assert!(UserRole::Tenant.is_self_assignable());
        assert!(UserRole::Landlord.is_self_assignable());
        assert!(!UserRole::Admin.is_self_assignable());
    }
}
