//! Audit trail of marketplace actions.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::common::{page_window, Paginated};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub details: Option<String>,
    pub created_at: String,
}

/// Filters accepted by the admin audit view
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditLogQuery {
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub user_id: Option<String>,
    /// Inclusive lower bound (RFC 3339)
    pub start_date: Option<String>,
    /// Inclusive upper bound (RFC 3339)
    pub end_date: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

pub mod actions {
    pub const AUTH_LOGIN: &str = "auth.login";
    pub const AUTH_LOGOUT: &str = "auth.logout";
    pub const AUTH_REGISTER: &str = "auth.register";

    pub const LISTING_CREATE: &str = "listing.create";
    pub const LISTING_UPDATE: &str = "listing.update";
    pub const LISTING_DELETE: &str = "listing.delete";
    pub const LISTING_MODERATE: &str = "listing.moderate";

    pub const ROOM_CREATE: &str = "room.create";
    pub const ROOM_UPDATE: &str = "room.update";
    pub const ROOM_DELETE: &str = "room.delete";

    pub const LEASE_CREATE: &str = "lease.create";
    pub const LEASE_TERMINATE: &str = "lease.terminate";

    pub const PAYMENT_CREATE: &str = "payment.create";
    pub const PAYMENT_STATUS: &str = "payment.status";

    pub const MAINTENANCE_CREATE: &str = "maintenance.create";
    pub const MAINTENANCE_STATUS: &str = "maintenance.status";

    pub const VIEWING_CREATE: &str = "viewing.create";
    pub const VIEWING_APPROVE: &str = "viewing.approve";
    pub const VIEWING_DECLINE: &str = "viewing.decline";
    pub const VIEWING_CANCEL: &str = "viewing.cancel";

    pub const USER_UPDATE: &str = "user.update";
    pub const CATEGORY_CHANGE: &str = "category.change";
    pub const AMENITY_CHANGE: &str = "amenity.change";
}

pub mod resource_types {
    pub const USER: &str = "user";
    pub const LISTING: &str = "listing";
    pub const ROOM: &str = "room";
    pub const LEASE: &str = "lease";
    pub const PAYMENT: &str = "payment";
    pub const MAINTENANCE: &str = "maintenance";
    pub const VIEWING: &str = "viewing";
    pub const CATEGORY: &str = "category";
    pub const AMENITY: &str = "amenity";
}

/// One audit entry; `details` is stored as JSON text
#[derive(Debug, Clone, Default)]
pub struct AuditEntry<'a> {
    pub action: &'a str,
    pub resource_type: &'a str,
    pub resource_id: Option<&'a str>,
    pub resource_name: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub ip_address: Option<&'a str>,
    pub details: Option<serde_json::Value>,
}

pub async fn log_audit(db: &SqlitePool, entry: AuditEntry<'_>) -> Result<(), sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let details_json = entry.details.map(|d| d.to_string());

    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, action, resource_type, resource_id, resource_name, user_id, ip_address, details, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(entry.action)
    .bind(entry.resource_type)
    .bind(entry.resource_id)
    .bind(entry.resource_name)
    .bind(entry.user_id)
    .bind(entry.ip_address)
    .bind(&details_json)
    .bind(&now)
    .execute(db)
    .await?;

    tracing::debug!(
        action = entry.action,
        resource_type = entry.resource_type,
        resource_id = entry.resource_id,
        user_id = entry.user_id,
        "Audit log recorded"
    );

    Ok(())
}

pub async fn list_audit_logs(
    db: &SqlitePool,
    query: &AuditLogQuery,
) -> Result<Paginated<AuditLog>, sqlx::Error> {
    let (page, per_page, offset) = page_window(query.page, query.per_page, 50, 100);

    let mut conditions = Vec::new();
    let mut bindings: Vec<&str> = Vec::new();

    let filters = [
        ("action = ?", &query.action),
        ("resource_type = ?", &query.resource_type),
        ("user_id = ?", &query.user_id),
        ("created_at >= ?", &query.start_date),
        ("created_at <= ?", &query.end_date),
    ];
    for (condition, value) in filters {
        if let Some(value) = value {
            conditions.push(condition);
            bindings.push(value.as_str());
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM audit_logs {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for binding in &bindings {
        count_query = count_query.bind(*binding);
    }
    let total = count_query.fetch_one(db).await?;

    let sql = format!(
        "SELECT * FROM audit_logs {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let mut items_query = sqlx::query_as::<_, AuditLog>(&sql);
    for binding in &bindings {
        items_query = items_query.bind(*binding);
    }
    let items = items_query.bind(per_page).bind(offset).fetch_all(db).await?;

    Ok(Paginated::new(items, total, page, per_page))
}
