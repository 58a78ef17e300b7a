//! Administration: platform statistics, account management and listing moderation.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::db::{
    actions, resource_types, AuditEntry, Listing, ListingStatus, ListingStatusQuery,
    ModerateListingRequest, UpdateUserRequest, User, UserQuery, UserResponse, UserRole,
};
use crate::AppState;

use super::audit::audit_log;
use super::auth::require_admin;
use super::error::{ApiError, ValidationErrorBuilder};
use super::listings::fetch_listing;
use super::validation::validate_optional_text;

#[derive(Debug, Serialize)]
pub struct PlatformStats {
    pub users_by_role: BTreeMap<String, i64>,
    pub listings_by_status: BTreeMap<String, i64>,
    pub active_leases: i64,
    pub pending_viewings: i64,
    pub open_maintenance: i64,
    /// Sum of completed payments, minor units
    pub completed_payment_total: i64,
}

async fn grouped_counts(
    state: &AppState,
    sql: &str,
) -> Result<BTreeMap<String, i64>, ApiError> {
    let rows: Vec<(String, i64)> = sqlx::query_as(sql).fetch_all(&state.db).await?;
    Ok(rows.into_iter().collect())
}

/// GET /api/admin/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<PlatformStats>, ApiError> {
    require_admin(&user)?;

    let users_by_role =
        grouped_counts(&state, "SELECT role, COUNT(*) FROM users GROUP BY role").await?;
    let listings_by_status =
        grouped_counts(&state, "SELECT status, COUNT(*) FROM listings GROUP BY status").await?;

    let active_leases: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM lease_contracts WHERE status = 'active'")
            .fetch_one(&state.db)
            .await?;
    let pending_viewings: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM viewing_requests WHERE status = 'pending'")
            .fetch_one(&state.db)
            .await?;
    let open_maintenance: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM maintenance_requests WHERE status IN ('open', 'in_progress')",
    )
    .fetch_one(&state.db)
    .await?;
    let completed_payment_total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE status = 'COMPLETED'",
    )
    .fetch_one(&state.db)
    .await?;

    Ok(Json(PlatformStats {
        users_by_role,
        listings_by_status,
        active_leases,
        pending_viewings,
        open_maintenance,
        completed_payment_total,
    }))
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_admin(&user)?;

    let role = query
        .role
        .as_deref()
        .map(str::parse::<UserRole>)
        .transpose()
        .map_err(|e| ApiError::validation_field("role", e))?
        .map(|r| r.to_string());

    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE (? IS NULL OR role = ?) ORDER BY created_at DESC",
    )
    .bind(&role)
    .bind(&role)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// PUT /api/admin/users/:id
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    admin: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_admin(&admin)?;

    let target = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let mut errors = ValidationErrorBuilder::new();
    let role = match &req.role {
        Some(role) => errors.check("role", role.parse::<UserRole>()),
        None => None,
    };
    errors.finish()?;

    if target.id == admin.id {
        if req.is_active == Some(false) {
            return Err(ApiError::conflict("You cannot deactivate your own account"));
        }
        if role.is_some_and(|r| r != UserRole::Admin) {
            return Err(ApiError::conflict("You cannot remove your own admin role"));
        }
    }

    let role = role.map(|r| r.to_string()).unwrap_or(target.role.clone());
    let is_active = req.is_active.unwrap_or(target.is_active);
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query("UPDATE users SET role = ?, is_active = ?, updated_at = ? WHERE id = ?")
        .bind(&role)
        .bind(is_active)
        .bind(&now)
        .bind(&id)
        .execute(&state.db)
        .await?;

    if !is_active {
        // End every session of a deactivated account
        sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(&id)
            .execute(&state.db)
            .await?;
    }

    let updated = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::USER_UPDATE,
            resource_type: resource_types::USER,
            resource_id: Some(&updated.id),
            resource_name: Some(&updated.email),
            user_id: Some(&admin.id),
            details: Some(serde_json::json!({
                "role": updated.role,
                "is_active": updated.is_active,
            })),
            ..Default::default()
        },
    )
    .await;

    Ok(Json(UserResponse::from(updated)))
}

/// GET /api/admin/listings
pub async fn list_listings(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<ListingStatusQuery>,
) -> Result<Json<Vec<Listing>>, ApiError> {
    require_admin(&user)?;

    let status = query
        .status
        .as_deref()
        .map(str::parse::<ListingStatus>)
        .transpose()
        .map_err(|e| ApiError::validation_field("status", e))?
        .map(|s| s.to_string());

    let listings = sqlx::query_as::<_, Listing>(
        "SELECT * FROM listings WHERE (? IS NULL OR status = ?) ORDER BY created_at ASC",
    )
    .bind(&status)
    .bind(&status)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(listings))
}

/// PUT /api/admin/listings/:id/moderation
pub async fn moderate_listing(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<ModerateListingRequest>,
) -> Result<Json<Listing>, ApiError> {
    require_admin(&user)?;

    let mut errors = ValidationErrorBuilder::new();
    let status = errors.check(
        "status",
        req.status.parse::<ListingStatus>().and_then(|s| {
            if s.is_moderation_outcome() {
                Ok(s)
            } else {
                Err("Status must be approved, rejected or archived".to_string())
            }
        }),
    );
    errors.check("note", validate_optional_text("Note", &req.note, 1000));
    errors.finish()?;
    let status =
        status.ok_or_else(|| ApiError::validation_field("status", "Status is required"))?;

    let listing = fetch_listing(&state.db, &id).await?;
    let previous = listing.status_enum();

    sqlx::query("UPDATE listings SET status = ?, moderation_note = ?, updated_at = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(&req.note)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&id)
        .execute(&state.db)
        .await?;

    let listing = fetch_listing(&state.db, &id).await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::LISTING_MODERATE,
            resource_type: resource_types::LISTING,
            resource_id: Some(&listing.id),
            resource_name: Some(&listing.title),
            user_id: Some(&user.id),
            details: Some(serde_json::json!({
                "from": previous.to_string(),
                "to": status.to_string(),
                "note": req.note,
            })),
            ..Default::default()
        },
    )
    .await;

    tracing::info!(listing_id = %listing.id, status = %status, "Listing moderated");

    Ok(Json(listing))
}
