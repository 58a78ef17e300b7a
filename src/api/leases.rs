//! Lease contracts between a landlord's listing (or room) and a tenant.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    actions, resource_types, AuditEntry, CreateLeaseRequest, LeaseContract, LeaseStatus,
    LeaseSummary, ListingStatus, User,
};
use crate::{AppState, DbPool};

use super::audit::audit_log;
use super::auth::require_landlord;
use super::error::{ApiError, ValidationErrorBuilder};
use super::listings::{fetch_owned_listing, fetch_room};
use super::validation::{
    validate_amount, validate_date, validate_due_day, validate_email, validate_non_negative,
    validate_uuid, MAX_AMOUNT,
};

const LEASE_CONFLICT: &str = "An active lease already exists for this listing or room";

/// Lease visible to `user`: its tenant, its landlord, or an admin
pub(crate) async fn fetch_lease_for(
    db: &DbPool,
    id: &str,
    user: &User,
) -> Result<LeaseContract, ApiError> {
    let lease = sqlx::query_as::<_, LeaseContract>("SELECT * FROM lease_contracts WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Lease not found"))?;

    if lease.involves(&user.id) || user.is_admin() {
        Ok(lease)
    } else {
        Err(ApiError::forbidden("You are not a party to this lease"))
    }
}

fn validate_create_request(req: &CreateLeaseRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("tenant_email", validate_email(req.tenant_email.trim()));
    errors.check("listing_id", validate_uuid(&req.listing_id, "listing_id"));
    if let Some(room_id) = &req.room_id {
        errors.check("room_id", validate_uuid(room_id, "room_id"));
    }
    errors.check("rent_amount", validate_amount("Rent amount", req.rent_amount));
    errors.check("deposit", validate_non_negative("Deposit", req.deposit, MAX_AMOUNT));
    errors.check("due_day", validate_due_day(req.due_day));
    let start = errors.check("start_date", validate_date("Start date", &req.start_date));
    if let Some(end_date) = &req.end_date {
        let end = errors.check("end_date", validate_date("End date", end_date));
        if let (Some(start), Some(end)) = (start, end) {
            if end <= start {
                errors.add("end_date", "End date must be after the start date");
            }
        }
    }
    errors.finish()
}

/// POST /api/leases
pub async fn create_lease(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateLeaseRequest>,
) -> Result<(StatusCode, Json<LeaseContract>), ApiError> {
    require_landlord(&user)?;
    validate_create_request(&req)?;

    let listing = fetch_owned_listing(&state.db, &req.listing_id, &user, false).await?;
    if listing.status_enum() == ListingStatus::Archived {
        return Err(ApiError::conflict("Archived listings cannot be leased"));
    }

    if let Some(room_id) = &req.room_id {
        let room = fetch_room(&state.db, room_id).await?;
        if room.listing_id != listing.id {
            return Err(ApiError::validation_field(
                "room_id",
                "Room does not belong to this listing",
            ));
        }
    }

    let tenant_email = req.tenant_email.trim().to_lowercase();
    let tenant = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(&tenant_email)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("No account with this email"))?;
    if !tenant.is_tenant() {
        return Err(ApiError::validation_field(
            "tenant_email",
            "Account is not a tenant account",
        ));
    }
    if !tenant.is_active {
        return Err(ApiError::validation_field(
            "tenant_email",
            "Tenant account is deactivated",
        ));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    let mut tx = state.db.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO lease_contracts (id, listing_id, room_id, tenant_id, landlord_id, rent_amount, deposit, due_day, start_date, end_date, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&listing.id)
    .bind(&req.room_id)
    .bind(&tenant.id)
    .bind(&user.id)
    .bind(req.rent_amount)
    .bind(req.deposit)
    .bind(req.due_day)
    .bind(&req.start_date)
    .bind(&req.end_date)
    .bind(LeaseStatus::Active.to_string())
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .map_err(|e| ApiError::conflict_on_unique(e, LEASE_CONFLICT))?;

    // The insert holds the write lock, so no other lease can appear between
    // it and this check. A whole-listing lease blocks every room, a room
    // lease blocks the whole listing.
    let conflicting: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM lease_contracts
        WHERE listing_id = ? AND status = ? AND id != ?
          AND (room_id IS NULL OR ? IS NULL OR room_id = ?)
        "#,
    )
    .bind(&listing.id)
    .bind(LeaseStatus::Active.to_string())
    .bind(&id)
    .bind(&req.room_id)
    .bind(&req.room_id)
    .fetch_one(&mut *tx)
    .await?;
    if conflicting > 0 {
        return Err(ApiError::conflict(LEASE_CONFLICT));
    }

    match &req.room_id {
        Some(room_id) => {
            sqlx::query("UPDATE rooms SET is_available = 0, updated_at = ? WHERE id = ?")
                .bind(&now)
                .bind(room_id)
                .execute(&mut *tx)
                .await?;
        }
        None => {
            sqlx::query("UPDATE listings SET is_available = 0, updated_at = ? WHERE id = ?")
                .bind(&now)
                .bind(&listing.id)
                .execute(&mut *tx)
                .await?;
        }
    }
    tx.commit().await?;

    let lease = fetch_lease_for(&state.db, &id, &user).await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::LEASE_CREATE,
            resource_type: resource_types::LEASE,
            resource_id: Some(&lease.id),
            resource_name: Some(&listing.title),
            user_id: Some(&user.id),
            details: Some(serde_json::json!({
                "tenant_id": tenant.id,
                "room_id": lease.room_id,
                "rent_amount": lease.rent_amount,
            })),
            ..Default::default()
        },
    )
    .await;

    tracing::info!(lease_id = %lease.id, listing_id = %listing.id, tenant_id = %tenant.id, "Lease created");

    Ok((StatusCode::CREATED, Json(lease)))
}

/// GET /api/leases
pub async fn list_leases(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<LeaseSummary>>, ApiError> {
    let base = r#"
        SELECT lc.id, lc.listing_id, l.title AS listing_title, lc.room_id,
               lc.tenant_id, u.name AS tenant_name, u.email AS tenant_email,
               lc.landlord_id, lc.rent_amount, lc.due_day, lc.start_date, lc.end_date, lc.status
        FROM lease_contracts lc
        JOIN listings l ON l.id = lc.listing_id
        JOIN users u ON u.id = lc.tenant_id
    "#;

    let leases = if user.is_admin() {
        sqlx::query_as::<_, LeaseSummary>(&format!("{} ORDER BY lc.created_at DESC", base))
            .fetch_all(&state.db)
            .await?
    } else {
        let column = if user.is_landlord() {
            "lc.landlord_id"
        } else {
            "lc.tenant_id"
        };
        sqlx::query_as::<_, LeaseSummary>(&format!(
            "{} WHERE {} = ? ORDER BY lc.created_at DESC",
            base, column
        ))
        .bind(&user.id)
        .fetch_all(&state.db)
        .await?
    };

    Ok(Json(leases))
}

/// GET /api/leases/:id
pub async fn get_lease(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<LeaseContract>, ApiError> {
    Ok(Json(fetch_lease_for(&state.db, &id, &user).await?))
}

/// POST /api/leases/:id/terminate
pub async fn terminate_lease(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<LeaseContract>, ApiError> {
    let lease = fetch_lease_for(&state.db, &id, &user).await?;
    if lease.landlord_id != user.id && !user.is_admin() {
        return Err(ApiError::forbidden("Only the landlord can terminate a lease"));
    }
    if !lease.is_active() {
        return Err(ApiError::conflict(format!(
            "Lease is already {}",
            lease.status_enum()
        )));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;
    sqlx::query("UPDATE lease_contracts SET status = ?, updated_at = ? WHERE id = ?")
        .bind(LeaseStatus::Terminated.to_string())
        .bind(&now)
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    match &lease.room_id {
        Some(room_id) => {
            sqlx::query("UPDATE rooms SET is_available = 1, updated_at = ? WHERE id = ?")
                .bind(&now)
                .bind(room_id)
                .execute(&mut *tx)
                .await?;
        }
        None => {
            sqlx::query("UPDATE listings SET is_available = 1, updated_at = ? WHERE id = ?")
                .bind(&now)
                .bind(&lease.listing_id)
                .execute(&mut *tx)
                .await?;
        }
    }
    tx.commit().await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::LEASE_TERMINATE,
            resource_type: resource_types::LEASE,
            resource_id: Some(&lease.id),
            user_id: Some(&user.id),
            ..Default::default()
        },
    )
    .await;

    tracing::info!(lease_id = %lease.id, "Lease terminated");

    Ok(Json(fetch_lease_for(&state.db, &id, &user).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateLeaseRequest {
        CreateLeaseRequest {
            tenant_email: "tenant@example.com".to_string(),
            listing_id: uuid::Uuid::new_v4().to_string(),
            room_id: None,
            rent_amount: 150_000,
            deposit: 300_000,
            due_day: 5,
            start_date: "2026-03-01".to_string(),
            end_date: Some("2027-02-28".to_string()),
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(validate_create_request(&request()).is_ok());
    }

    #[test]
    fn test_end_date_must_follow_start() {
        let mut req = request();
        req.end_date = Some("2026-03-01".to_string());
        assert!(validate_create_request(&req).is_err());
    }

    #[test]
    fn test_rejects_bad_due_day_and_deposit() {
        let mut req = request();
        req.due_day = 0;
        assert!(validate_create_request(&req).is_err());

        let mut req = request();
        req.deposit = -1;
        assert!(validate_create_request(&req).is_err());
    }
}
