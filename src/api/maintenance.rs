//! Maintenance requests filed by tenants against their lease.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    actions, resource_types, AuditEntry, CreateMaintenanceRequest, MaintenancePriority,
    MaintenanceQuery, MaintenanceRequest, MaintenanceStatus, UpdateMaintenanceStatusRequest, User,
};
use crate::{AppState, DbPool};

use super::audit::audit_log;
use super::error::{ApiError, ValidationErrorBuilder};
use super::leases::fetch_lease_for;
use super::validation::validate_text;

/// POST /api/leases/:id/maintenance
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(lease_id): Path<String>,
    Json(req): Json<CreateMaintenanceRequest>,
) -> Result<(StatusCode, Json<MaintenanceRequest>), ApiError> {
    let lease = fetch_lease_for(&state.db, &lease_id, &user).await?;
    if lease.tenant_id != user.id {
        return Err(ApiError::forbidden(
            "Only the tenant of a lease can file maintenance requests",
        ));
    }
    if !lease.is_active() {
        return Err(ApiError::conflict("The lease is no longer active"));
    }

    let mut errors = ValidationErrorBuilder::new();
    errors.check("title", validate_text("Title", &req.title, 3, 120));
    errors.check("description", validate_text("Description", &req.description, 10, 5000));
    let priority = match &req.priority {
        Some(p) => errors.check("priority", p.parse::<MaintenancePriority>()),
        None => Some(MaintenancePriority::Medium),
    };
    errors.finish()?;
    let priority = priority.unwrap_or(MaintenancePriority::Medium);

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO maintenance_requests (id, lease_id, listing_id, tenant_id, title, description, priority, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&lease.id)
    .bind(&lease.listing_id)
    .bind(&user.id)
    .bind(req.title.trim())
    .bind(req.description.trim())
    .bind(priority.to_string())
    .bind(MaintenanceStatus::Open.to_string())
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let request = fetch_request(&state.db, &id).await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::MAINTENANCE_CREATE,
            resource_type: resource_types::MAINTENANCE,
            resource_id: Some(&request.id),
            resource_name: Some(&request.title),
            user_id: Some(&user.id),
            details: Some(serde_json::json!({ "lease_id": lease.id, "priority": request.priority })),
            ..Default::default()
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/maintenance
pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<MaintenanceQuery>,
) -> Result<Json<Vec<MaintenanceRequest>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<MaintenanceStatus>)
        .transpose()
        .map_err(|e| ApiError::validation_field("status", e))?
        .map(|s| s.to_string());

    let mut sql = String::from(
        "SELECT m.* FROM maintenance_requests m JOIN lease_contracts lc ON lc.id = m.lease_id WHERE (? IS NULL OR m.status = ?)",
    );
    if user.is_landlord() {
        sql.push_str(" AND lc.landlord_id = ?");
    } else if !user.is_admin() {
        sql.push_str(" AND m.tenant_id = ?");
    }
    sql.push_str(" ORDER BY m.created_at DESC");

    let mut q = sqlx::query_as::<_, MaintenanceRequest>(&sql)
        .bind(&status)
        .bind(&status);
    if !user.is_admin() {
        q = q.bind(&user.id);
    }
    let requests = q.fetch_all(&state.db).await?;

    Ok(Json(requests))
}

async fn fetch_request(db: &DbPool, id: &str) -> Result<MaintenanceRequest, ApiError> {
    sqlx::query_as::<_, MaintenanceRequest>("SELECT * FROM maintenance_requests WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Maintenance request not found"))
}

/// GET /api/maintenance/:id
pub async fn get_request(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<MaintenanceRequest>, ApiError> {
    let request = fetch_request(&state.db, &id).await?;
    fetch_lease_for(&state.db, &request.lease_id, &user).await?;
    Ok(Json(request))
}

/// PUT /api/maintenance/:id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateMaintenanceStatusRequest>,
) -> Result<Json<MaintenanceRequest>, ApiError> {
    let request = fetch_request(&state.db, &id).await?;
    let lease = fetch_lease_for(&state.db, &request.lease_id, &user).await?;

    let next = req
        .status
        .parse::<MaintenanceStatus>()
        .map_err(|e| ApiError::validation_field("status", e))?;
    let current = request.status_enum();

    let allowed = if lease.landlord_id == user.id || user.is_admin() {
        current.landlord_can_move_to(next)
    } else if request.tenant_id == user.id {
        current.tenant_can_move_to(next)
    } else {
        return Err(ApiError::forbidden("You cannot update this request"));
    };
    if !allowed {
        return Err(ApiError::conflict(format!(
            "Maintenance request cannot move from {} to {}",
            current, next
        )));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let resolved_at = (next == MaintenanceStatus::Resolved).then(|| now.clone());
    let result = sqlx::query(
        "UPDATE maintenance_requests SET status = ?, resolved_at = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(next.to_string())
    .bind(&resolved_at)
    .bind(&now)
    .bind(&id)
    .bind(current.to_string())
    .execute(&state.db)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::conflict(
            "Maintenance request changed while this request was processed",
        ));
    }

    let updated = fetch_request(&state.db, &id).await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::MAINTENANCE_STATUS,
            resource_type: resource_types::MAINTENANCE,
            resource_id: Some(&updated.id),
            resource_name: Some(&updated.title),
            user_id: Some(&user.id),
            details: Some(serde_json::json!({
                "from": current.to_string(),
                "to": next.to_string(),
            })),
            ..Default::default()
        },
    )
    .await;

    Ok(Json(updated))
}
