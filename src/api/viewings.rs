//! Viewing requests: a tenant asks to see a listing, its landlord decides.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    actions, resource_types, AuditEntry, CreateViewingRequest, ListingStatus, User,
    ViewingDecisionRequest, ViewingRequest, ViewingStatus,
};
use crate::notifications::{notify_best_effort, templates};
use crate::{AppState, DbPool};

use super::audit::audit_log;
use super::auth::require_tenant;
use super::error::{ApiError, ValidationErrorBuilder};
use super::listings::fetch_listing;
use super::validation::{validate_future_timestamp, validate_optional_text};

const PENDING_CONFLICT: &str = "You already have a pending viewing request for this listing";

/// POST /api/listings/:id/viewings
pub async fn create_viewing(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(listing_id): Path<String>,
    Json(req): Json<CreateViewingRequest>,
) -> Result<(StatusCode, Json<ViewingRequest>), ApiError> {
    require_tenant(&user)?;

    let listing = fetch_listing(&state.db, &listing_id).await?;
    if listing.status_enum() != ListingStatus::Approved {
        return Err(ApiError::not_found("Listing not found"));
    }

    let now = chrono::Utc::now();
    let mut errors = ValidationErrorBuilder::new();
    let preferred = errors.check(
        "preferred_date",
        validate_future_timestamp("Preferred date", &req.preferred_date, now),
    );
    errors.check("message", validate_optional_text("Message", &req.message, 1000));
    errors.finish()?;
    let preferred = preferred
        .ok_or_else(|| ApiError::validation_field("preferred_date", "Preferred date is required"))?;

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM viewing_requests WHERE tenant_id = ? AND listing_id = ? AND status = ?",
    )
    .bind(&user.id)
    .bind(&listing.id)
    .bind(ViewingStatus::Pending.to_string())
    .fetch_one(&state.db)
    .await?;
    if pending > 0 {
        return Err(ApiError::conflict(PENDING_CONFLICT));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = now.to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO viewing_requests (id, listing_id, tenant_id, landlord_id, preferred_date, message, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&listing.id)
    .bind(&user.id)
    .bind(&listing.landlord_id)
    .bind(preferred.to_rfc3339())
    .bind(&req.message)
    .bind(ViewingStatus::Pending.to_string())
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(|e| ApiError::conflict_on_unique(e, PENDING_CONFLICT))?;

    let viewing = fetch_viewing(&state.db, &id).await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::VIEWING_CREATE,
            resource_type: resource_types::VIEWING,
            resource_id: Some(&viewing.id),
            resource_name: Some(&listing.title),
            user_id: Some(&user.id),
            ..Default::default()
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(viewing)))
}

/// GET /api/viewings
pub async fn list_viewings(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<ViewingRequest>>, ApiError> {
    let viewings = if user.is_admin() {
        sqlx::query_as::<_, ViewingRequest>(
            "SELECT * FROM viewing_requests ORDER BY created_at DESC",
        )
        .fetch_all(&state.db)
        .await?
    } else {
        let column = if user.is_landlord() { "landlord_id" } else { "tenant_id" };
        sqlx::query_as::<_, ViewingRequest>(&format!(
            "SELECT * FROM viewing_requests WHERE {} = ? ORDER BY preferred_date ASC",
            column
        ))
        .bind(&user.id)
        .fetch_all(&state.db)
        .await?
    };
    Ok(Json(viewings))
}

async fn fetch_viewing(db: &DbPool, id: &str) -> Result<ViewingRequest, ApiError> {
    sqlx::query_as::<_, ViewingRequest>("SELECT * FROM viewing_requests WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Viewing request not found"))
}

/// POST /api/viewings/:id/approve
pub async fn approve_viewing(
    state: State<Arc<AppState>>,
    user: User,
    id: Path<String>,
    body: Option<Json<ViewingDecisionRequest>>,
) -> Result<Json<ViewingRequest>, ApiError> {
    decide(state, user, id, body, ViewingStatus::Approved).await
}

/// POST /api/viewings/:id/decline
pub async fn decline_viewing(
    state: State<Arc<AppState>>,
    user: User,
    id: Path<String>,
    body: Option<Json<ViewingDecisionRequest>>,
) -> Result<Json<ViewingRequest>, ApiError> {
    decide(state, user, id, body, ViewingStatus::Declined).await
}

async fn decide(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    body: Option<Json<ViewingDecisionRequest>>,
    outcome: ViewingStatus,
) -> Result<Json<ViewingRequest>, ApiError> {
    let Json(req) = body.unwrap_or_default();
    let viewing = fetch_viewing(&state.db, &id).await?;
    if viewing.landlord_id != user.id {
        return Err(ApiError::forbidden(
            "Only the listing's landlord can decide on a viewing request",
        ));
    }
    if !viewing.status_enum().awaits_decision() {
        return Err(ApiError::conflict(format!(
            "Viewing request is already {}",
            viewing.status
        )));
    }

    let mut errors = ValidationErrorBuilder::new();
    errors.check(
        "response_message",
        validate_optional_text("Response message", &req.response_message, 1000),
    );
    errors.finish()?;

    let result = sqlx::query(
        "UPDATE viewing_requests SET status = ?, response_message = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(outcome.to_string())
    .bind(&req.response_message)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(&id)
    .bind(ViewingStatus::Pending.to_string())
    .execute(&state.db)
    .await?;
    if result.rows_affected() == 0 {
        // Cancelled or decided since it was loaded
        return Err(ApiError::conflict("Viewing request is no longer pending"));
    }

    let viewing = fetch_viewing(&state.db, &id).await?;
    let approved = outcome == ViewingStatus::Approved;

    audit_log(
        &state,
        AuditEntry {
            action: if approved {
                actions::VIEWING_APPROVE
            } else {
                actions::VIEWING_DECLINE
            },
            resource_type: resource_types::VIEWING,
            resource_id: Some(&viewing.id),
            user_id: Some(&user.id),
            ..Default::default()
        },
    )
    .await;

    notify_tenant(&state, &viewing, approved).await;

    Ok(Json(viewing))
}

async fn notify_tenant(state: &AppState, viewing: &ViewingRequest, approved: bool) {
    let row: Result<Option<(String, String, String)>, sqlx::Error> = sqlx::query_as(
        r#"
        SELECT u.name, u.email, l.title FROM viewing_requests v
        JOIN users u ON u.id = v.tenant_id
        JOIN listings l ON l.id = v.listing_id
        WHERE v.id = ?
        "#,
    )
    .bind(&viewing.id)
    .fetch_optional(&state.db)
    .await;

    let (name, email, title) = match row {
        Ok(Some(row)) => row,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(viewing_id = %viewing.id, error = %e, "Could not load viewing recipient");
            return;
        }
    };

    let content = templates::viewing_decision_email(
        &name,
        &title,
        &viewing.preferred_date,
        approved,
        viewing.response_message.as_deref(),
    );
    notify_best_effort(state.notifier.as_ref(), &email, content).await;
}

/// POST /api/viewings/:id/cancel
pub async fn cancel_viewing(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<ViewingRequest>, ApiError> {
    let viewing = fetch_viewing(&state.db, &id).await?;
    if viewing.tenant_id != user.id {
        return Err(ApiError::forbidden("Only the requesting tenant can cancel"));
    }
    if !viewing.status_enum().can_cancel() {
        return Err(ApiError::conflict(format!(
            "Viewing request is already {}",
            viewing.status
        )));
    }

    let result = sqlx::query(
        "UPDATE viewing_requests SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(ViewingStatus::Cancelled.to_string())
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(&id)
    .bind(&viewing.status)
    .execute(&state.db)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::conflict("Viewing request changed, reload and try again"));
    }

    audit_log(
        &state,
        AuditEntry {
            action: actions::VIEWING_CANCEL,
            resource_type: resource_types::VIEWING,
            resource_id: Some(&viewing.id),
            user_id: Some(&user.id),
            ..Default::default()
        },
    )
    .await;

    Ok(Json(fetch_viewing(&state.db, &id).await?))
}
