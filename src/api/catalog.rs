//! Categories and amenities: public reads, admin-only writes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    actions, resource_types, Amenity, AuditEntry, Category, CreateAmenityRequest,
    CreateCategoryRequest, UpdateAmenityRequest, UpdateCategoryRequest, User,
};
use crate::AppState;

use super::audit::audit_log;
use super::auth::require_admin;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_optional_text, validate_text};

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name ASC")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(categories))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    require_admin(&user)?;

    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_text("Name", &req.name, 2, 60));
    errors.check("description", validate_optional_text("Description", &req.description, 500));
    errors.finish()?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let name = req.name.trim();

    sqlx::query(
        "INSERT INTO categories (id, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(&req.description)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::CATEGORY_CHANGE,
            resource_type: resource_types::CATEGORY,
            resource_id: Some(&category.id),
            resource_name: Some(&category.name),
            user_id: Some(&user.id),
            details: Some(serde_json::json!({ "op": "create" })),
            ..Default::default()
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    require_admin(&user)?;

    let existing = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &req.name {
        errors.check("name", validate_text("Name", name, 2, 60));
    }
    errors.check("description", validate_optional_text("Description", &req.description, 500));
    errors.finish()?;

    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .unwrap_or(&existing.name);
    let description = req.description.as_ref().or(existing.description.as_ref());

    sqlx::query("UPDATE categories SET name = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(name)
        .bind(description)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&id)
        .execute(&state.db)
        .await?;

    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::CATEGORY_CHANGE,
            resource_type: resource_types::CATEGORY,
            resource_id: Some(&category.id),
            resource_name: Some(&category.name),
            user_id: Some(&user.id),
            details: Some(serde_json::json!({ "op": "update" })),
            ..Default::default()
        },
    )
    .await;

    Ok(Json(category))
}

/// Listings in a deleted category keep existing with no category
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;

    let result = sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Category not found"));
    }

    audit_log(
        &state,
        AuditEntry {
            action: actions::CATEGORY_CHANGE,
            resource_type: resource_types::CATEGORY,
            resource_id: Some(&id),
            user_id: Some(&user.id),
            details: Some(serde_json::json!({ "op": "delete" })),
            ..Default::default()
        },
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_amenities(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Amenity>>, ApiError> {
    let amenities = sqlx::query_as::<_, Amenity>("SELECT * FROM amenities ORDER BY name ASC")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(amenities))
}

pub async fn create_amenity(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateAmenityRequest>,
) -> Result<(StatusCode, Json<Amenity>), ApiError> {
    require_admin(&user)?;

    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_text("Name", &req.name, 2, 60));
    errors.check("icon", validate_optional_text("Icon", &req.icon, 60));
    errors.finish()?;

    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO amenities (id, name, icon, created_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(req.name.trim())
        .bind(&req.icon)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&state.db)
        .await?;

    let amenity = sqlx::query_as::<_, Amenity>("SELECT * FROM amenities WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::AMENITY_CHANGE,
            resource_type: resource_types::AMENITY,
            resource_id: Some(&amenity.id),
            resource_name: Some(&amenity.name),
            user_id: Some(&user.id),
            details: Some(serde_json::json!({ "op": "create" })),
            ..Default::default()
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(amenity)))
}

pub async fn update_amenity(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateAmenityRequest>,
) -> Result<Json<Amenity>, ApiError> {
    require_admin(&user)?;

    let existing = sqlx::query_as::<_, Amenity>("SELECT * FROM amenities WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Amenity not found"))?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &req.name {
        errors.check("name", validate_text("Name", name, 2, 60));
    }
    errors.check("icon", validate_optional_text("Icon", &req.icon, 60));
    errors.finish()?;

    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .unwrap_or(&existing.name);
    let icon = req.icon.as_ref().or(existing.icon.as_ref());

    sqlx::query("UPDATE amenities SET name = ?, icon = ? WHERE id = ?")
        .bind(name)
        .bind(icon)
        .bind(&id)
        .execute(&state.db)
        .await?;

    let amenity = sqlx::query_as::<_, Amenity>("SELECT * FROM amenities WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::AMENITY_CHANGE,
            resource_type: resource_types::AMENITY,
            resource_id: Some(&amenity.id),
            resource_name: Some(&amenity.name),
            user_id: Some(&user.id),
            details: Some(serde_json::json!({ "op": "update" })),
            ..Default::default()
        },
    )
    .await;

    Ok(Json(amenity))
}

pub async fn delete_amenity(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user)?;

    let result = sqlx::query("DELETE FROM amenities WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Amenity not found"));
    }

    audit_log(
        &state,
        AuditEntry {
            action: actions::AMENITY_CHANGE,
            resource_type: resource_types::AMENITY,
            resource_id: Some(&id),
            user_id: Some(&user.id),
            details: Some(serde_json::json!({ "op": "delete" })),
            ..Default::default()
        },
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}
