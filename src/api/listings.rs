//! Listings and their rooms.
//!
//! Anyone may search approved, available listings. Landlords manage their
//! own listings; every content edit sends an approved listing back to
//! moderation.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use sqlx::{QueryBuilder, Sqlite};
use std::sync::Arc;

use crate::db::{
    actions, page_window, resource_types, Amenity, AuditEntry, Category, CreateListingRequest,
    CreateRoomRequest, Listing, ListingDetail, ListingQuery, ListingStatus, Paginated, Room,
    UpdateListingRequest, UpdateRoomRequest, User,
};
use crate::{AppState, DbPool};

use super::audit::audit_log;
use super::auth::{extract_token, get_current_user, require_landlord};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_amount, validate_non_negative, validate_text, validate_uuid};

const MAX_ROOMS_PER_LISTING: i64 = 50;

/// Append the public search filters shared by the page and count queries
fn push_search_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &ListingQuery) {
    qb.push(" WHERE l.status = ")
        .push_bind(ListingStatus::Approved.to_string())
        .push(" AND l.is_available = 1");

    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", q);
        qb.push(" AND (l.title LIKE ")
            .push_bind(pattern.clone())
            .push(" OR l.description LIKE ")
            .push_bind(pattern.clone())
            .push(" OR l.address LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(city) = query.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        qb.push(" AND LOWER(l.city) = LOWER(")
            .push_bind(city.to_string())
            .push(")");
    }
    if let Some(category_id) = &query.category_id {
        qb.push(" AND l.category_id = ").push_bind(category_id.clone());
    }
    if let Some(min_rent) = query.min_rent {
        qb.push(" AND l.monthly_rent >= ").push_bind(min_rent);
    }
    if let Some(max_rent) = query.max_rent {
        qb.push(" AND l.monthly_rent <= ").push_bind(max_rent);
    }
    if let Some(bedrooms) = query.bedrooms {
        qb.push(" AND l.bedrooms >= ").push_bind(bedrooms);
    }
    if let Some(amenity_id) = &query.amenity_id {
        qb.push(" AND EXISTS (SELECT 1 FROM listing_amenities la WHERE la.listing_id = l.id AND la.amenity_id = ")
            .push_bind(amenity_id.clone())
            .push(")");
    }
}

/// GET /api/listings
pub async fn search_listings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Paginated<Listing>>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let (Some(min), Some(max)) = (query.min_rent, query.max_rent) {
        if min > max {
            errors.add("min_rent", "min_rent cannot be greater than max_rent");
        }
    }
    if query.min_rent.is_some_and(|v| v < 0) {
        errors.add("min_rent", "min_rent cannot be negative");
    }
    if query.bedrooms.is_some_and(|v| v < 0) {
        errors.add("bedrooms", "bedrooms cannot be negative");
    }
    errors.finish()?;

    let (page, per_page, offset) = page_window(query.page, query.per_page, 20, 100);

    let mut count_builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM listings l");
    push_search_filters(&mut count_builder, &query);
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&state.db)
        .await?;

    let mut query_builder = QueryBuilder::<Sqlite>::new("SELECT l.* FROM listings l");
    push_search_filters(&mut query_builder, &query);
    query_builder
        .push(" ORDER BY ")
        .push(query.sort.order_clause())
        .push(" LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind(offset);
    let items = query_builder
        .build_query_as::<Listing>()
        .fetch_all(&state.db)
        .await?;

    Ok(Json(Paginated::new(items, total, page, per_page)))
}

/// Caller identity on routes where signing in is optional
async fn optional_viewer(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let token = extract_token(headers)?;
    get_current_user(&state.db, &token).await.ok()
}

pub(crate) async fn fetch_listing(db: &DbPool, id: &str) -> Result<Listing, ApiError> {
    sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Listing not found"))
}

/// Owned listing or 403; admins pass when `allow_admin` is set
pub(crate) async fn fetch_owned_listing(
    db: &DbPool,
    id: &str,
    user: &User,
    allow_admin: bool,
) -> Result<Listing, ApiError> {
    let listing = fetch_listing(db, id).await?;
    if listing.landlord_id == user.id || (allow_admin && user.is_admin()) {
        Ok(listing)
    } else {
        Err(ApiError::forbidden("You do not own this listing"))
    }
}

fn can_view(listing: &Listing, viewer: Option<&User>) -> bool {
    listing.status_enum().is_public()
        || viewer.is_some_and(|u| u.is_admin() || u.id == listing.landlord_id)
}

pub(crate) async fn load_detail(db: &DbPool, listing: Listing) -> Result<ListingDetail, ApiError> {
    let category = match &listing.category_id {
        Some(category_id) => sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
            .bind(category_id)
            .fetch_optional(db)
            .await?,
        None => None,
    };

    let amenities = sqlx::query_as::<_, Amenity>(
        r#"
        SELECT a.* FROM amenities a
        JOIN listing_amenities la ON la.amenity_id = a.id
        WHERE la.listing_id = ?
        ORDER BY a.name ASC
        "#,
    )
    .bind(&listing.id)
    .fetch_all(db)
    .await?;

    let rooms = sqlx::query_as::<_, Room>(
        "SELECT * FROM rooms WHERE listing_id = ? ORDER BY created_at ASC",
    )
    .bind(&listing.id)
    .fetch_all(db)
    .await?;

    Ok(ListingDetail {
        listing,
        category,
        amenities,
        rooms,
    })
}

/// GET /api/listings/:id
pub async fn get_listing(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ListingDetail>, ApiError> {
    let listing = fetch_listing(&state.db, &id).await?;
    let viewer = optional_viewer(&state, &headers).await;
    if !can_view(&listing, viewer.as_ref()) {
        return Err(ApiError::not_found("Listing not found"));
    }
    Ok(Json(load_detail(&state.db, listing).await?))
}

/// GET /api/my/listings
pub async fn my_listings(
    State(state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Vec<Listing>>, ApiError> {
    require_landlord(&user)?;
    let listings = sqlx::query_as::<_, Listing>(
        "SELECT * FROM listings WHERE landlord_id = ? ORDER BY created_at DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(listings))
}

fn validate_create_request(req: &CreateListingRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check("title", validate_text("Title", &req.title, 5, 120));
    errors.check("description", validate_text("Description", &req.description, 20, 5000));
    errors.check("address", validate_text("Address", &req.address, 3, 255));
    errors.check("city", validate_text("City", &req.city, 2, 100));
    errors.check("monthly_rent", validate_amount("Monthly rent", req.monthly_rent));
    errors.check("bedrooms", validate_non_negative("Bedrooms", req.bedrooms, 50));
    errors.check("bathrooms", validate_non_negative("Bathrooms", req.bathrooms, 50));
    if req.area_sqm.is_some_and(|a| !(a > 0.0)) {
        errors.add("area_sqm", "Area must be greater than 0");
    }
    if let Some(category_id) = &req.category_id {
        errors.check("category_id", validate_uuid(category_id, "category_id"));
    }
    for amenity_id in &req.amenity_ids {
        errors.check("amenity_ids", validate_uuid(amenity_id, "amenity_id"));
    }
    errors.finish()
}

fn validate_update_request(req: &UpdateListingRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(title) = &req.title {
        errors.check("title", validate_text("Title", title, 5, 120));
    }
    if let Some(description) = &req.description {
        errors.check("description", validate_text("Description", description, 20, 5000));
    }
    if let Some(address) = &req.address {
        errors.check("address", validate_text("Address", address, 3, 255));
    }
    if let Some(city) = &req.city {
        errors.check("city", validate_text("City", city, 2, 100));
    }
    if let Some(rent) = req.monthly_rent {
        errors.check("monthly_rent", validate_amount("Monthly rent", rent));
    }
    if let Some(bedrooms) = req.bedrooms {
        errors.check("bedrooms", validate_non_negative("Bedrooms", bedrooms, 50));
    }
    if let Some(bathrooms) = req.bathrooms {
        errors.check("bathrooms", validate_non_negative("Bathrooms", bathrooms, 50));
    }
    if req.area_sqm.is_some_and(|a| !(a > 0.0)) {
        errors.add("area_sqm", "Area must be greater than 0");
    }
    if let Some(category_id) = &req.category_id {
        errors.check("category_id", validate_uuid(category_id, "category_id"));
    }
    for amenity_id in req.amenity_ids.iter().flatten() {
        errors.check("amenity_ids", validate_uuid(amenity_id, "amenity_id"));
    }
    errors.finish()
}

/// Replace the amenity set of a listing
async fn sync_amenities(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    listing_id: &str,
    amenity_ids: &[String],
) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM listing_amenities WHERE listing_id = ?")
        .bind(listing_id)
        .execute(&mut **tx)
        .await?;
    for amenity_id in amenity_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO listing_amenities (listing_id, amenity_id) VALUES (?, ?)",
        )
        .bind(listing_id)
        .bind(amenity_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// POST /api/listings
pub async fn create_listing(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<CreateListingRequest>,
) -> Result<(StatusCode, Json<ListingDetail>), ApiError> {
    require_landlord(&user)?;
    validate_create_request(&req)?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    let mut tx = state.db.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO listings (id, landlord_id, category_id, title, description, address, city, monthly_rent, bedrooms, bathrooms, area_sqm, status, is_available, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.id)
    .bind(&req.category_id)
    .bind(req.title.trim())
    .bind(req.description.trim())
    .bind(req.address.trim())
    .bind(req.city.trim())
    .bind(req.monthly_rent)
    .bind(req.bedrooms)
    .bind(req.bathrooms)
    .bind(req.area_sqm)
    .bind(ListingStatus::Pending.to_string())
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;
    sync_amenities(&mut tx, &id, &req.amenity_ids).await?;
    tx.commit().await?;

    let listing = fetch_listing(&state.db, &id).await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::LISTING_CREATE,
            resource_type: resource_types::LISTING,
            resource_id: Some(&listing.id),
            resource_name: Some(&listing.title),
            user_id: Some(&user.id),
            ..Default::default()
        },
    )
    .await;

    tracing::info!(listing_id = %listing.id, landlord_id = %user.id, "Listing created");

    Ok((StatusCode::CREATED, Json(load_detail(&state.db, listing).await?)))
}

/// PUT /api/listings/:id
pub async fn update_listing(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateListingRequest>,
) -> Result<Json<ListingDetail>, ApiError> {
    let existing = fetch_owned_listing(&state.db, &id, &user, false).await?;
    validate_update_request(&req)?;

    let content_changed = req.title.is_some()
        || req.description.is_some()
        || req.address.is_some()
        || req.city.is_some()
        || req.monthly_rent.is_some()
        || req.bedrooms.is_some()
        || req.bathrooms.is_some()
        || req.area_sqm.is_some()
        || req.category_id.is_some()
        || req.amenity_ids.is_some();

    // Rejected listings go back to review once edited, approved ones on any content change
    let status = match existing.status_enum() {
        ListingStatus::Approved | ListingStatus::Rejected if content_changed => {
            ListingStatus::Pending
        }
        status => status,
    };

    let title = req.title.as_deref().map(str::trim).unwrap_or(&existing.title);
    let description = req
        .description
        .as_deref()
        .map(str::trim)
        .unwrap_or(&existing.description);
    let address = req.address.as_deref().map(str::trim).unwrap_or(&existing.address);
    let city = req.city.as_deref().map(str::trim).unwrap_or(&existing.city);
    let category_id = req.category_id.as_ref().or(existing.category_id.as_ref());

    let mut tx = state.db.begin().await?;
    sqlx::query(
        r#"
        UPDATE listings SET
            title = ?, description = ?, address = ?, city = ?, monthly_rent = ?,
            bedrooms = ?, bathrooms = ?, area_sqm = ?, category_id = ?, is_available = ?,
            status = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(address)
    .bind(city)
    .bind(req.monthly_rent.unwrap_or(existing.monthly_rent))
    .bind(req.bedrooms.unwrap_or(existing.bedrooms))
    .bind(req.bathrooms.unwrap_or(existing.bathrooms))
    .bind(req.area_sqm.or(existing.area_sqm))
    .bind(category_id)
    .bind(req.is_available.unwrap_or(existing.is_available))
    .bind(status.to_string())
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(&id)
    .execute(&mut *tx)
    .await?;
    if let Some(amenity_ids) = &req.amenity_ids {
        sync_amenities(&mut tx, &id, amenity_ids).await?;
    }
    tx.commit().await?;

    let listing = fetch_listing(&state.db, &id).await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::LISTING_UPDATE,
            resource_type: resource_types::LISTING,
            resource_id: Some(&listing.id),
            resource_name: Some(&listing.title),
            user_id: Some(&user.id),
            details: Some(serde_json::json!({
                "status": listing.status,
                "content_changed": content_changed,
            })),
            ..Default::default()
        },
    )
    .await;

    Ok(Json(load_detail(&state.db, listing).await?))
}

/// DELETE /api/listings/:id
///
/// Listings with lease history are archived instead of removed so that
/// leases and payments keep their listing.
pub async fn delete_listing(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let listing = fetch_owned_listing(&state.db, &id, &user, true).await?;

    let (active, total): (i64, i64) = sqlx::query_as(
        "SELECT COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0), COUNT(*) FROM lease_contracts WHERE listing_id = ?",
    )
    .bind(&id)
    .fetch_one(&state.db)
    .await?;

    if active > 0 {
        return Err(ApiError::conflict(
            "Listing has an active lease; terminate it before deleting",
        ));
    }

    let archived = total > 0;
    if archived {
        sqlx::query(
            "UPDATE listings SET status = ?, is_available = 0, updated_at = ? WHERE id = ?",
        )
        .bind(ListingStatus::Archived.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&id)
        .execute(&state.db)
        .await?;
    } else {
        sqlx::query("DELETE FROM listings WHERE id = ?")
            .bind(&id)
            .execute(&state.db)
            .await?;
    }

    audit_log(
        &state,
        AuditEntry {
            action: actions::LISTING_DELETE,
            resource_type: resource_types::LISTING,
            resource_id: Some(&listing.id),
            resource_name: Some(&listing.title),
            user_id: Some(&user.id),
            details: Some(serde_json::json!({ "archived": archived })),
            ..Default::default()
        },
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

// Rooms

/// GET /api/listings/:id/rooms
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<Room>>, ApiError> {
    let listing = fetch_listing(&state.db, &id).await?;
    let viewer = optional_viewer(&state, &headers).await;
    if !can_view(&listing, viewer.as_ref()) {
        return Err(ApiError::not_found("Listing not found"));
    }

    let rooms = sqlx::query_as::<_, Room>(
        "SELECT * FROM rooms WHERE listing_id = ? ORDER BY created_at ASC",
    )
    .bind(&id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rooms))
}

/// POST /api/listings/:id/rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    let listing = fetch_owned_listing(&state.db, &id, &user, false).await?;

    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_text("Name", &req.name, 1, 100));
    errors.check("monthly_rent", validate_amount("Monthly rent", req.monthly_rent));
    if req.size_sqm.is_some_and(|s| !(s > 0.0)) {
        errors.add("size_sqm", "Size must be greater than 0");
    }
    errors.finish()?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rooms WHERE listing_id = ?")
        .bind(&listing.id)
        .fetch_one(&state.db)
        .await?;
    if count >= MAX_ROOMS_PER_LISTING {
        return Err(ApiError::bad_request(format!(
            "A listing can have at most {} rooms",
            MAX_ROOMS_PER_LISTING
        )));
    }

    let room_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO rooms (id, listing_id, name, size_sqm, monthly_rent, is_available, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(&room_id)
    .bind(&listing.id)
    .bind(req.name.trim())
    .bind(req.size_sqm)
    .bind(req.monthly_rent)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let room = fetch_room(&state.db, &room_id).await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::ROOM_CREATE,
            resource_type: resource_types::ROOM,
            resource_id: Some(&room.id),
            resource_name: Some(&room.name),
            user_id: Some(&user.id),
            details: Some(serde_json::json!({ "listing_id": listing.id })),
            ..Default::default()
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(room)))
}

pub(crate) async fn fetch_room(db: &DbPool, id: &str) -> Result<Room, ApiError> {
    sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Room not found"))
}

/// PUT /api/rooms/:id
pub async fn update_room(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdateRoomRequest>,
) -> Result<Json<Room>, ApiError> {
    let existing = fetch_room(&state.db, &id).await?;
    fetch_owned_listing(&state.db, &existing.listing_id, &user, false).await?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &req.name {
        errors.check("name", validate_text("Name", name, 1, 100));
    }
    if let Some(rent) = req.monthly_rent {
        errors.check("monthly_rent", validate_amount("Monthly rent", rent));
    }
    if req.size_sqm.is_some_and(|s| !(s > 0.0)) {
        errors.add("size_sqm", "Size must be greater than 0");
    }
    errors.finish()?;

    sqlx::query(
        "UPDATE rooms SET name = ?, size_sqm = ?, monthly_rent = ?, is_available = ?, updated_at = ? WHERE id = ?",
    )
    .bind(req.name.as_deref().map(str::trim).unwrap_or(&existing.name))
    .bind(req.size_sqm.or(existing.size_sqm))
    .bind(req.monthly_rent.unwrap_or(existing.monthly_rent))
    .bind(req.is_available.unwrap_or(existing.is_available))
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(&id)
    .execute(&state.db)
    .await?;

    let room = fetch_room(&state.db, &id).await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::ROOM_UPDATE,
            resource_type: resource_types::ROOM,
            resource_id: Some(&room.id),
            resource_name: Some(&room.name),
            user_id: Some(&user.id),
            ..Default::default()
        },
    )
    .await;

    Ok(Json(room))
}

/// DELETE /api/rooms/:id
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let room = fetch_room(&state.db, &id).await?;
    fetch_owned_listing(&state.db, &room.listing_id, &user, false).await?;

    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM lease_contracts WHERE room_id = ? AND status = 'active'",
    )
    .bind(&id)
    .fetch_one(&state.db)
    .await?;
    if active > 0 {
        return Err(ApiError::conflict("Room has an active lease"));
    }

    sqlx::query("DELETE FROM rooms WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::ROOM_DELETE,
            resource_type: resource_types::ROOM,
            resource_id: Some(&room.id),
            resource_name: Some(&room.name),
            user_id: Some(&user.id),
            ..Default::default()
        },
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateListingRequest {
        CreateListingRequest {
            title: "Two bedroom flat in Osu".to_string(),
            description: "Bright flat close to the main road with a small balcony.".to_string(),
            address: "12 Oxford Street".to_string(),
            city: "Accra".to_string(),
            monthly_rent: 250_000,
            bedrooms: 2,
            bathrooms: 1,
            area_sqm: Some(70.0),
            category_id: None,
            amenity_ids: vec![],
        }
    }

    #[test]
    fn test_validate_create_request() {
        assert!(validate_create_request(&request()).is_ok());

        let mut bad = request();
        bad.title = "Flat".to_string();
        bad.monthly_rent = 0;
        bad.area_sqm = Some(-3.0);
        bad.amenity_ids = vec!["wifi".to_string()];
        assert!(validate_create_request(&bad).is_err());
    }

    #[test]
    fn test_search_filters_only_bind_present_values() {
        let query = ListingQuery {
            city: Some("Accra".to_string()),
            min_rent: Some(1000),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM listings l");
        push_search_filters(&mut qb, &query);
        let sql = qb.sql();
        assert!(sql.contains("LOWER(l.city)"));
        assert!(sql.contains("l.monthly_rent >="));
        assert!(!sql.contains("l.monthly_rent <="));
        assert!(!sql.contains("listing_amenities"));
    }

    #[test]
    fn test_can_view_hides_unapproved_listings() {
        let listing = Listing {
            id: "l1".to_string(),
            landlord_id: "owner".to_string(),
            category_id: None,
            title: String::new(),
            description: String::new(),
            address: String::new(),
            city: String::new(),
            monthly_rent: 1,
            bedrooms: 0,
            bathrooms: 0,
            area_sqm: None,
            status: "pending".to_string(),
            moderation_note: None,
            is_available: true,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert!(!can_view(&listing, None));

        let mut owner: User = serde_json::from_value(serde_json::json!({
            "id": "owner", "email": "o@example.com", "phone": null, "name": "O",
            "password_hash": "", "role": "landlord", "is_active": true,
            "email_verified_at": null, "phone_verified_at": null,
            "created_at": "", "updated_at": ""
        }))
        .unwrap();
        assert!(can_view(&listing, Some(&owner)));

        owner.id = "someone-else".to_string();
        assert!(!can_view(&listing, Some(&owner)));
        owner.role = "admin".to_string();
        assert!(can_view(&listing, Some(&owner)));
    }
}
