mod admin;
mod audit;
pub mod auth;
mod catalog;
pub mod error;
mod leases;
mod listings;
mod maintenance;
mod payments;
pub mod rate_limit;
mod registration;
mod validation;
mod viewings;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Sign-in and sign-up (tighter rate limit)
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/register", post(registration::register))
        .route("/register/:id", get(registration::status))
        .route("/register/:id/verify", post(registration::verify))
        .route("/register/:id/resend", post(registration::resend))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    // Marketplace browsing, no session required
    let public_routes = Router::new()
        .route("/listings", get(listings::search_listings))
        .route("/listings/:id", get(listings::get_listing))
        .route("/listings/:id/rooms", get(listings::list_rooms))
        .route("/categories", get(catalog::list_categories))
        .route("/amenities", get(catalog::list_amenities));

    let protected_routes = Router::new()
        // Listings
        .route("/my/listings", get(listings::my_listings))
        .route("/listings", post(listings::create_listing))
        .route("/listings/:id", put(listings::update_listing))
        .route("/listings/:id", delete(listings::delete_listing))
        // Rooms
        .route("/listings/:id/rooms", post(listings::create_room))
        .route("/rooms/:id", put(listings::update_room))
        .route("/rooms/:id", delete(listings::delete_room))
        // Leases
        .route("/leases", post(leases::create_lease))
        .route("/leases", get(leases::list_leases))
        .route("/leases/:id", get(leases::get_lease))
        .route("/leases/:id/terminate", post(leases::terminate_lease))
        // Payments
        .route("/leases/:id/billing", get(payments::get_billing))
        .route("/leases/:id/payments", get(payments::list_payments))
        .route("/leases/:id/payments", post(payments::create_payment))
        .route("/payments/:id/status", put(payments::update_payment_status))
        // Maintenance
        .route("/leases/:id/maintenance", post(maintenance::create_request))
        .route("/maintenance", get(maintenance::list_requests))
        .route("/maintenance/:id", get(maintenance::get_request))
        .route("/maintenance/:id/status", put(maintenance::update_status))
        // Viewings
        .route("/listings/:id/viewings", post(viewings::create_viewing))
        .route("/viewings", get(viewings::list_viewings))
        .route("/viewings/:id/approve", post(viewings::approve_viewing))
        .route("/viewings/:id/decline", post(viewings::decline_viewing))
        .route("/viewings/:id/cancel", post(viewings::cancel_viewing))
        // Catalog administration
        .route("/categories", post(catalog::create_category))
        .route("/categories/:id", put(catalog::update_category))
        .route("/categories/:id", delete(catalog::delete_category))
        .route("/amenities", post(catalog::create_amenity))
        .route("/amenities/:id", put(catalog::update_amenity))
        .route("/amenities/:id", delete(catalog::delete_amenity))
        // Admin
        .route("/admin/stats", get(admin::stats))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id", put(admin::update_user))
        .route("/admin/listings", get(admin::list_listings))
        .route("/admin/listings/:id/moderation", put(admin::moderate_listing))
        .route("/admin/audit-logs", get(audit::list_logs))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    let api_routes = public_routes
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
