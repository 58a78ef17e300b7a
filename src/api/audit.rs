//! Audit helpers and the admin audit log endpoint.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use std::{net::SocketAddr, sync::Arc};

use crate::db::{list_audit_logs, log_audit, AuditEntry, AuditLog, AuditLogQuery, Paginated, User};
use crate::AppState;

use super::auth::require_admin;
use super::error::ApiError;

/// Client address from proxy headers, falling back to the peer address.
pub fn extract_client_ip(headers: &HeaderMap, conn_info: Option<&SocketAddr>) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(first_ip) = forwarded.split(',').next() {
            let ip = first_ip.trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        let ip = real_ip.trim();
        if !ip.is_empty() {
            return Some(ip.to_string());
        }
    }

    conn_info.map(|addr| addr.ip().to_string())
}

/// Record an audit entry. Failures are logged and never fail the request.
pub async fn audit_log(state: &AppState, entry: AuditEntry<'_>) {
    let action = entry.action;
    let resource_type = entry.resource_type;
    if let Err(e) = log_audit(&state.db, entry).await {
        tracing::warn!(
            action = action,
            resource_type = resource_type,
            error = %e,
            "Failed to create audit log entry"
        );
    }
}

/// GET /api/admin/audit-logs
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<Paginated<AuditLog>>, ApiError> {
    require_admin(&user)?;
    let result = list_audit_logs(&state.db, &query).await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "192.0.2.7:5000".parse().unwrap();
        assert_eq!(extract_client_ip(&headers, Some(&peer)).as_deref(), Some("192.0.2.7"));

        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());
        assert_eq!(extract_client_ip(&headers, Some(&peer)).as_deref(), Some("198.51.100.2"));

        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(extract_client_ip(&headers, Some(&peer)).as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_extract_client_ip_without_any_source() {
        assert!(extract_client_ip(&HeaderMap::new(), None).is_none());
    }
}
