use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::db::{actions, resource_types, AuditEntry, LoginRequest, LoginResponse, User, UserResponse, UserRole};
use crate::{AppState, DbPool};

use super::audit::{audit_log, extract_client_ip};
use super::error::ApiError;

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Bearer token from the Authorization header
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Open a session for `user_id` and return the bearer token (only its hash is stored)
pub async fn create_session(pool: &DbPool, user_id: &str, days: i64) -> Result<String, ApiError> {
    let token = generate_token();
    let now = chrono::Utc::now();
    let expires_at = (now + chrono::Duration::days(days.max(1))).to_rfc3339();

    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(hash_token(&token))
    .bind(&expires_at)
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(token)
}

/// Resolve a bearer token to an active user
pub async fn get_current_user(pool: &DbPool, token: &str) -> Result<User, ApiError> {
    let now = chrono::Utc::now().to_rfc3339();
    let user: Option<User> = sqlx::query_as(
        r#"
        SELECT u.* FROM users u
        JOIN sessions s ON s.user_id = u.id
        WHERE s.token_hash = ? AND s.expires_at > ?
        "#,
    )
    .bind(hash_token(token))
    .bind(&now)
    .fetch_optional(pool)
    .await?;

    match user {
        Some(user) if user.is_active => Ok(user),
        Some(_) => Err(ApiError::forbidden("Account is deactivated")),
        None => Err(ApiError::unauthorized("Invalid or expired session")),
    }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = request.email.trim().to_lowercase();
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&request.password, &user.password_hash) {
        tracing::info!(email = %email, "Failed login attempt");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }
    if !user.is_active {
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    let token = create_session(&state.db, &user.id, state.config.auth.session_days).await?;

    let ip = extract_client_ip(&headers, None);
    audit_log(
        &state,
        AuditEntry {
            action: actions::AUTH_LOGIN,
            resource_type: resource_types::USER,
            resource_id: Some(&user.id),
            resource_name: Some(&user.email),
            user_id: Some(&user.id),
            ip_address: ip.as_deref(),
            details: None,
        },
    )
    .await;

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: User,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    if let Some(token) = extract_token(&headers) {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(hash_token(&token))
            .execute(&state.db)
            .await?;
    }

    audit_log(
        &state,
        AuditEntry {
            action: actions::AUTH_LOGOUT,
            resource_type: resource_types::USER,
            resource_id: Some(&user.id),
            user_id: Some(&user.id),
            ..Default::default()
        },
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(user: User) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Rejects requests without a valid session and caches the user for the
/// `User` extractor.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
    let user = get_current_user(&state.db, &token).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>() {
            return Ok(user.clone());
        }
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        get_current_user(&state.db, &token).await
    }
}

pub fn require_admin(user: &User) -> Result<(), ApiError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Administrator access required"))
    }
}

pub fn require_landlord(user: &User) -> Result<(), ApiError> {
    if user.is_landlord() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only landlords can do this"))
    }
}

pub fn require_tenant(user: &User) -> Result<(), ApiError> {
    if user.is_tenant() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only tenants can do this"))
    }
}

/// Create the bootstrap admin when the database has none. A generated
/// password is logged once so the operator can sign in.
pub async fn ensure_admin_user(pool: &DbPool, config: &AuthConfig) -> anyhow::Result<()> {
    let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?")
        .bind(UserRole::Admin.to_string())
        .fetch_one(pool)
        .await?;
    if admins > 0 {
        return Ok(());
    }

    let (password, generated) = match &config.admin_password {
        Some(password) => (password.clone(), false),
        None => (generate_token()[..20].to_string(), true),
    };
    let password_hash = hash_password(&password)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, password_hash, role, is_active, email_verified_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(config.admin_email.to_lowercase())
    .bind("Administrator")
    .bind(&password_hash)
    .bind(UserRole::Admin.to_string())
    .bind(&now)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    if generated {
        tracing::warn!(
            email = %config.admin_email,
            password = %password,
            "Created admin user with a generated password; change it after first login"
        );
    } else {
        tracing::info!(email = %config.admin_email, "Created admin user");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("Harbour9View").unwrap();
        assert!(verify_password("Harbour9View", &hash));
        assert!(!verify_password("harbour9view", &hash));
        assert!(!verify_password("Harbour9View", "not-a-hash"));
    }

    #[test]
    fn test_tokens_are_random_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_ne!(hash_token(&a), a);
    }

    #[test]
    fn test_extract_token() {
        let mut headers = HeaderMap::new();
        assert!(extract_token(&headers).is_none());
        headers.insert("Authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));
        headers.insert("Authorization", "Basic abc123".parse().unwrap());
        assert!(extract_token(&headers).is_none());
    }

    #[tokio::test]
    async fn test_ensure_admin_user_is_idempotent() {
        let pool = crate::db::connect("sqlite::memory:", 1).await.unwrap();
        let config = AuthConfig {
            admin_email: "root@example.com".to_string(),
            admin_password: Some("Harbour9View".to_string()),
            session_days: 7,
        };
        ensure_admin_user(&pool, &config).await.unwrap();
        ensure_admin_user(&pool, &config).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let user: User = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind("root@example.com")
            .fetch_one(&pool)
            .await
            .unwrap();
        let token = create_session(&pool, &user.id, 7).await.unwrap();
        let current = get_current_user(&pool, &token).await.unwrap();
        assert_eq!(current.id, user.id);
        assert!(get_current_user(&pool, "bogus").await.is_err());
    }
}
