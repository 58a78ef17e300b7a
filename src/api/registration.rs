//! Self-service sign-up.
//!
//! A registration moves through email verification, then phone
//! verification, and only then becomes a user account. Codes for each
//! channel are stored hashed in `verification_codes`, one row per channel.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::db::{
    actions, resource_types, AuditEntry, LoginResponse, RegisterRequest, Registration,
    RegistrationStatusResponse, ResendCodeRequest, User, UserResponse, UserRole,
    VerificationChannel, VerificationCodeRecord, VerifyCodeRequest,
};
use crate::notifications::templates;
use crate::verification::{self, parse_timestamp, resend_wait, VerifyError};
use crate::AppState;

use super::audit::{audit_log, extract_client_ip};
use super::auth::{create_session, hash_password};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    normalize_phone, validate_email, validate_password_strength, validate_phone, validate_text,
};

/// Result of a successful code check: either the next step or a signed-in account
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum VerifyOutcome {
    Pending(RegistrationStatusResponse),
    Complete(LoginResponse),
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegistrationStatusResponse>), ApiError> {
    let email = req.email.trim().to_lowercase();
    let phone = normalize_phone(&req.phone);

    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_text("Name", &req.name, 2, 100));
    errors.check("email", validate_email(&email));
    errors.check("phone", validate_phone(&phone));
    errors.check("password", validate_password_strength(&req.password));
    let role = errors.check(
        "role",
        req.role.parse::<UserRole>().and_then(|role| {
            if role.is_self_assignable() {
                Ok(role)
            } else {
                Err("Role must be tenant or landlord".to_string())
            }
        }),
    );
    errors.finish()?;
    let role = role.ok_or_else(|| ApiError::validation_field("role", "Role is required"))?;

    let taken: Option<(String,)> =
        sqlx::query_as("SELECT id FROM users WHERE email = ? OR phone = ?")
            .bind(&email)
            .bind(&phone)
            .fetch_optional(&state.db)
            .await?;
    if taken.is_some() {
        return Err(ApiError::conflict(
            "An account with this email or phone number already exists",
        ));
    }

    let now = Utc::now();
    // Expired sign-ups and earlier attempts for the same address are superseded
    sqlx::query("DELETE FROM registrations WHERE expires_at <= ? OR email = ? OR phone = ?")
        .bind(now.to_rfc3339())
        .bind(&email)
        .bind(&phone)
        .execute(&state.db)
        .await?;

    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let ttl_hours = state.config.verification.registration_ttl_hours.max(1);

    let registration = Registration {
        id: uuid::Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        email,
        phone,
        password_hash,
        role: role.to_string(),
        email_verified_at: None,
        phone_verified_at: None,
        expires_at: (now + Duration::hours(ttl_hours)).to_rfc3339(),
        created_at: now.to_rfc3339(),
    };

    sqlx::query(
        r#"
        INSERT INTO registrations (id, name, email, phone, password_hash, role, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&registration.id)
    .bind(&registration.name)
    .bind(&registration.email)
    .bind(&registration.phone)
    .bind(&registration.password_hash)
    .bind(&registration.role)
    .bind(&registration.expires_at)
    .bind(&registration.created_at)
    .execute(&state.db)
    .await?;

    if let Err(e) = send_code(&state, &registration, VerificationChannel::Email, now).await {
        sqlx::query("DELETE FROM registrations WHERE id = ?")
            .bind(&registration.id)
            .execute(&state.db)
            .await?;
        return Err(e);
    }

    tracing::info!(registration_id = %registration.id, role = %registration.role, "Registration started");

    let status = status_response(&state, &registration).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

/// GET /api/auth/register/:id
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RegistrationStatusResponse>, ApiError> {
    let registration = load_registration(&state, &id).await?;
    Ok(Json(status_response(&state, &registration).await?))
}

/// POST /api/auth/register/:id/verify
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<Json<VerifyOutcome>, ApiError> {
    let registration = load_registration(&state, &id).await?;
    let channel = parse_channel(&req.channel)?;
    if req.code.trim().is_empty() {
        return Err(ApiError::validation_field("code", "Code is required"));
    }
    ensure_channel_open(&registration, channel)?;

    let record = load_code(&state, &registration.id, channel)
        .await?
        .ok_or_else(|| ApiError::bad_request("No code has been sent on this channel"))?;

    let now = Utc::now();
    verification::ensure_usable(&record, now, &state.otp_policy)?;

    // Reserve the attempt before comparing so concurrent guesses cannot
    // exceed the limit
    let attempts_used: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE verification_codes SET attempts = attempts + 1
        WHERE id = ? AND code_hash = ? AND consumed_at IS NULL AND attempts < ?
        RETURNING attempts
        "#,
    )
    .bind(&record.id)
    .bind(&record.code_hash)
    .bind(state.otp_policy.max_attempts)
    .fetch_optional(&state.db)
    .await?;
    let Some(attempts_used) = attempts_used else {
        // Used up, consumed or replaced by a resend since it was loaded
        return Err(ApiError::gone("This code is no longer valid, request a new one"));
    };

    if !verification::code_matches(&record, &req.code) {
        tracing::info!(registration_id = %registration.id, channel = %channel, "Incorrect verification code");
        return Err(verification::mismatch(attempts_used, &state.otp_policy).into());
    }

    let now_str = now.to_rfc3339();
    let consumed = sqlx::query(
        "UPDATE verification_codes SET consumed_at = ? WHERE id = ? AND code_hash = ? AND consumed_at IS NULL",
    )
    .bind(&now_str)
    .bind(&record.id)
    .bind(&record.code_hash)
    .execute(&state.db)
    .await?;
    if consumed.rows_affected() == 0 {
        return Err(VerifyError::Consumed.into());
    }

    match channel {
        VerificationChannel::Email => {
            sqlx::query("UPDATE registrations SET email_verified_at = ? WHERE id = ?")
                .bind(&now_str)
                .bind(&registration.id)
                .execute(&state.db)
                .await?;
            let registration = Registration {
                email_verified_at: Some(now_str),
                ..registration
            };
            send_code(&state, &registration, VerificationChannel::Sms, now).await?;
            let status = status_response(&state, &registration).await?;
            Ok(Json(VerifyOutcome::Pending(status)))
        }
        VerificationChannel::Sms => {
            let user = complete_registration(&state, &registration, &now_str).await?;
            let token = create_session(&state.db, &user.id, state.config.auth.session_days).await?;

            let ip = extract_client_ip(&headers, None);
            audit_log(
                &state,
                AuditEntry {
                    action: actions::AUTH_REGISTER,
                    resource_type: resource_types::USER,
                    resource_id: Some(&user.id),
                    resource_name: Some(&user.email),
                    user_id: Some(&user.id),
                    ip_address: ip.as_deref(),
                    details: Some(serde_json::json!({ "role": user.role })),
                },
            )
            .await;
            tracing::info!(user_id = %user.id, role = %user.role, "Registration completed");

            Ok(Json(VerifyOutcome::Complete(LoginResponse {
                token,
                user: UserResponse::from(user),
            })))
        }
    }
}

/// POST /api/auth/register/:id/resend
pub async fn resend(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ResendCodeRequest>,
) -> Result<Json<RegistrationStatusResponse>, ApiError> {
    let registration = load_registration(&state, &id).await?;
    let channel = parse_channel(&req.channel)?;
    ensure_channel_open(&registration, channel)?;

    let now = Utc::now();
    if let Some(record) = load_code(&state, &registration.id, channel).await? {
        if let Some(last_sent_at) = parse_timestamp(&record.last_sent_at) {
            let wait = resend_wait(last_sent_at, now, &state.otp_policy);
            if wait > 0 {
                return Err(ApiError::retry_later(
                    format!("Please wait {} seconds before requesting a new code", wait),
                    wait,
                ));
            }
        }
    }

    send_code(&state, &registration, channel, now).await?;
    Ok(Json(status_response(&state, &registration).await?))
}

fn parse_channel(value: &str) -> Result<VerificationChannel, ApiError> {
    value
        .parse::<VerificationChannel>()
        .map_err(|e| ApiError::validation_field("channel", e))
}

/// Email comes first; a channel verified once cannot be verified again
fn ensure_channel_open(
    registration: &Registration,
    channel: VerificationChannel,
) -> Result<(), ApiError> {
    match channel {
        VerificationChannel::Email if registration.email_verified_at.is_some() => {
            Err(ApiError::conflict("Email address is already verified"))
        }
        VerificationChannel::Sms if registration.email_verified_at.is_none() => {
            Err(ApiError::conflict("Verify your email address first"))
        }
        VerificationChannel::Sms if registration.phone_verified_at.is_some() => {
            Err(ApiError::conflict("Phone number is already verified"))
        }
        _ => Ok(()),
    }
}

async fn load_registration(state: &AppState, id: &str) -> Result<Registration, ApiError> {
    let registration: Registration = sqlx::query_as("SELECT * FROM registrations WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Registration not found"))?;

    let expired = parse_timestamp(&registration.expires_at)
        .map(|expires_at| Utc::now() >= expires_at)
        .unwrap_or(true);
    if expired {
        sqlx::query("DELETE FROM registrations WHERE id = ?")
            .bind(id)
            .execute(&state.db)
            .await?;
        return Err(ApiError::gone("Registration has expired, please start again"));
    }

    Ok(registration)
}

async fn load_code(
    state: &AppState,
    registration_id: &str,
    channel: VerificationChannel,
) -> Result<Option<VerificationCodeRecord>, ApiError> {
    let record = sqlx::query_as(
        "SELECT * FROM verification_codes WHERE registration_id = ? AND channel = ?",
    )
    .bind(registration_id)
    .bind(channel.to_string())
    .fetch_optional(&state.db)
    .await?;
    Ok(record)
}

/// Issue a fresh code, deliver it, then store its hash (replacing any
/// previous code for the channel).
async fn send_code(
    state: &AppState,
    registration: &Registration,
    channel: VerificationChannel,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    let issued = verification::issue(&state.otp_policy, now);
    let ttl_minutes = state.otp_policy.ttl.num_minutes().max(1);
    let destination = registration.destination(channel);

    let delivery = match channel {
        VerificationChannel::Email => {
            let content = templates::verification_email(&registration.name, &issued.code, ttl_minutes);
            state
                .notifier
                .send_email(destination, &content.subject, &content.text, &content.html)
                .await
        }
        VerificationChannel::Sms => {
            let body = templates::verification_sms(&issued.code, ttl_minutes);
            state.notifier.send_sms(destination, &body).await
        }
    };
    if let Err(e) = delivery {
        tracing::error!(
            registration_id = %registration.id,
            channel = %channel,
            error = %e,
            "Failed to deliver verification code"
        );
        return Err(ApiError::external_service(format!(
            "Could not deliver the {} verification code, please try again",
            channel
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO verification_codes (id, registration_id, channel, code_hash, attempts, expires_at, last_sent_at, consumed_at)
        VALUES (?, ?, ?, ?, 0, ?, ?, NULL)
        ON CONFLICT (registration_id, channel) DO UPDATE SET
            code_hash = excluded.code_hash,
            attempts = 0,
            expires_at = excluded.expires_at,
            last_sent_at = excluded.last_sent_at,
            consumed_at = NULL
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&registration.id)
    .bind(channel.to_string())
    .bind(&issued.code_hash)
    .bind(issued.expires_at.to_rfc3339())
    .bind(issued.sent_at.to_rfc3339())
    .execute(&state.db)
    .await?;

    tracing::debug!(registration_id = %registration.id, channel = %channel, "Verification code sent");
    Ok(())
}

/// Turn a fully verified registration into a user account
async fn complete_registration(
    state: &AppState,
    registration: &Registration,
    phone_verified_at: &str,
) -> Result<User, ApiError> {
    let mut tx = state.db.begin().await?;
    let user_id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, phone, name, password_hash, role, is_active, email_verified_at, phone_verified_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?)
        "#,
    )
    .bind(&user_id)
    .bind(&registration.email)
    .bind(&registration.phone)
    .bind(&registration.name)
    .bind(&registration.password_hash)
    .bind(&registration.role)
    .bind(&registration.email_verified_at)
    .bind(phone_verified_at)
    .bind(phone_verified_at)
    .bind(phone_verified_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM registrations WHERE id = ?")
        .bind(&registration.id)
        .execute(&mut *tx)
        .await?;

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&user_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(user)
}

async fn status_response(
    state: &AppState,
    registration: &Registration,
) -> Result<RegistrationStatusResponse, ApiError> {
    let codes: Vec<VerificationCodeRecord> =
        sqlx::query_as("SELECT * FROM verification_codes WHERE registration_id = ?")
            .bind(&registration.id)
            .fetch_all(&state.db)
            .await?;

    let now = Utc::now();
    let wait_for = |channel: VerificationChannel| -> i64 {
        let channel = channel.to_string();
        codes
            .iter()
            .find(|c| c.channel == channel)
            .and_then(|c| parse_timestamp(&c.last_sent_at))
            .map(|last_sent_at| resend_wait(last_sent_at, now, &state.otp_policy))
            .unwrap_or(0)
    };

    Ok(RegistrationStatusResponse {
        registration_id: registration.id.clone(),
        step: registration.step(),
        email: registration.email.clone(),
        phone: registration.phone.clone(),
        email_resend_in: wait_for(VerificationChannel::Email),
        sms_resend_in: wait_for(VerificationChannel::Sms),
        expires_at: registration.expires_at.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> Registration {
        Registration {
            id: "r1".to_string(),
            name: "Kofi".to_string(),
            email: "kofi@example.com".to_string(),
            phone: "+233201234567".to_string(),
            password_hash: String::new(),
            role: "tenant".to_string(),
            email_verified_at: None,
            phone_verified_at: None,
            expires_at: String::new(),
            created_at: String::new(),
        }
    }

    #[test]
    fn test_sms_requires_verified_email() {
        let mut reg = registration();
        assert!(ensure_channel_open(&reg, VerificationChannel::Email).is_ok());
        assert!(ensure_channel_open(&reg, VerificationChannel::Sms).is_err());

        reg.email_verified_at = Some("2026-01-01T00:00:00+00:00".to_string());
        assert!(ensure_channel_open(&reg, VerificationChannel::Email).is_err());
        assert!(ensure_channel_open(&reg, VerificationChannel::Sms).is_ok());

        reg.phone_verified_at = Some("2026-01-01T00:05:00+00:00".to_string());
        assert!(ensure_channel_open(&reg, VerificationChannel::Sms).is_err());
    }

    #[test]
    fn test_parse_channel_rejects_unknown() {
        assert_eq!(parse_channel("EMAIL").unwrap(), VerificationChannel::Email);
        assert!(parse_channel("pigeon").is_err());
    }
}
