//! Rent payments and the billing view of a lease.
//!
//! The client never chooses the period a payment covers: it is always the
//! lease's next open billing window.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

use crate::billing::{self, format_date, BillingPeriod, LeaseTerms, PaymentRecord};
use crate::db::{
    actions, resource_types, AuditEntry, CreatePaymentRequest, LeaseContract, Payment,
    PaymentMethod, PaymentStatus, UpdatePaymentStatusRequest, User,
};
use crate::notifications::{notify_best_effort, templates};
use crate::{AppState, DbPool};

use super::audit::audit_log;
use super::error::{ApiError, ValidationErrorBuilder};
use super::leases::fetch_lease_for;
use super::validation::{validate_amount, validate_optional_text};

#[derive(Debug, Serialize)]
pub struct BillingResponse {
    pub lease_id: String,
    #[serde(flatten)]
    pub period: BillingPeriod,
    pub is_overdue: bool,
    /// Largest amount a new payment may have right now
    pub payable_now: i64,
    pub as_of: NaiveDate,
}

async fn lease_payments(db: &DbPool, lease_id: &str) -> Result<Vec<Payment>, ApiError> {
    let payments = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE lease_id = ? ORDER BY period_start DESC, created_at DESC",
    )
    .bind(lease_id)
    .fetch_all(db)
    .await?;
    Ok(payments)
}

async fn current_period(db: &DbPool, lease: &LeaseContract) -> Result<BillingPeriod, ApiError> {
    let terms = LeaseTerms::try_from(lease)?;
    let records = lease_payments(db, &lease.id)
        .await?
        .iter()
        .map(PaymentRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(billing::next_billing_period(&terms, &records)?)
}

/// GET /api/leases/:id/billing
pub async fn get_billing(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<BillingResponse>, ApiError> {
    let lease = fetch_lease_for(&state.db, &id, &user).await?;
    let period = current_period(&state.db, &lease).await?;
    let today = chrono::Utc::now().date_naive();

    Ok(Json(BillingResponse {
        lease_id: lease.id,
        is_overdue: period.is_overdue(today),
        payable_now: period.payable_now(),
        period,
        as_of: today,
    }))
}

/// GET /api/leases/:id/payments
pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let lease = fetch_lease_for(&state.db, &id, &user).await?;
    Ok(Json(lease_payments(&state.db, &lease.id).await?))
}

/// POST /api/leases/:id/payments
///
/// Tenants submit payments for confirmation; landlords record money they
/// already received.
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    let lease = fetch_lease_for(&state.db, &id, &user).await?;
    let recorded_by_landlord = lease.landlord_id == user.id;
    if lease.tenant_id != user.id && !recorded_by_landlord {
        return Err(ApiError::forbidden(
            "Only the tenant or landlord of a lease can record payments",
        ));
    }
    if !lease.is_active() {
        return Err(ApiError::conflict("Payments can only be made on an active lease"));
    }

    let mut errors = ValidationErrorBuilder::new();
    errors.check("amount", validate_amount("Amount", req.amount));
    let method = errors.check("method", req.method.parse::<PaymentMethod>());
    errors.check("reference", validate_optional_text("Reference", &req.reference, 100));
    errors.finish()?;
    let method = method.ok_or_else(|| ApiError::validation_field("method", "Method is required"))?;

    let period = current_period(&state.db, &lease).await?;
    let payable = period.payable_now();
    if payable == 0 {
        return Err(ApiError::conflict(
            "The current period is already covered by payments awaiting confirmation",
        ));
    }
    if req.amount > payable {
        return Err(ApiError::validation_field(
            "amount",
            format!(
                "Amount exceeds the outstanding balance of {} for this period",
                crate::db::format_amount(payable)
            ),
        ));
    }

    let (status, paid_at) = if recorded_by_landlord {
        (PaymentStatus::Completed, Some(chrono::Utc::now().to_rfc3339()))
    } else {
        (PaymentStatus::Pending, None)
    };

    let payment_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO payments (id, lease_id, tenant_id, amount, method, status, period_start, period_end, reference, paid_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payment_id)
    .bind(&lease.id)
    .bind(&lease.tenant_id)
    .bind(req.amount)
    .bind(method.to_string())
    .bind(status.to_string())
    .bind(format_date(period.period_start))
    .bind(format_date(period.period_end))
    .bind(&req.reference)
    .bind(&paid_at)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let payment = fetch_payment(&state.db, &payment_id).await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::PAYMENT_CREATE,
            resource_type: resource_types::PAYMENT,
            resource_id: Some(&payment.id),
            user_id: Some(&user.id),
            details: Some(serde_json::json!({
                "lease_id": lease.id,
                "amount": payment.amount,
                "status": payment.status,
                "period_start": payment.period_start,
            })),
            ..Default::default()
        },
    )
    .await;

    tracing::info!(
        payment_id = %payment.id,
        lease_id = %lease.id,
        amount = payment.amount,
        status = %payment.status,
        "Payment recorded"
    );

    if status == PaymentStatus::Completed {
        send_confirmation(&state, &payment).await;
    }

    Ok((StatusCode::CREATED, Json(payment)))
}

async fn fetch_payment(db: &DbPool, id: &str) -> Result<Payment, ApiError> {
    sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment not found"))
}

/// PUT /api/payments/:id/status
pub async fn update_payment_status(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(id): Path<String>,
    Json(req): Json<UpdatePaymentStatusRequest>,
) -> Result<Json<Payment>, ApiError> {
    let payment = fetch_payment(&state.db, &id).await?;
    let lease = fetch_lease_for(&state.db, &payment.lease_id, &user).await?;
    if lease.landlord_id != user.id && !user.is_admin() {
        return Err(ApiError::forbidden(
            "Only the landlord can change a payment's status",
        ));
    }

    let next = req
        .status
        .parse::<PaymentStatus>()
        .map_err(|e| ApiError::validation_field("status", e))?;
    let current = payment.status_enum();
    if !current.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "Payment cannot move from {} to {}",
            current, next
        )));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let paid_at = (next == PaymentStatus::Completed).then(|| now.clone());
    let result = sqlx::query(
        "UPDATE payments SET status = ?, paid_at = COALESCE(?, paid_at), updated_at = ? WHERE id = ? AND status = ?",
    )
    .bind(next.to_string())
    .bind(&paid_at)
    .bind(&now)
    .bind(&id)
    .bind(current.to_string())
    .execute(&state.db)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::conflict(
            "Payment status changed while this request was processed",
        ));
    }

    let payment = fetch_payment(&state.db, &id).await?;

    audit_log(
        &state,
        AuditEntry {
            action: actions::PAYMENT_STATUS,
            resource_type: resource_types::PAYMENT,
            resource_id: Some(&payment.id),
            user_id: Some(&user.id),
            details: Some(serde_json::json!({
                "from": current.to_string(),
                "to": next.to_string(),
            })),
            ..Default::default()
        },
    )
    .await;

    if next == PaymentStatus::Completed {
        send_confirmation(&state, &payment).await;
    }

    Ok(Json(payment))
}

async fn send_confirmation(state: &AppState, payment: &Payment) {
    let tenant = match sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&payment.tenant_id)
        .fetch_optional(&state.db)
        .await
    {
        Ok(Some(tenant)) => tenant,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(payment_id = %payment.id, error = %e, "Could not load tenant for payment confirmation");
            return;
        }
    };

    let content = templates::payment_confirmation_email(
        &tenant.name,
        payment.amount,
        &payment.period_start,
        &payment.period_end,
        payment.reference.as_deref(),
    );
    notify_best_effort(state.notifier.as_ref(), &tenant.email, content).await;
}
