//! Pending registrations and their one-time verification codes.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Where a one-time code is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationChannel {
    Email,
    Sms,
}

impl std::fmt::Display for VerificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationChannel::Email => write!(f, "email"),
            VerificationChannel::Sms => write!(f, "sms"),
        }
    }
}

impl std::str::FromStr for VerificationChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "email" => Ok(VerificationChannel::Email),
            "sms" | "phone" => Ok(VerificationChannel::Sms),
            _ => Err(format!("Unknown verification channel: {}", s)),
        }
    }
}

/// Where a sign-up currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStep {
    VerifyEmail,
    VerifyPhone,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Registration {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub email_verified_at: Option<String>,
    pub phone_verified_at: Option<String>,
    pub expires_at: String,
    pub created_at: String,
}

impl Registration {
    pub fn step(&self) -> RegistrationStep {
        match (&self.email_verified_at, &self.phone_verified_at) {
            (None, _) => RegistrationStep::VerifyEmail,
            (Some(_), None) => RegistrationStep::VerifyPhone,
            (Some(_), Some(_)) => RegistrationStep::Complete,
        }
    }

    /// Address a code for `channel` is delivered to
    pub fn destination(&self, channel: VerificationChannel) -> &str {
        match channel {
            VerificationChannel::Email => &self.email,
            VerificationChannel::Sms => &self.phone,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VerificationCodeRecord {
    pub id: String,
    pub registration_id: String,
    pub channel: String,
    pub code_hash: String,
    pub attempts: i64,
    pub expires_at: String,
    pub last_sent_at: String,
    pub consumed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    /// "tenant" or "landlord"
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub channel: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendCodeRequest {
    pub channel: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegistrationStatusResponse {
    pub registration_id: String,
    pub step: RegistrationStep,
    pub email: String,
    pub phone: String,
    /// Seconds until a new email code may be requested
    pub email_resend_in: i64,
    /// Seconds until a new SMS code may be requested
    pub sms_resend_in: i64,
    pub expires_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> Registration {
        Registration {
            id: "r1".to_string(),
            name: "Ama".to_string(),
            email: "ama@example.com".to_string(),
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
    fn test_step_progression() {
        let mut reg = registration();
        assert_eq!(reg.step(), RegistrationStep::VerifyEmail);
        reg.email_verified_at = Some("2026-01-01T00:00:00+00:00".to_string());
        assert_eq!(reg.step(), RegistrationStep::VerifyPhone);
        reg.phone_verified_at = Some("2026-01-01T00:01:00+00:00".to_string());
        assert_eq!(reg.step(), RegistrationStep::Complete);
    }

    #[test]
    fn test_destination_by_channel() {
        let reg = registration();
        assert_eq!(reg.destination(VerificationChannel::Email), "ama@example.com");
        assert_eq!(reg.destination(VerificationChannel::Sms), "+233201234567");
        assert_eq!("phone".parse::<VerificationChannel>().unwrap(), VerificationChannel::Sms);
    }
}
