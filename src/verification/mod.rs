//! One-time verification codes.
//!
//! Codes are short decimal strings delivered by email or SMS. Only their
//! SHA-256 hash is stored. A code is valid until it expires, is used, or has
//! been guessed wrong `max_attempts` times. A new code for the same channel
//! can only be requested once the resend cooldown has run out.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::VerificationConfig;
use crate::db::VerificationCodeRecord;

#[derive(Debug, Clone)]
pub struct OtpPolicy {
    pub code_length: usize,
    pub ttl: Duration,
    pub resend_cooldown: Duration,
    pub max_attempts: i64,
}

impl From<&VerificationConfig> for OtpPolicy {
    fn from(config: &VerificationConfig) -> Self {
        Self {
            code_length: config.code_length.clamp(4, 10),
            ttl: Duration::seconds(config.code_ttl_seconds.max(1)),
            resend_cooldown: Duration::seconds(config.resend_cooldown_seconds.max(0)),
            max_attempts: config.max_attempts.max(1),
        }
    }
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self::from(&VerificationConfig::default())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("code has already been used")]
    Consumed,
    #[error("code has expired, request a new one")]
    Expired,
    #[error("too many incorrect attempts, request a new one")]
    TooManyAttempts,
    #[error("incorrect code, {remaining_attempts} attempts remaining")]
    Mismatch { remaining_attempts: i64 },
}

/// A freshly generated code; `code` goes to the user, the rest to the database
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub sent_at: DateTime<Utc>,
}

pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.trim().as_bytes());
    hex::encode(hasher.finalize())
}

pub fn issue(policy: &OtpPolicy, now: DateTime<Utc>) -> IssuedCode {
    let code = generate_code(policy.code_length);
    IssuedCode {
        code_hash: hash_code(&code),
        code,
        expires_at: now + policy.ttl,
        sent_at: now,
    }
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Reject a stored code that can no longer be tried. Attempts are reserved
/// in the database before `code_matches` is consulted.
pub fn ensure_usable(
    record: &VerificationCodeRecord,
    now: DateTime<Utc>,
    policy: &OtpPolicy,
) -> Result<(), VerifyError> {
    if record.consumed_at.is_some() {
        return Err(VerifyError::Consumed);
    }
    if record.attempts >= policy.max_attempts {
        return Err(VerifyError::TooManyAttempts);
    }
    let expired = parse_timestamp(&record.expires_at)
        .map(|expires_at| now >= expires_at)
        .unwrap_or(true);
    if expired {
        return Err(VerifyError::Expired);
    }
    Ok(())
}

/// Constant-time comparison of `candidate` with the stored hash
pub fn code_matches(record: &VerificationCodeRecord, candidate: &str) -> bool {
    let expected = record.code_hash.as_bytes();
    let provided = hash_code(candidate);
    let provided = provided.as_bytes();
    expected.len() == provided.len() && bool::from(expected.ct_eq(provided))
}

/// Error for a wrong guess once `attempts_used` attempts have been recorded
pub fn mismatch(attempts_used: i64, policy: &OtpPolicy) -> VerifyError {
    VerifyError::Mismatch {
        remaining_attempts: (policy.max_attempts - attempts_used).max(0),
    }
}

/// Whole seconds left before another code may be sent; 0 means now.
pub fn resend_wait(last_sent_at: DateTime<Utc>, now: DateTime<Utc>, policy: &OtpPolicy) -> i64 {
    let ready_at = last_sent_at + policy.resend_cooldown;
    if now >= ready_at {
        return 0;
    }
    let remaining_ms = (ready_at - now).num_milliseconds();
    (remaining_ms + 999) / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> OtpPolicy {
        OtpPolicy {
            code_length: 6,
            ttl: Duration::minutes(10),
            resend_cooldown: Duration::seconds(60),
            max_attempts: 3,
        }
    }

    fn record_for(code: &str, now: DateTime<Utc>) -> VerificationCodeRecord {
        VerificationCodeRecord {
            id: "c1".to_string(),
            registration_id: "r1".to_string(),
            channel: "email".to_string(),
            code_hash: hash_code(code),
            attempts: 0,
            expires_at: (now + Duration::minutes(10)).to_rfc3339(),
            last_sent_at: now.to_rfc3339(),
            consumed_at: None,
        }
    }

    #[test]
    fn test_generated_codes_are_digits_of_requested_length() {
        for len in [4, 6, 8] {
            let code = generate_code(len);
            assert_eq!(code.len(), len);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_issue_hashes_code() {
        let now = Utc::now();
        let issued = issue(&policy(), now);
        assert_eq!(issued.code_hash, hash_code(&issued.code));
        assert_eq!(issued.expires_at, now + Duration::minutes(10));
    }

    #[test]
    fn test_correct_code_accepted_with_whitespace() {
        let now = Utc::now();
        let record = record_for("123456", now);
        assert_eq!(ensure_usable(&record, now, &policy()), Ok(()));
        assert!(code_matches(&record, " 123456 "));
        assert!(!code_matches(&record, "123457"));
    }

    #[test]
    fn test_attempt_limit_and_remaining_count() {
        let now = Utc::now();
        let mut record = record_for("123456", now);
        assert_eq!(mismatch(1, &policy()), VerifyError::Mismatch { remaining_attempts: 2 });
        assert_eq!(mismatch(3, &policy()), VerifyError::Mismatch { remaining_attempts: 0 });
        record.attempts = 2;
        assert_eq!(ensure_usable(&record, now, &policy()), Ok(()));
        record.attempts = 3;
        assert_eq!(
            ensure_usable(&record, now, &policy()),
            Err(VerifyError::TooManyAttempts)
        );
    }

    #[test]
    fn test_expired_and_consumed_codes_rejected() {
        let now = Utc::now();
        let record = record_for("123456", now);
        assert_eq!(
            ensure_usable(&record, now + Duration::minutes(11), &policy()),
            Err(VerifyError::Expired)
        );

        let mut used = record_for("123456", now);
        used.consumed_at = Some(now.to_rfc3339());
        assert_eq!(ensure_usable(&used, now, &policy()), Err(VerifyError::Consumed));
    }

    #[test]
    fn test_resend_countdown() {
        let sent = Utc::now();
        let p = policy();
        assert_eq!(resend_wait(sent, sent, &p), 60);
        assert_eq!(resend_wait(sent, sent + Duration::milliseconds(59_500), &p), 1);
        assert_eq!(resend_wait(sent, sent + Duration::seconds(60), &p), 0);
        assert_eq!(resend_wait(sent, sent + Duration::seconds(300), &p), 0);
    }

    #[test]
    fn test_policy_from_config_clamps() {
        let mut config = VerificationConfig::default();
        config.code_length = 2;
        config.max_attempts = 0;
        let policy = OtpPolicy::from(&config);
        assert_eq!(policy.code_length, 4);
        assert_eq!(policy.max_attempts, 1);
    }
}
