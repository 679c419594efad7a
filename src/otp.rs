//! One-time passcodes for passwordless login.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wrong guesses tolerated before a code is discarded.
pub const MAX_ATTEMPTS: i32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("OTP expired")]
    Expired,

    #[error("Invalid OTP")]
    Mismatch,

    #[error("Too many invalid attempts, please request a new OTP")]
    TooManyAttempts,
}

impl OtpError {
    /// Outcome of a wrong guess given the recorded attempt count.
    pub fn after_attempts(attempts: i32) -> Self {
        if attempts >= MAX_ATTEMPTS {
            OtpError::TooManyAttempts
        } else {
            OtpError::Mismatch
        }
    }
}

impl OtpCode {
    pub fn issue(ttl: Duration) -> Self {
        Self::issue_at(Utc::now(), ttl)
    }

    pub fn issue_at(now: DateTime<Utc>, ttl: Duration) -> Self {
        let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
        OtpCode {
            code: code.to_string(),
            expires_at: now + ttl,
            attempts: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Checks `candidate` against this code without recording anything. The
    /// attempt counter lives in the store, which bumps it atomically.
    pub fn verify(&self, candidate: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        if self.is_expired(now) {
            return Err(OtpError::Expired);
        }
        if self.attempts >= MAX_ATTEMPTS {
            return Err(OtpError::TooManyAttempts);
        }
        if self.code == candidate.trim() {
            Ok(())
        } else {
            Err(OtpError::Mismatch)
        }
    }
}
