//! Credential record model
//!
//! A record is immutable once issued. Refresh produces a new record that
//! wholly supersedes the previous one in the store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One issued bearer credential.
///
/// Expiries are relative lifetimes in seconds, counted from `issued_at`,
/// which is an absolute unix timestamp in milliseconds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialRecord {
    pub access_token: String,
    pub access_expiry_secs: u64,
    pub refresh_token: String,
    pub refresh_expiry_secs: u64,
    pub token_type: String,
    /// Identifier of the subject the token was issued to (the user email)
    pub subject: String,
    /// Issue time as unix timestamp in milliseconds
    pub issued_at: u64,
}

/// Observable validity of a record at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Valid,
    Expired,
}

impl TokenState {
    /// Status label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            TokenState::Valid => "valid",
            TokenState::Expired => "expired",
        }
    }
}

impl CredentialRecord {
    /// Instant (unix millis) at which the access token stops being usable.
    pub fn valid_until(&self) -> u64 {
        self.issued_at
            .saturating_add(self.access_expiry_secs.saturating_mul(1000))
    }

    /// Instant (unix millis) at which the refresh token stops being usable.
    pub fn refresh_valid_until(&self) -> u64 {
        self.issued_at
            .saturating_add(self.refresh_expiry_secs.saturating_mul(1000))
    }

    /// The boundary is exclusive: at `now == valid_until()` the record is expired.
    pub fn is_valid_at(&self, now: u64) -> bool {
        now < self.valid_until()
    }

    pub fn state_at(&self, now: u64) -> TokenState {
        if self.is_valid_at(now) {
            TokenState::Valid
        } else {
            TokenState::Expired
        }
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("access_token", &"[REDACTED]")
            .field("access_expiry_secs", &self.access_expiry_secs)
            .field("refresh_token", &"[REDACTED]")
            .field("refresh_expiry_secs", &self.refresh_expiry_secs)
            .field("token_type", &self.token_type)
            .field("subject", &self.subject)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Current wall-clock time as unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
