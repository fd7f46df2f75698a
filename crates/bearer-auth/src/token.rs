//! Refresh-token exchange
//!
//! One POST to `{base}/rest/auth/token` with a form-encoded
//! `refresh_token` field. Failures are split by where they happened:
//! anything before a 200 arrives is `RefreshTransport`, a 200 whose body does
//! not carry every required field is `RefreshProtocol`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::constants::{DEFAULT_SCHEME, REFRESH_PATH};
use crate::error::{Error, Result};
use crate::record::CredentialRecord;

/// Successful response body from the token endpoint.
///
/// Lifetimes are deltas in seconds from the response time. Some deployments
/// send them as numeric strings, so both forms are accepted.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(deserialize_with = "seconds")]
    pub expires_in: u64,
    pub refresh_token: String,
    #[serde(deserialize_with = "seconds")]
    pub refresh_token_expires_in: u64,
    pub token_type: String,
    pub useremail: String,
}

impl TokenResponse {
    /// Build the record that supersedes the current one, issued at `issued_at`.
    pub fn into_record(self, issued_at: u64) -> CredentialRecord {
        CredentialRecord {
            access_token: self.access_token,
            access_expiry_secs: self.expires_in,
            refresh_token: self.refresh_token,
            refresh_expiry_secs: self.refresh_token_expires_in,
            token_type: self.token_type,
            subject: self.useremail,
            issued_at,
        }
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &"[REDACTED]")
            .field("refresh_token_expires_in", &self.refresh_token_expires_in)
            .field("token_type", &self.token_type)
            .field("useremail", &self.useremail)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(u64),
    Text(String),
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    match Seconds::deserialize(deserializer)? {
        Seconds::Number(n) => Ok(n),
        Seconds::Text(s) => s
            .trim()
            .parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid seconds value {s:?}: {e}"))),
    }
}

/// Full token endpoint URL for a configured base.
///
/// A bare host (`api.example.com`, `api.example.com:8443`) gets the https
/// scheme. A base that already names its scheme is used as given.
pub fn refresh_endpoint(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}{REFRESH_PATH}")
    } else {
        format!("{DEFAULT_SCHEME}://{base}{REFRESH_PATH}")
    }
}

/// Exchange a refresh token for a new credential.
///
/// Makes exactly one attempt, bounded by `timeout`. Only HTTP 200 counts as
/// success; every other status is reported as a transport failure.
pub async fn refresh_token(
    client: &reqwest::Client,
    endpoint: &str,
    refresh: &str,
    timeout: Duration,
) -> Result<TokenResponse> {
    let response = client
        .post(endpoint)
        .timeout(timeout)
        .form(&[("refresh_token", refresh)])
        .send()
        .await
        .map_err(|e| Error::RefreshTransport(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::RefreshTransport(format!(
            "token refresh returned {status}: {body}"
        )));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| Error::RefreshTransport(format!("reading refresh response: {e}")))?;

    serde_json::from_slice::<TokenResponse>(&body)
        .map_err(|e| Error::RefreshProtocol(format!("invalid refresh response: {e}")))
}
