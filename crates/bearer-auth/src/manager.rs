//! Credential lifecycle: expiry policy and lazy refresh
//!
//! The manager holds configuration only. Token state lives in the store and
//! is read on every call, so a restarted process picks up where it left off.
//!
//! Per-record states:
//! - Valid → Expired (clock passes `valid_until`, never an explicit action)
//! - Expired → Valid (successful refresh writes a superseding record)
//!
//! Refresh is fail-open on transport errors: the caller gets the stale
//! record and the next `get_token()` tries again. Protocol and storage errors
//! are returned. There is no retry loop and no background refresh.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::constants::DEFAULT_REFRESH_TIMEOUT;
use crate::error::{Error, Result};
use crate::headers;
use crate::record::{CredentialRecord, TokenState, now_millis};
use crate::store::CredentialStore;
use crate::token;

/// Lifecycle manager settings.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Storage key of the credential slot
    pub storage_path: PathBuf,
    /// Host (or scheme + host) of the external service
    pub base_url: String,
    /// Deadline for a single refresh round trip
    pub refresh_timeout: Duration,
}

impl ManagerConfig {
    pub fn new(storage_path: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            storage_path: storage_path.into(),
            base_url: base_url.into(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }
}

/// Snapshot of the stored credential, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct TokenStatus {
    pub state: TokenState,
    pub subject: String,
    pub token_type: String,
    pub issued_at: u64,
    pub valid_until: u64,
    pub refresh_valid_until: u64,
}

/// Lifecycle manager for one subject's bearer credential.
pub struct CredentialLifecycleManager {
    config: ManagerConfig,
    endpoint: String,
    store: CredentialStore,
    client: reqwest::Client,
}

impl CredentialLifecycleManager {
    pub fn new(config: ManagerConfig, store: CredentialStore, client: reqwest::Client) -> Self {
        let endpoint = token::refresh_endpoint(&config.base_url);
        info!(
            path = %config.storage_path.display(),
            endpoint = %endpoint,
            "credential manager initialized"
        );
        Self {
            config,
            endpoint,
            store,
            client,
        }
    }

    pub fn storage_path(&self) -> &Path {
        &self.config.storage_path
    }

    /// Token endpoint this manager refreshes against.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Seed the slot with `seed` unless it already holds a record.
    pub async fn bootstrap(&self, seed: &CredentialRecord) -> Result<bool> {
        self.store.initialize(&self.config.storage_path, seed).await
    }

    /// Current credential, refreshed first if the access token has expired.
    pub async fn get_token(&self) -> Result<CredentialRecord> {
        self.get_token_at(now_millis()).await
    }

    /// `get_token()` evaluated at `now` (unix millis).
    pub async fn get_token_at(&self, now: u64) -> Result<CredentialRecord> {
        let record = self.store.load(&self.config.storage_path).await?;
        let state = record.state_at(now);

        if state == TokenState::Valid {
            debug!(
                subject = %record.subject,
                state = state.label(),
                remaining_secs = (record.valid_until() - now) / 1000,
                "returning stored access token"
            );
            return Ok(record);
        }

        debug!(
            subject = %record.subject,
            state = state.label(),
            "refreshing access token"
        );
        self.refresh_flow(record, now).await
    }

    /// Exchange `old`'s refresh token and persist the superseding record.
    ///
    /// Returns `old` unchanged when the endpoint is unreachable, times out, or
    /// answers with anything but 200.
    pub async fn refresh_flow(&self, old: CredentialRecord, now: u64) -> Result<CredentialRecord> {
        let response = match token::refresh_token(
            &self.client,
            &self.endpoint,
            &old.refresh_token,
            self.config.refresh_timeout,
        )
        .await
        {
            Ok(response) => response,
            Err(Error::RefreshTransport(msg)) => {
                record_refresh("transport_error");
                warn!(
                    subject = %old.subject,
                    error = %msg,
                    "token refresh failed, returning stale credential"
                );
                return Ok(old);
            }
            Err(e) => {
                record_refresh("protocol_error");
                warn!(
                    subject = %old.subject,
                    error = %e,
                    "token endpoint sent an unusable response"
                );
                return Err(e);
            }
        };

        // Successive records for a subject must carry increasing issue times,
        // even if the clock has not moved since the previous issue.
        let issued_at = now.max(old.issued_at.saturating_add(1));
        let record = response.into_record(issued_at);
        self.store
            .replace(&self.config.storage_path, &record)
            .await?;

        record_refresh("success");
        info!(
            subject = %record.subject,
            expires_in_secs = record.access_expiry_secs,
            "token refresh succeeded"
        );
        Ok(record)
    }

    /// `Authorization` header value for the current credential.
    pub async fn authorization_header(&self) -> Result<String> {
        let record = self.get_token().await?;
        Ok(headers::bearer_value(&record))
    }

    /// Headers to attach to an outbound call to the external service.
    pub async fn request_headers(&self) -> Result<HeaderMap> {
        let record = self.get_token().await?;
        headers::request_headers(&record)
    }

    /// Report on the stored credential at `now` without refreshing it.
    pub async fn status_at(&self, now: u64) -> Result<TokenStatus> {
        let record = self.store.load(&self.config.storage_path).await?;
        Ok(TokenStatus {
            state: record.state_at(now),
            valid_until: record.valid_until(),
            refresh_valid_until: record.refresh_valid_until(),
            issued_at: record.issued_at,
            subject: record.subject,
            token_type: record.token_type,
        })
    }
}

fn record_refresh(outcome: &'static str) {
    metrics::counter!("credential_refresh_total", "outcome" => outcome).increment(1);
}
