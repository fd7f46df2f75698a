//! Refresh protocol constants
//!
//! The external service exposes a single token endpoint under its REST root.
//! Only the refresh-token grant is spoken; there is no client ID or scope.

use std::time::Duration;

/// Path of the token endpoint, appended to the configured base URL.
pub const REFRESH_PATH: &str = "/rest/auth/token";

/// Scheme used when the configured base URL is a bare host.
pub const DEFAULT_SCHEME: &str = "https";

/// Upper bound on a single refresh round trip when the caller supplies none.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// `Accept` value sent alongside the bearer header on outbound calls.
pub const ACCEPT_JSON: &str = "application/json";
