//! Outbound request headers built from a credential record
//!
//! Callers fetch a record (usually through the lifecycle manager) and pass
//! the resulting map into their own request construction.

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};

use crate::constants::ACCEPT_JSON;
use crate::error::{Error, Result};
use crate::record::CredentialRecord;

/// `Authorization` header value for `record`.
pub fn bearer_value(record: &CredentialRecord) -> String {
    format!("Bearer {}", record.access_token)
}

/// Headers for a call to the external service: bearer auth plus JSON accept.
///
/// The authorization value is marked sensitive so it is masked in the
/// header map's Debug output.
pub fn request_headers(record: &CredentialRecord) -> Result<HeaderMap> {
    let mut auth = HeaderValue::from_str(&bearer_value(record))
        .map_err(|e| Error::InvalidHeader(format!("access token for {}: {e}", record.subject)))?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(access: &str) -> CredentialRecord {
        CredentialRecord {
            access_token: access.into(),
            access_expiry_secs: 3600,
            refresh_token: "r1".into(),
            refresh_expiry_secs: 7200,
            token_type: "bearer".into(),
            subject: "u@example.com".into(),
            issued_at: 0,
        }
    }

    #[test]
    fn bearer_value_prefixes_access_token() {
        assert_eq!(bearer_value(&record("a1")), "Bearer a1");
    }

    #[test]
    fn request_headers_carry_auth_and_accept() {
        let headers = request_headers(&record("a1")).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer a1");
        assert!(headers[AUTHORIZATION].is_sensitive());
        assert_eq!(headers[ACCEPT], "application/json");
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn token_with_control_characters_is_rejected() {
        let err = request_headers(&record("a1\r\nX-Injected: yes")).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)), "got: {err:?}");
    }
}
