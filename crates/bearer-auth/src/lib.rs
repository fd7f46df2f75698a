//! Bearer credential lifecycle for a single subject
//!
//! Keeps one OAuth-style bearer credential usable across process restarts:
//! validity checking, refresh-token exchange, and durable single-slot
//! persistence. This crate has no dependency on the token-dealer binary and
//! can be embedded by any caller that needs an `Authorization` header.
//!
//! Credential flow:
//! 1. Caller constructs a `CredentialStore` and a `CredentialLifecycleManager`
//! 2. `CredentialLifecycleManager::bootstrap()` seeds the slot if it is empty
//! 3. `CredentialLifecycleManager::get_token()` loads the stored record
//! 4. Expired records are exchanged via `token::refresh_token()`
//! 5. The new record supersedes the old one via `CredentialStore::replace()`
//! 6. Callers build request headers with `headers::request_headers()`

pub mod constants;
pub mod error;
pub mod headers;
pub mod manager;
pub mod record;
pub mod store;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use headers::{bearer_value, request_headers};
pub use manager::{CredentialLifecycleManager, ManagerConfig, TokenStatus};
pub use record::{CredentialRecord, TokenState, now_millis};
pub use store::CredentialStore;
pub use token::{TokenResponse, refresh_endpoint, refresh_token};
