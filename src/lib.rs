//! Authenticated HTTP client for the LMS backend.
//!
//! [`ApiClient`] attaches the stored access token to every request and, when a
//! request comes back 401, exchanges the refresh token for a new access token
//! and replays the request once. Tokens live in a [`CredentialStore`], by
//! default the OS keychain.

pub mod api;
pub mod config;
pub mod redact;

pub use api::client::ApiClient;
pub use api::error::{ApiError, ErrorResponse};
pub use api::store::{CredentialStore, KeychainStore, MemoryStore, StoreError};
pub use api::types::{Body, CredentialPair, FormPart, RequestDescriptor};
pub use config::{ClientConfig, Environment, Platform, Verbosity};
