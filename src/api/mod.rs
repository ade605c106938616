//! API client module for the LMS app.
//!
//! Provides the HTTP client with bearer-token injection and refresh-on-401,
//! secure token storage, and request/response types matching the LMS backend API.

pub mod client;
pub mod error;
pub mod session;
pub mod store;
pub mod types;
