//! Client library for the Khailingo learning platform backend
//!
//! The [`api::ApiClient`] wraps an HTTP transport, sends the session cookies
//! with every call and recovers once from an expired session.

pub mod api;
pub mod config;
pub mod logging;

pub use api::{ApiClient, ApiError, ApiErrorKind, ApiRequest, SessionEnd};
