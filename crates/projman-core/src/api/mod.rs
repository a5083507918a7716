//! REST API client module for the ProjectManager backend.
//!
//! This module provides the `ApiClient` for talking to the auth endpoints
//! under the configured base URL.
//!
//! The API uses JWT bearer token authentication. The token is held by the
//! client value itself and attached to every request it sends, so each
//! session carries its own authorization.

pub mod client;
pub mod error;

pub use client::{ApiClient, AuthResponse};
pub use error::ApiError;
pub use reqwest::StatusCode;
