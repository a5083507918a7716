//! Core library for the ProjectManager client.
//!
//! - `api`: HTTP client for the ProjectManager auth API
//! - `auth`: the session store, its durable storage and login payloads
//! - `router`: the route table and its authentication guard
//! - `models`: user records returned by the API
//! - `config`: application configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod router;

pub use api::{ApiClient, ApiError, AuthResponse};
pub use auth::{
    Credentials, FileStorage, KeyringStorage, MemoryStorage, Registration, Session, SessionStore,
    Storage, StorageError,
};
pub use config::{Config, StorageBackend};
pub use models::{User, UserId};
pub use router::{AuthState, Navigation, RouteEntry, RouteError, RouteMatch, Router};
