//! Data models for ProjectManager entities.

pub mod user;

pub use user::{User, UserId};
