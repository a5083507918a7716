//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionStore`: the owned session with login/register/logout actions
//! - `Storage`: durable key-value storage the session is mirrored to
//! - `Credentials`, `Registration`: request bodies for the auth endpoints
//!
//! The persisted session survives restarts until an explicit logout. There
//! is no local expiry: a token stays authenticated until the server rejects
//! it.

pub mod credentials;
pub mod session;
pub mod storage;

pub use credentials::{Credentials, Registration};
pub use session::{Session, SessionStore, REFRESH_KEY, TOKEN_KEY, USER_KEY};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, Storage, StorageError};
