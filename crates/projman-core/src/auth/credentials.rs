use std::fmt;

use serde::Serialize;

/// Login form body. `first_credential` is either a username or an email;
/// the server tries email first.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub first_credential: String,
    pub password: String,
}

impl Credentials {
    pub fn new(first_credential: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            first_credential: first_credential.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("first_credential", &self.first_credential)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Registration form body
#[derive(Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

impl Registration {
    /// Build a registration whose confirmation matches the password.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let password = password.into();
        Self {
            username: username.into(),
            email: email.into(),
            password_confirm: password.clone(),
            password,
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
