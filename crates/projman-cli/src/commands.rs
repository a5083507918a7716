//! Command handlers. Each one drives the session store or the router the
//! way the matching page of the web front end does.

use std::io::{self, Write};

use anyhow::{Context, Result};
use projman_core::router::DASHBOARD_PATH;
use projman_core::{ApiError, Config, Credentials, Navigation, Registration, Router, SessionStore};
use tracing::warn;

use crate::cli::Command;

/// Environment variables consulted before prompting
const ENV_USERNAME: &str = "PROJMAN_USERNAME";
const ENV_PASSWORD: &str = "PROJMAN_PASSWORD";

pub struct App {
    config: Config,
    store: SessionStore,
    router: Router,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let store = SessionStore::from_config(&config).context("Failed to open session store")?;
        Ok(Self {
            config,
            store,
            router: Router::default(),
        })
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login { user } => self.login(user).await,
            Command::Register { username, email } => self.register(username, email).await,
            Command::Logout => {
                self.store.logout();
                println!("Logged out.");
                Ok(())
            }
            Command::Whoami { remote } => self.whoami(remote).await,
            Command::Navigate { path } => {
                let nav = self.router.navigate(&path, &self.store)?;
                println!("{}", describe_navigation(&nav));
                Ok(())
            }
            Command::Routes => {
                for record in self.router.records() {
                    let guard = if record.requires_auth { " (login required)" } else { "" };
                    match record.view() {
                        Some(view) => println!("{:<16} {}{}", record.path, view, guard),
                        None => println!("{:<16} redirect{}", record.path, guard),
                    }
                }
                Ok(())
            }
            Command::Refresh => {
                self.store.refresh().await.map_err(friendly)?;
                println!("Access token refreshed.");
                Ok(())
            }
            Command::Verify => {
                if self.store.verify().await.map_err(friendly)? {
                    println!("Token is valid.");
                } else {
                    println!("Token is invalid or expired.");
                }
                Ok(())
            }
        }
    }

    async fn login(&mut self, user: Option<String>) -> Result<()> {
        let first_credential = match user
            .or_else(|| std::env::var(ENV_USERNAME).ok())
            .or_else(|| self.config.last_username.clone())
        {
            Some(name) if !name.trim().is_empty() => name,
            _ => prompt("Username or email: ")?,
        };
        let password = password_from_env_or_prompt("Password: ")?;

        let credentials = Credentials::new(first_credential.clone(), password);
        self.store.login(&credentials).await.map_err(friendly)?;

        self.remember_username(first_credential);
        self.after_auth()
    }

    async fn register(&mut self, username: String, email: String) -> Result<()> {
        let password = password_from_env_or_prompt("Password: ")?;
        let password_confirm = match std::env::var(ENV_PASSWORD) {
            Ok(_) => password.clone(),
            Err(_) => rpassword::prompt_password("Confirm password: ")?,
        };

        let registration = Registration {
            username: username.clone(),
            email,
            password,
            password_confirm,
        };
        self.store.register(&registration).await.map_err(friendly)?;

        self.remember_username(username);
        self.after_auth()
    }

    async fn whoami(&mut self, remote: bool) -> Result<()> {
        if !self.store.is_authenticated() {
            println!("Not logged in.");
            return Ok(());
        }
        if remote {
            self.store.fetch_current_user().await.map_err(friendly)?;
        }
        match self.store.user() {
            Some(user) => println!("{}", serde_json::to_string_pretty(user)?),
            None => println!("Logged in (no user record stored)."),
        }
        Ok(())
    }

    /// Land on the dashboard like the login form does after success.
    fn after_auth(&self) -> Result<()> {
        let name = self
            .store
            .user()
            .map(|u| u.display_name())
            .unwrap_or_else(|| "unknown user".to_string());
        println!("Logged in as {}.", name);

        let nav = self.router.navigate(DASHBOARD_PATH, &self.store)?;
        println!("{}", describe_navigation(&nav));
        Ok(())
    }

    fn remember_username(&mut self, username: String) {
        if let Err(e) = self.config.remember_username(username) {
            warn!(error = %e, "Failed to save config");
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn password_from_env_or_prompt(label: &str) -> Result<String> {
    match std::env::var(ENV_PASSWORD) {
        Ok(password) => Ok(password),
        Err(_) => Ok(rpassword::prompt_password(label)?),
    }
}

/// Attach a user-facing message to an API error, keeping the error itself
/// as the source.
fn friendly(err: ApiError) -> anyhow::Error {
    let message = user_message(&err);
    anyhow::Error::new(err).context(message)
}

fn user_message(err: &ApiError) -> String {
    match err {
        ApiError::Rejected { status, .. } if status.as_u16() == 401 => {
            "Invalid credentials or expired session".to_string()
        }
        ApiError::Rejected { status, .. } if status.is_client_error() => {
            "The server rejected the request".to_string()
        }
        ApiError::Rejected { .. } => "The server failed to handle the request".to_string(),
        ApiError::Network(e) if e.is_timeout() => "Connection timed out. Please try again.".to_string(),
        ApiError::Network(_) => "Unable to connect to server. Check the API URL.".to_string(),
        ApiError::InvalidRequest(_) => "Could not build the request. Check the API URL.".to_string(),
        ApiError::InvalidResponse(_) => "Unexpected response from server".to_string(),
        ApiError::NoRefreshToken => "No refresh token stored; log in again".to_string(),
    }
}

fn describe_navigation(nav: &Navigation) -> String {
    match nav {
        Navigation::Proceed(route) => format!("{} -> {}", route.path, route.view().unwrap_or("-")),
        Navigation::Redirected { from, to, route } => {
            format!("{} redirected to {} -> {}", from, to, route.view().unwrap_or("-"))
        }
        Navigation::NotFound(path) => format!("{}: no such page", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use projman_core::api::StatusCode;

    #[test]
    fn test_user_message_for_rejections() {
        let unauthorized = ApiError::from_status(StatusCode::UNAUTHORIZED, "");
        assert_eq!(user_message(&unauthorized), "Invalid credentials or expired session");

        let bad_request = ApiError::from_status(StatusCode::BAD_REQUEST, "");
        assert_eq!(user_message(&bad_request), "The server rejected the request");

        let server = ApiError::from_status(StatusCode::BAD_GATEWAY, "");
        assert_eq!(user_message(&server), "The server failed to handle the request");
    }

    #[test]
    fn test_user_message_separates_request_and_response_faults() {
        let request = ApiError::InvalidRequest("Invalid endpoint http://[bad".to_string());
        assert_eq!(user_message(&request), "Could not build the request. Check the API URL.");

        let response = ApiError::InvalidResponse("missing access token".to_string());
        assert_eq!(user_message(&response), "Unexpected response from server");
    }

    #[test]
    fn test_friendly_keeps_source() {
        let err = friendly(ApiError::NoRefreshToken);
        assert_eq!(err.to_string(), "No refresh token stored; log in again");
        assert!(err.root_cause().to_string().contains("No refresh token"));
    }

    #[test]
    fn test_describe_navigation() {
        let router = Router::default();

        let nav = router.navigate("/dashboard", &false).unwrap();
        assert_eq!(describe_navigation(&nav), "/dashboard redirected to /login -> Login");

        let nav = router.navigate("/projects/9", &true).unwrap();
        assert_eq!(describe_navigation(&nav), "/projects/9 -> ProjectDetail");

        let nav = router.navigate("/nope", &true).unwrap();
        assert_eq!(describe_navigation(&nav), "/nope: no such page");
    }
}
