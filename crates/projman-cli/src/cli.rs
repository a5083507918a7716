use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "projman", version, about = "ProjectManager session and navigation client")]
pub struct Cli {
    /// API base URL (overrides config and PROJMAN_API_BASE_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in with a username or email
    Login {
        /// Username or email; defaults to PROJMAN_USERNAME or the last login
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Create an account and log in
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
    },
    /// End the session and forget the stored token
    Logout,
    /// Show the logged in user
    Whoami {
        /// Reload the profile from the server
        #[arg(long)]
        remote: bool,
    },
    /// Navigate to a path and print where the router ends up
    Navigate { path: String },
    /// List the route table
    Routes,
    /// Trade the refresh token for a new access token
    Refresh,
    /// Ask the server whether the current token is still valid
    Verify,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login_with_user() {
        let cli = Cli::parse_from(["projman", "login", "--user", "ada"]);
        assert!(matches!(cli.command, Command::Login { user: Some(ref u) } if u == "ada"));
    }

    #[test]
    fn test_parse_navigate_with_global_api_url() {
        let cli = Cli::parse_from(["projman", "navigate", "/projects/7", "--api-url", "http://localhost:9000/api/"]);
        assert_eq!(cli.api_url.as_deref(), Some("http://localhost:9000/api/"));
        assert!(matches!(cli.command, Command::Navigate { ref path } if path == "/projects/7"));
    }

    #[test]
    fn test_register_requires_email() {
        assert!(Cli::try_parse_from(["projman", "register", "--username", "ada"]).is_err());
    }
}
