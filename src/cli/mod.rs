//! CLI command definitions and handlers

use clap::{Parser, Subcommand};
pub use clap_complete::Shell;

pub mod api;
pub mod args;
pub mod check;
pub mod claims;
pub mod context;
pub mod login;
pub mod register;
pub mod status;

pub use args::{GlobalOptions, HttpMethod, OutputFormat};
pub use context::CommandContext;

/// Clinic CLI - sign in, inspect the session and call the clinic backend
#[derive(Parser, Debug)]
#[command(name = "clinic")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, table, json)
    #[arg(
        long,
        global = true,
        env = "CLINIC_FORMAT",
        default_value = "pretty",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "CLINIC_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Override session store directory
    #[arg(long, global = true, env = "CLINIC_STORE", hide_env = true)]
    pub store: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "CLINIC_DEBUG", hide_env = true)]
    pub debug: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and persist the session
    Login {
        /// Username (prompted when omitted)
        #[arg(long, short = 'u')]
        username: Option<String>,

        /// Password (prompted when omitted)
        #[arg(long, env = "CLINIC_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and clear the persisted session
    Logout,

    /// Show the current session
    Status,

    /// Show the decoded claims of the current token
    Claims,

    /// Decide whether a view renders or redirects for the current session
    #[command(after_help = "EXAMPLES:\n  \
        clinic check /pages/doctor/create\n  \
        clinic check /pages/appointments --format json\n\n\
        Exits non-zero when the decision is a redirect.")]
    Check {
        /// View path, e.g. /pages/doctor/edit/12
        path: String,
    },

    /// List protected views and the roles they require
    Routes,

    /// Send an authenticated request to the clinic backend
    #[command(after_help = "EXAMPLES:\n  \
        clinic api GET /doctor-service/doctors\n  \
        clinic api POST /doctor-service/doctors --data '{\"name\":\"Ana\"}'")]
    Api {
        /// HTTP method
        #[arg(value_enum)]
        method: HttpMethod,

        /// Path relative to the API base URL
        path: String,

        /// JSON request body
        #[arg(long, short = 'd')]
        data: Option<String>,
    },

    /// Create a user account through the identity provider
    Register {
        #[arg(long, short = 'u')]
        username: String,

        #[arg(long, short = 'e')]
        email: String,

        /// Password (prompted when omitted)
        #[arg(long, short = 'p')]
        password: Option<String>,
    },

    /// Generate shell completions
    #[command(after_help = "\
Install:
  bash:   clinic completion bash > /etc/bash_completion.d/clinic
  zsh:    clinic completion zsh > \"${fpath[1]}/_clinic\"
  fish:   clinic completion fish > ~/.config/fish/completions/clinic.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Display version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_api_command() {
        let cli = Cli::try_parse_from([
            "clinic",
            "api",
            "post",
            "/doctor-service/doctors",
            "--data",
            "{}",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Api { method, path, data } => {
                assert_eq!(method, HttpMethod::Post);
                assert_eq!(path, "/doctor-service/doctors");
                assert_eq!(data.as_deref(), Some("{}"));
            }
            other => panic!("Expected Api, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_store_flag() {
        let cli = Cli::try_parse_from(["clinic", "status", "--store", "/tmp/s"]).unwrap();
        assert_eq!(cli.store.as_deref(), Some("/tmp/s"));
        assert!(matches!(cli.command, Commands::Status));
    }
}
