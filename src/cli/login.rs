//! Login and logout commands

use colored::Colorize;
use dialoguer::{Input, Password, theme::ColorfulTheme};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::cli::status::SessionSummary;
use crate::cli::{CommandContext, OutputFormat};
use crate::client::Credentials;
use crate::config::GrantMode;
use crate::error::Result;
use crate::output;

/// Run the login command.
///
/// Interactive deployments use the password grant and prompt for whatever
/// was not passed in; service deployments acquire without prompting.
pub async fn run(
    ctx: &CommandContext,
    username: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let credentials = match ctx.settings.policy.grant_mode {
        GrantMode::Interactive => prompt_credentials(username, password)?,
        GrantMode::ServiceCredential => Credentials::Service,
    };

    log::debug!(
        "Signing in with the {} grant",
        ctx.acquirer.grant_mode().grant_type()
    );
    let spinner = spinner(ctx.format, "Signing in...");
    let acquired = ctx.acquirer.acquire(&credentials).await;
    spinner.finish_and_clear();

    let material = acquired?;
    log::debug!(
        "Received {} token (expires in {}s)",
        material.token_type.as_deref().unwrap_or("bearer"),
        material
            .expires_in
            .map(|s| s.to_string())
            .unwrap_or_else(|| "?".to_string())
    );
    let token = ctx.session.adopt(&material.access_token).await?;

    if ctx.format == OutputFormat::Pretty {
        println!(
            "{} Signed in{}",
            "✓".green(),
            token
                .claims
                .username
                .as_ref()
                .map(|u| format!(" as {}", u.bold()))
                .unwrap_or_default()
        );
        match token.role() {
            Some(role) => println!("  Role: {}\n", role.as_str().cyan()),
            None => println!("  {}\n", "No role assigned".yellow()),
        }
    }

    let summary = SessionSummary::new(
        &ctx.session.guard_state().await,
        Some(&token),
        ctx.settings.policy.grant_mode.grant_type(),
    );
    output::print(&summary, ctx.format)
}

fn prompt_credentials(username: Option<String>, password: Option<String>) -> Result<Credentials> {
    let theme = ColorfulTheme::default();

    let username = match username {
        Some(u) => u,
        None => Input::with_theme(&theme)
            .with_prompt("Username")
            .interact_text()?,
    };
    let password = match password {
        Some(p) => p,
        None => Password::with_theme(&theme)
            .with_prompt("Password")
            .interact()?,
    };

    Ok(Credentials::Password { username, password })
}

/// Spinner on stderr, hidden for machine-readable output
fn spinner(format: OutputFormat, message: &str) -> ProgressBar {
    if format == OutputFormat::Json {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Run the logout command
pub async fn logout(ctx: &CommandContext) -> Result<()> {
    let was_signed_in = ctx.session.guard_state().await.is_authenticated();
    ctx.session.logout().await?;

    match ctx.format {
        OutputFormat::Json => println!(
            "{}",
            output::json::format_json(&serde_json::json!({ "signed_out": was_signed_in }))?
        ),
        _ if was_signed_in => println!("{} Signed out", "✓".green()),
        _ => println!("{} No active session", "○".dimmed()),
    }

    Ok(())
}
