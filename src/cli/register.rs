//! Register command implementation

use colored::Colorize;
use dialoguer::{Password, theme::ColorfulTheme};

use crate::cli::{CommandContext, OutputFormat};
use crate::client::{NewUser, register_user};
use crate::error::Result;
use crate::output::json;

/// Create an account; the current session is left untouched
pub async fn run(
    ctx: &CommandContext,
    username: String,
    email: String,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => Password::with_theme(&ColorfulTheme::default())
            .with_prompt("Password")
            .with_confirmation("Repeat password", "Passwords do not match")
            .interact()?,
    };

    let user = NewUser {
        username,
        email,
        password,
    };
    register_user(&ctx.provider, &user).await?;

    match ctx.format {
        OutputFormat::Json => println!(
            "{}",
            json::format_json(&serde_json::json!({
                "username": user.username,
                "email": user.email,
                "registered": true,
            }))?
        ),
        _ => {
            println!("{} Registered {}", "✓".green(), user.username.bold());
            println!("  → Run 'clinic login -u {}' to sign in", user.username);
        }
    }

    Ok(())
}
