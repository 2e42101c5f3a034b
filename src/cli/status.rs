//! Status command implementation

use chrono::Utc;
use serde::Serialize;

use crate::cli::CommandContext;
use crate::error::Result;
use crate::output::formatters::{format_remaining, format_unix_seconds};
use crate::output::{self, Field, Report};
use crate::session::{GuardState, SessionToken};

/// Snapshot of the current session, safe to print (no raw token)
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub state: &'static str,
    pub grant_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl SessionSummary {
    pub fn new(state: &GuardState, token: Option<&SessionToken>, grant_type: &'static str) -> Self {
        let state = match state {
            GuardState::Unknown => "loading",
            GuardState::Anonymous => "anonymous",
            GuardState::Authenticated { .. } => "authenticated",
        };

        Self {
            state,
            grant_type,
            username: token.and_then(|t| t.claims.username.clone()),
            role: token.and_then(|t| t.role()).map(|r| r.to_string()),
            organization_id: token.and_then(|t| t.organization_id()),
            issued_at: token.and_then(|t| t.issued_at()),
            expires_at: token.map(|t| t.expires_at()),
            fingerprint: token.map(|t| t.fingerprint()),
        }
    }
}

impl Report for SessionSummary {
    fn title(&self) -> &str {
        "Clinic Session"
    }

    fn fields(&self) -> Vec<Field> {
        let mut fields = vec![
            Field::new("State", self.state),
            Field::new("Grant", self.grant_type),
        ];
        if let Some(ref username) = self.username {
            fields.push(Field::new("User", username.clone()));
        }
        if self.state == "authenticated" {
            fields.push(Field::new(
                "Role",
                self.role.clone().unwrap_or_else(|| "(none)".to_string()),
            ));
        }
        if let Some(org) = self.organization_id {
            fields.push(Field::new("Organization", org.to_string()));
        }
        if let Some(iat) = self.issued_at {
            fields.push(Field::new("Issued", format_unix_seconds(iat)));
        }
        if let Some(exp) = self.expires_at {
            fields.push(Field::new(
                "Expires",
                format!(
                    "{} ({})",
                    format_unix_seconds(exp),
                    format_remaining(exp, Utc::now().timestamp())
                ),
            ));
        }
        if let Some(ref fp) = self.fingerprint {
            fields.push(Field::new("Token", fp.clone()));
        }
        fields
    }
}

/// Run the status command
pub async fn run(ctx: &CommandContext) -> Result<()> {
    let state = ctx.session.guard_state().await;
    let token = ctx.session.current().await;

    let summary = SessionSummary::new(
        &state,
        token.as_ref(),
        ctx.settings.policy.grant_mode.grant_type(),
    );
    output::print(&summary, ctx.format)?;

    if !state.is_authenticated() && ctx.format != crate::cli::OutputFormat::Json {
        println!("\n  → Run 'clinic login' to sign in");
    }

    Ok(())
}
