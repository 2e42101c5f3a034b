//! Claims command implementation

use serde::Serialize;

use crate::cli::CommandContext;
use crate::error::{Error, Result};
use crate::output::formatters::format_unix_seconds;
use crate::output::{self, Field, Report};
use crate::session::Claims;

#[derive(Serialize)]
struct ClaimsReport<'a> {
    #[serde(flatten)]
    claims: &'a Claims,
    role_claim_path: &'a str,
}

impl Report for ClaimsReport<'_> {
    fn title(&self) -> &str {
        "Token Claims"
    }

    fn fields(&self) -> Vec<Field> {
        let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
        let claims = self.claims;

        vec![
            Field::new("Subject", or_dash(claims.subject.clone())),
            Field::new("Username", or_dash(claims.username.clone())),
            Field::new(
                "Issued",
                or_dash(claims.iat.map(format_unix_seconds)),
            ),
            Field::new("Expires", format_unix_seconds(claims.exp)),
            Field::new(
                "Roles",
                format!("{} (from {})", claims.roles.join(", "), self.role_claim_path),
            ),
            Field::new("Role", or_dash(claims.role.as_ref().map(|r| r.to_string()))),
            Field::new(
                "Organization",
                or_dash(claims.organization_id.map(|o| o.to_string())),
            ),
        ]
    }
}

/// Print the decoded claims of the current token
pub async fn run(ctx: &CommandContext) -> Result<()> {
    let token = ctx.session.current().await.ok_or(Error::SessionRequired)?;

    let report = ClaimsReport {
        claims: &token.claims,
        role_claim_path: &ctx.settings.policy.role_claim_path,
    };
    output::print(&report, ctx.format)
}
