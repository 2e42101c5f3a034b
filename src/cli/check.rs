//! Route check and route listing commands

use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{CommandContext, OutputFormat};
use crate::error::{Error, Result};
use crate::output::{self, Field, Report, json, table};
use crate::session::{Decision, GuardState, authorize};

#[derive(Serialize)]
struct CheckReport<'a> {
    path: &'a str,
    required_roles: Option<&'a [String]>,
    #[serde(flatten)]
    decision: &'a Decision,
}

impl Report for CheckReport<'_> {
    fn title(&self) -> &str {
        "Route Check"
    }

    fn fields(&self) -> Vec<Field> {
        let required = match self.required_roles {
            None => "public".to_string(),
            Some([]) => "any signed-in user".to_string(),
            Some(roles) => roles.join(", "),
        };
        let decision = match self.decision {
            Decision::Loading => "loading".to_string(),
            Decision::Render => "render".to_string(),
            Decision::Redirect(target) => format!("redirect → {}", target),
        };

        vec![
            Field::new("Path", self.path),
            Field::new("Requires", required),
            Field::new("Decision", decision),
        ]
    }
}

/// Run the guard for `path` and print the decision.
///
/// A redirect is reported as an error so the process exits non-zero.
pub async fn run(ctx: &CommandContext, path: &str) -> Result<()> {
    let required = ctx.guard.routes().required_roles(path);
    let decision = ctx.guard.check_path(path).await;

    output::print(
        &CheckReport {
            path,
            required_roles: required,
            decision: &decision,
        },
        ctx.format,
    )?;

    match decision {
        Decision::Render | Decision::Loading => Ok(()),
        Decision::Redirect(_) => {
            let state = ctx.session.guard_state().await;
            match (&state, required) {
                (GuardState::Authenticated { .. }, Some(roles)) => {
                    authorize(&state, roles).map_err(Error::from)
                }
                _ => Err(Error::SessionRequired),
            }
        }
    }
}

#[derive(Serialize, Tabled)]
struct RouteRow {
    #[tabled(rename = "PATH")]
    path: String,
    #[tabled(rename = "ROLES")]
    #[serde(skip)]
    roles_display: String,
    #[tabled(skip)]
    roles: Vec<String>,
}

/// List the route table
pub fn routes(ctx: &CommandContext) -> Result<()> {
    let rows: Vec<RouteRow> = ctx
        .guard
        .routes()
        .iter()
        .map(|(path, roles)| RouteRow {
            path: path.clone(),
            roles_display: if roles.is_empty() {
                "(any signed-in user)".to_string()
            } else {
                roles.join(", ")
            },
            roles: roles.clone(),
        })
        .collect();

    match ctx.format {
        OutputFormat::Json => println!("{}", json::format_json(&rows)?),
        OutputFormat::Table => println!("{}", table::format_table(&rows)),
        OutputFormat::Pretty => {
            println!("{}\n", "Protected Views".bold());
            for row in &rows {
                println!("{}  {}", row.path.cyan(), row.roles_display.dimmed());
            }
            let views = ctx.guard.views();
            println!(
                "\nLogin: {}  Unauthorized: {}  Home: {}",
                views.login, views.unauthorized, views.home
            );
        }
    }

    Ok(())
}
