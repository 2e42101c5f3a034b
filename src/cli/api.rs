//! Api command implementation

use colored::Colorize;
use reqwest::Method;
use serde_json::Value;

use crate::cli::{CommandContext, HttpMethod, OutputFormat};
use crate::client::ApiResponse;
use crate::error::{Error, Result};
use crate::output::json;

/// Send a request through the authenticated client and print the response
pub async fn run(
    ctx: &CommandContext,
    method: HttpMethod,
    path: &str,
    data: Option<&str>,
) -> Result<()> {
    let body: Option<Value> = match data {
        Some(raw) if method.has_body() => Some(serde_json::from_str(raw)?),
        Some(_) => {
            return Err(Error::Other(format!(
                "{:?} requests do not take a body",
                method
            )));
        }
        None => None,
    };

    let client = &ctx.client;
    let response: ApiResponse<Value> = match (method, body) {
        (HttpMethod::Get, _) => client.get(path).await,
        (HttpMethod::Delete, _) => client.delete(path).await,
        (HttpMethod::Post, Some(body)) => client.post(path, &body).await,
        (HttpMethod::Put, Some(body)) => client.put(path, &body).await,
        (HttpMethod::Patch, Some(body)) => client.patch(path, &body).await,
        // body methods without --data go out with no body at all
        (method, None) => client.send::<(), _>(Method::from(method), path, None).await,
    };

    match ctx.format {
        OutputFormat::Json => println!("{}", json::format_json(&response)?),
        _ => print_pretty(&response)?,
    }

    if response.is_success() {
        return Ok(());
    }
    if response.status == 401 {
        eprintln!("\n  → Session cleared. Run 'clinic login' to sign in again");
    }
    Err(Error::Request {
        status: response.status,
        message: response.status_text,
    })
}

fn print_pretty(response: &ApiResponse<Value>) -> Result<()> {
    let status = format!("{} {}", response.status, response.status_text);
    if response.is_success() {
        println!("{}", status.green());
    } else {
        println!("{}", status.red());
    }

    if let Some(ref data) = response.data {
        println!("{}", serde_json::to_string_pretty(data)?);
    }
    Ok(())
}
