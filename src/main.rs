//! Clinic CLI - session manager for the clinic platform

use clap::{CommandFactory, Parser};

mod cli;
mod client;
mod config;
mod error;
mod output;
mod session;

use cli::{Cli, CommandContext, Commands, GlobalOptions};
use error::Result;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --debug
    let default_level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Version => {
            println!("clinic version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "clinic", &mut std::io::stdout());
            Ok(())
        }
        command => {
            let ctx = CommandContext::new(&opts).await?;
            dispatch(&ctx, command).await
        }
    }
}

async fn dispatch(ctx: &CommandContext, command: Commands) -> Result<()> {
    match command {
        Commands::Login { username, password } => cli::login::run(ctx, username, password).await,
        Commands::Logout => cli::login::logout(ctx).await,
        Commands::Status => cli::status::run(ctx).await,
        Commands::Claims => cli::claims::run(ctx).await,
        Commands::Check { path } => cli::check::run(ctx, &path).await,
        Commands::Routes => cli::check::routes(ctx),
        Commands::Api { method, path, data } => {
            cli::api::run(ctx, method, &path, data.as_deref()).await
        }
        Commands::Register {
            username,
            email,
            password,
        } => cli::register::run(ctx, username, email, password).await,
        Commands::Version | Commands::Completion { .. } => Ok(()),
    }
}
