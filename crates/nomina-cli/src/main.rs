//! # nomina CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nomina_cli::credentials::{run_hash_password, run_token, HashPasswordArgs, TokenArgs};
use nomina_cli::preview::{run_preview, PreviewArgs};

/// Payroll backend operator tools.
#[derive(Parser, Debug)]
#[command(name = "nomina", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the argon2 hash of a password.
    HashPassword(HashPasswordArgs),

    /// Mint a bearer token for the API.
    Token(TokenArgs),

    /// Compute a disbursement plan from a JSON snapshot.
    Preview(PreviewArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::HashPassword(args) => run_hash_password(args),
        Commands::Token(args) => run_token(args),
        Commands::Preview(args) => run_preview(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn token_accepts_repeated_scopes() {
        let cli = Cli::try_parse_from([
            "nomina", "token", "--secret", "s", "--username", "a", "--user-id", "1",
            "--scope", "Admin", "--scope", "receipts:read",
        ])
        .unwrap();
        match cli.command {
            Commands::Token(args) => assert_eq!(args.scopes.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn preview_parses_date() {
        let cli = Cli::try_parse_from([
            "nomina", "-v", "preview", "--snapshot", "s.json", "--period", "2", "--date", "2024-01-20",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Commands::Preview(_)));
    }
}
