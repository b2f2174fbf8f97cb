pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "echolab",
    about = "EchoLab operator CLI",
    long_about = "Operate the EchoLab message store, inspect configuration, and run the reload and status jobs outside Slack.",
    after_help = "Examples:\n  echolab doctor --json\n  echolab seed\n  echolab reload\n  echolab status --log"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Insert the configured channel and user lookup rows (idempotent)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, DB connectivity, and integration credentials")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Retrieve channel history, extract candidates, and publish the sheet")]
    Reload,
    #[command(about = "Report pending uploads by year")]
    Status {
        #[arg(long, help = "Read the precomputed status log instead of listing the remote folder")]
        log: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Reload => commands::reload::run(),
        Command::Status { log } => commands::status::run(log),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
