//! stackdeploy - Entry Point
//!
//! Deploys a folder of templates to a named stack and waits for it to
//! converge.

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use stackdeploy::app::cli::{Cli, Command};
use stackdeploy::app::run::run;
use stackdeploy::app::settings::Settings;
use stackdeploy::errors::DeployError;
use stackdeploy::logs::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("Error! {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<(), DeployError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path).await?,
        None => Settings::default(),
    };

    if let Err(e) = init_logging(settings.log_options()) {
        println!("Failed to initialize logging: {e}");
    }

    match cli.command {
        Command::Deploy(args) => {
            let request = args.to_request()?;
            if args.no_events {
                settings.tail_events = false;
            }

            let outcome = run(request, &settings).await?;

            println!("{}", "Deployment successful!".green().bold());
            println!("  stack:   {}", outcome.stack_id);
            println!("  status:  {}", outcome.status);
            println!("  version: {}", outcome.version);
        }
    }

    Ok(())
}
