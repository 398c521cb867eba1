//! pkgcheck - package check harness CLI
//!
//! Expands test plans, grades executed tests and probes app pages.

use anyhow::Result;
use clap::Parser;
use pkgcheck::cli::{Cli, Commands};
use pkgcheck::{commands, errors, logging};
use pkgcheck_common::config::PkgcheckConfig;
use tracing::error;

async fn run(cli: Cli) -> Result<i32> {
    let config = PkgcheckConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::DefaultArgs { manifest } => commands::default_args(&manifest)?,
        Commands::TestList { app_dir, dump_to } => {
            commands::test_list(&app_dir, dump_to.as_deref())?
        }
        Commands::Analyze {
            context_dir,
            summary_out,
            no_color,
            run,
        } => commands::analyze(
            &context_dir,
            summary_out.as_ref(),
            no_color,
            run.into(),
            &config,
        )?,
        Commands::Probe(args) => return commands::probe(args, &config).await,
    }
    Ok(errors::EXIT_SUCCESS)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            errors::exit_code_for(&e)
        }
    };
    std::process::exit(code);
}
