//! Assistant CLI Binary
//!
//! Command-line interface for the assistant coordination runtime.

use assistant_core::logging::init_logging;
use assistant_core::tooling::cli::{Cli, CliContext};
use clap::Parser;
use std::process;

async fn run(cli: Cli) -> anyhow::Result<String> {
    let mut context = CliContext::new(cli.config.clone())?;

    let logging = &mut context.config_mut().logging;
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        logging.format = format.parse()?;
    }
    if let Some(output) = &cli.log_output {
        logging.output = output.parse()?;
    }
    init_logging(Some(&context.config().logging))?;

    Ok(context.execute(&cli.command).await?)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
