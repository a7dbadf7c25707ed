use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use rootstrap::cli::{self, Cli};
use rootstrap::config::Config;
use rootstrap::signal::CancelToken;
use rootstrap::{error, logging, preflight, provision};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(cli::usage_exit_code(&e));
        }
    };

    logging::setup_logging(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::from(error::exit_code(&e).clamp(1, 255) as u8)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    // Subscribe before anything can be mounted.
    let cancel = CancelToken::install()?;

    // Load .env if present
    dotenvy::dotenv().ok();
    let config = Config::load();
    config.log();

    let options = cli.into_options(&config);
    let tools = preflight::run_preflight(&options)?;

    let teardown = provision(&options, &tools, &cancel)?;
    tracing::debug!(
        "unmounted {} pseudo-filesystems, removed {} temporary files",
        teardown.unmounted.len(),
        teardown.removed.len()
    );
    tracing::info!("Provisioned {}", options.root.display());
    Ok(())
}
