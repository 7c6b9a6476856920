mod cli;

use color_eyre::Report;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // logs go to stderr, stdout is reserved for command output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    cli::Cli::from_args().exec()?;
    Ok(())
}
