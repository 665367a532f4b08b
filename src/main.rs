mod archive;
mod auth;
mod cli;
mod config;
mod error;
mod hr_api;
mod output;
mod pdf;
mod pipeline;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let mut cli = Cli::parse();
    info!("Starting payslip collector");
    cli.execute().await?;

    Ok(())
}
