//! repo-to-repo - Turn GitHub releases into a signed APT repository

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use r2r_cli::{Cli, init_tracing, run};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli);

    run::run(&cli).await
}
