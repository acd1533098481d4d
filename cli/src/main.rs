//! chainclaim: fire a fixed batch of pre-signed claims at the claim
//! endpoint through a bounded worker pool, then print a summary.
//!
//! Usage:
//! ```bash
//! # configuration from .env / environment
//! chainclaim
//!
//! # or flags
//! chainclaim --jwt "$JWT" --private-key "$PRIVATE_KEY" --mint-count 500 --worker-count 20
//! ```

mod config;
mod logging;
mod run;

use clap::Parser;

use crate::config::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the environment and flags still apply.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_config());

    let report = run::execute(&cli).await?;
    println!("{report}");

    tokio::time::sleep(cli.exit_grace()).await;
    Ok(())
}
