//! run-z entry point.
//!
//! Usage:
//!   run-z [PACKAGES...] TASK [/ARG|//ARG//|,TASK|...]... [--OPT...]

use std::process::ExitCode;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("run-z: {e:?}");
            ExitCode::from(2)
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cwd = std::env::current_dir()
        .context("cannot determine working directory")?
        .to_string_lossy()
        .into_owned();

    Ok(runz_cli::run(argv, &cwd).await)
}
