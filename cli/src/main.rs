//! runloop - binary entry point.
//!
//! ```text
//! main() -> init_tracing() -> RuntimeConfig::from_env() -> Runtime::new() -> Runtime::run(Echo)
//! ```
//!
//! Startup failures (missing `AWS_LAMBDA_RUNTIME_API`, client construction)
//! exit non-zero. Once the loop starts nothing returns; the process ends only
//! when the environment terminates it.

mod echo;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use runloop_engine::{Runtime, RuntimeConfig};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // One line per event with an RFC 3339 timestamp; the platform collects stdout.
    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(std::io::stdout))
        .with(env_filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    let config = RuntimeConfig::from_env().context("failed to load runtime API configuration")?;
    let runtime = Runtime::new(&config).context("failed to build runtime API clients")?;

    match runtime.run(echo::Echo).await {}
}
