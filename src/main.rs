mod cli;
mod config;
mod control_plane;
mod executor;
mod resolve;
mod roles;
mod scope;
mod session;
mod util;
mod workflow;

use anyhow::Result;
use clap::Parser;
use cli::{Command, RootArgs};
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init();
}

fn main() -> Result<ExitCode> {
    let args = RootArgs::parse();
    init_tracing(args.verbose());

    match args.command {
        Command::Provision(args) => workflow::run_provision(&args),
        Command::Verify(args) => workflow::run_verify(&args),
    }
}
