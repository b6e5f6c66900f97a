//! Command entrypoints for `provision` and `verify`.
//!
//! Each entrypoint resolves settings, locates the `az` binary, runs the
//! sequence and renders the report. Stdout carries only the summary or JSON.
mod context;
mod grants;
mod progress;
mod provision;
mod report;
mod verify;

#[cfg(test)]
#[path = "provision_tests.rs"]
mod provision_tests;

use crate::cli::{ProvisionArgs, VerifyArgs};
use crate::config::{load_settings, Settings};
use crate::control_plane::AzCli;
use crate::util::write_json;
use anyhow::{Context, Result};
use provision::{provision, ProvisionOptions};
use std::process::ExitCode;

fn connect(settings: &Settings) -> Result<AzCli> {
    let az = AzCli::from_command(&settings.run.az_command)?;
    let path = az.locate()?;
    tracing::debug!(path = %path.display(), "located az");
    Ok(az)
}

/// Run the provisioning sequence and map its decision to the exit code.
pub(crate) fn run_provision(args: &ProvisionArgs) -> Result<ExitCode> {
    let settings = load_settings(&args.resources, &args.connection)?;
    let az = connect(&settings)?;
    let options = ProvisionOptions {
        skip_verify: args.skip_verify,
        dry_run: args.dry_run,
    };

    let report = provision(&az, &settings, options)?;

    if let Some(path) = &args.report {
        write_json(path, &report)?;
        progress::line(
            progress::Level::Info,
            &format!("wrote report to {}", path.display()),
        );
    }
    if args.json {
        let json = serde_json::to_string_pretty(&report).context("serialize report")?;
        println!("{json}");
    } else {
        print!("{}", report::render_summary(&report));
    }
    Ok(ExitCode::from(report.decision.exit_code()))
}

/// List the identity's assignments without changing anything.
pub(crate) fn run_verify(args: &VerifyArgs) -> Result<ExitCode> {
    let settings = load_settings(&args.resources, &args.connection)?;
    let az = connect(&settings)?;
    let report = verify::verify_only(&az, &settings)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("serialize report")?;
        println!("{json}");
    } else {
        print!("{}", report::render_verify_summary(&report));
    }
    Ok(ExitCode::SUCCESS)
}
