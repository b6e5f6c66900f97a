//! CLI argument parsing for the provisioning workflow.
//!
//! Arguments stay optional here; precedence against environment variables and
//! the config file is applied in `config` so missing values can be reported
//! together.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "srbac",
    version,
    about = "Provision managed identity and role assignments for an AI search deployment",
    after_help = "Commands:\n  provision   Enable the search identity and grant all roles\n  verify      Count role assignments held by the search identity\n\nExamples:\n  srbac provision -g rg-search --search-service srch --cosmos-account cosmos --ai-account ai\n  srbac provision --config ./srbac.json --dry-run\n  srbac verify -g rg-search --search-service srch --cosmos-account cosmos --ai-account ai --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

impl RootArgs {
    pub fn verbose(&self) -> bool {
        match &self.command {
            Command::Provision(args) => args.connection.verbose,
            Command::Verify(args) => args.connection.verbose,
        }
    }
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Provision(ProvisionArgs),
    Verify(VerifyArgs),
}

/// Names of the three resources in the fixed topology.
#[derive(Args, Debug, Clone, Default)]
pub struct ResourceArgs {
    /// Resource group containing all three resources
    #[arg(long, short = 'g', value_name = "NAME")]
    pub resource_group: Option<String>,

    /// Search service whose managed identity receives the grants
    #[arg(long, value_name = "NAME")]
    pub search_service: Option<String>,

    /// Database (Cosmos DB) account name
    #[arg(long, value_name = "NAME")]
    pub cosmos_account: Option<String>,

    /// Cognitive-services (AI) account name
    #[arg(long, value_name = "NAME")]
    pub ai_account: Option<String>,

    /// Cognitive-services project name [default: default]
    #[arg(long, value_name = "NAME")]
    pub ai_project: Option<String>,
}

/// How to reach the control plane.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// JSON config file (defaults to <config dir>/srbac/config.json when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Azure CLI command, e.g. "az --only-show-errors"
    #[arg(long, value_name = "CMD")]
    pub az: Option<String>,

    /// Attempts per control-plane call when the session expires [default: 2]
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Seconds to wait for the interactive login [default: 600]
    #[arg(long, value_name = "SECS")]
    pub login_timeout_secs: Option<u64>,

    /// Emit debug logs
    #[arg(long)]
    pub verbose: bool,
}

/// Provision command inputs.
#[derive(Parser, Debug)]
#[command(about = "Enable the search managed identity and grant all roles")]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub resources: ResourceArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Skip the verification pass after granting
    #[arg(long)]
    pub skip_verify: bool,

    /// Resolve identifiers and print planned grants without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Also write the run report as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

/// Verify command inputs.
#[derive(Parser, Debug)]
#[command(about = "Count role assignments held by the search managed identity")]
pub struct VerifyArgs {
    #[command(flatten)]
    pub resources: ResourceArgs,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Emit the verification result as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        RootArgs::command().debug_assert();
    }

    #[test]
    fn parses_provision_flags() {
        let args = RootArgs::try_parse_from([
            "srbac",
            "provision",
            "-g",
            "rg-1",
            "--search-service",
            "srch",
            "--skip-verify",
            "--max-attempts",
            "3",
            "--verbose",
        ])
        .expect("parse");
        assert!(args.verbose());
        let Command::Provision(provision) = args.command else {
            panic!("expected provision");
        };
        assert_eq!(provision.resources.resource_group.as_deref(), Some("rg-1"));
        assert_eq!(provision.resources.search_service.as_deref(), Some("srch"));
        assert!(provision.skip_verify);
        assert!(!provision.dry_run);
        assert_eq!(provision.connection.max_attempts, Some(3));
    }
}
