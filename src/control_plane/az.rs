//! [`ControlPlane`] backed by the Azure CLI.
//!
//! Every call is a blocking child process. Non-zero exits are classified from
//! stderr; JSON listings are parsed with serde_json.
use super::classify::classify_failure;
use super::{
    CallFailure, CallResult, ControlPlane, DataRoleAssignment, FailureKind, RbacRoleAssignment,
    ResourceRef,
};
use crate::util::truncate_string;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Resource type of the search service whose identity is managed.
pub const SEARCH_RESOURCE_TYPE: &str = "Microsoft.Search/searchServices";

const MAX_ERROR_BYTES: usize = 4096;
const LOGIN_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Azure CLI invocation (program plus any fixed leading arguments).
#[derive(Debug, Clone)]
pub struct AzCli {
    program: String,
    base_args: Vec<String>,
}

impl AzCli {
    /// Parse a command such as `az` or `az --only-show-errors`.
    pub fn from_command(command: &str) -> Result<Self> {
        let mut args =
            shell_words::split(command).with_context(|| format!("parse az command: {command}"))?;
        if args.is_empty() {
            return Err(anyhow!("az command is empty"));
        }
        let program = args.remove(0);
        Ok(Self {
            program,
            base_args: args,
        })
    }

    /// Locate the CLI on `PATH` before any call is attempted.
    pub fn locate(&self) -> Result<PathBuf> {
        which::which(&self.program).with_context(|| {
            format!(
                "{} not found on PATH (install the Azure CLI or pass --az)",
                self.program
            )
        })
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.base_args);
        command
    }

    fn run(&self, args: &[&str]) -> CallResult<String> {
        tracing::debug!(program = %self.program, ?args, "az invoke");
        let start = Instant::now();
        let output = self
            .command()
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| {
                CallFailure::new(
                    FailureKind::Other,
                    format!("spawn {}: {err}", self.program),
                )
            })?;
        let elapsed_ms = start.elapsed().as_millis();
        let subcommand = args.iter().take(3).copied().collect::<Vec<_>>().join(" ");
        tracing::info!(
            elapsed_ms,
            subcommand = %subcommand,
            success = output.status.success(),
            "az invoke complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let message = if stderr.is_empty() {
                format!("{} exited with status {}", self.program, output.status)
            } else {
                truncate_string(stderr, MAX_ERROR_BYTES)
            };
            return Err(CallFailure::new(classify_failure(stderr), message));
        }

        String::from_utf8(output.stdout).map_err(|err| {
            CallFailure::new(
                FailureKind::Other,
                format!("decode {} stdout as UTF-8: {err}", self.program),
            )
        })
    }

    fn run_tsv(&self, args: &[&str]) -> CallResult<String> {
        self.run(args).map(|stdout| stdout.trim().to_string())
    }

    fn run_json(&self, args: &[&str]) -> CallResult<Value> {
        let stdout = self.run(args)?;
        serde_json::from_str(&stdout).map_err(|err| {
            CallFailure::new(
                FailureKind::Other,
                format!("parse az JSON output: {err}"),
            )
        })
    }
}

impl ControlPlane for AzCli {
    fn current_session(&self) -> CallResult<String> {
        self.run_tsv(&["account", "show", "--query", "user.name", "-o", "tsv"])
    }

    fn login(&self, timeout: Duration) -> CallResult<()> {
        tracing::info!(timeout_secs = timeout.as_secs(), "starting device-code login");
        let mut child = self
            .command()
            .args(["login", "--use-device-code", "--output", "none"])
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| {
                CallFailure::new(
                    FailureKind::Other,
                    format!("spawn {} login: {err}", self.program),
                )
            })?;

        let start = Instant::now();
        loop {
            let status = child.try_wait().map_err(|err| {
                CallFailure::new(FailureKind::Other, format!("check login status: {err}"))
            })?;
            if let Some(status) = status {
                if status.success() {
                    return Ok(());
                }
                return Err(CallFailure::new(
                    FailureKind::Other,
                    format!("login exited with status {status}"),
                ));
            }
            if start.elapsed() > timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CallFailure::new(
                    FailureKind::LoginTimedOut,
                    format!("login did not complete within {}s", timeout.as_secs()),
                ));
            }
            std::thread::sleep(LOGIN_POLL_INTERVAL);
        }
    }

    fn subscription_id(&self) -> CallResult<String> {
        self.run_tsv(&["account", "show", "--query", "id", "-o", "tsv"])
    }

    fn signed_in_user_id(&self) -> CallResult<String> {
        self.run_tsv(&["ad", "signed-in-user", "show", "--query", "id", "-o", "tsv"])
    }

    fn enable_system_identity(&self, search: ResourceRef<'_>) -> CallResult<()> {
        self.run(&[
            "resource",
            "update",
            "--resource-group",
            search.resource_group,
            "--name",
            search.name,
            "--resource-type",
            SEARCH_RESOURCE_TYPE,
            "--set",
            "identity.type=SystemAssigned",
            "--output",
            "none",
        ])
        .map(|_| ())
    }

    fn identity_principal_id(&self, search: ResourceRef<'_>) -> CallResult<String> {
        self.run_tsv(&[
            "resource",
            "show",
            "--resource-group",
            search.resource_group,
            "--name",
            search.name,
            "--resource-type",
            SEARCH_RESOURCE_TYPE,
            "--query",
            "identity.principalId",
            "-o",
            "tsv",
        ])
    }

    fn create_data_role_assignment(&self, request: &DataRoleAssignment<'_>) -> CallResult<()> {
        self.run(&[
            "cosmosdb",
            "sql",
            "role",
            "assignment",
            "create",
            "--account-name",
            request.account.name,
            "--resource-group",
            request.account.resource_group,
            "--scope",
            request.path,
            "--principal-id",
            request.principal_id,
            "--role-definition-id",
            request.role_definition_id,
            "--output",
            "none",
        ])
        .map(|_| ())
    }

    fn create_role_assignment(&self, request: &RbacRoleAssignment<'_>) -> CallResult<()> {
        self.run(&[
            "role",
            "assignment",
            "create",
            "--assignee-object-id",
            request.assignee_object_id,
            "--assignee-principal-type",
            request.principal_type.as_str(),
            "--role",
            request.role_name,
            "--scope",
            request.scope,
            "--output",
            "none",
        ])
        .map(|_| ())
    }

    fn count_data_role_assignments(
        &self,
        account: ResourceRef<'_>,
        principal_id: &str,
    ) -> CallResult<usize> {
        let listing = self.run_json(&[
            "cosmosdb",
            "sql",
            "role",
            "assignment",
            "list",
            "--account-name",
            account.name,
            "--resource-group",
            account.resource_group,
            "-o",
            "json",
        ])?;
        Ok(count_matching(&listing, "principalId", principal_id))
    }

    fn count_role_assignments(&self, assignee: &str, scope: &str) -> CallResult<usize> {
        let listing = self.run_json(&[
            "role",
            "assignment",
            "list",
            "--assignee",
            assignee,
            "--scope",
            scope,
            "-o",
            "json",
        ])?;
        Ok(count_matching(&listing, "principalId", assignee))
    }
}

/// Count array entries whose `field` equals `value` (case-insensitive GUIDs).
fn count_matching(listing: &Value, field: &str, value: &str) -> usize {
    let Some(entries) = listing.as_array() else {
        return 0;
    };
    entries
        .iter()
        .filter(|entry| {
            entry
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|found| found.eq_ignore_ascii_case(value))
        })
        .count()
}
