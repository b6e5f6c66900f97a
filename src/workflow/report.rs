//! Run reports and the final text summary.
//!
//! One report value backs the text summary as well as `--json` and `--report`.
use super::context::{Principal, Scopes};
use super::grants::{Grant, GrantStep, GrantTarget};
use crate::config::ResourceNames;
use crate::executor::{StepOutcome, StepStatus};
use crate::resolve::Identifier;
use crate::roles::{Role, RolePlane};
use crate::scope::Scope;
use serde::Serialize;
use std::fmt::Write as _;

/// Current schema version for provision and verify reports.
pub(crate) const REPORT_SCHEMA_VERSION: u32 = 1;

/// Overall result of a provision run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Decision {
    /// Every grant succeeded or already existed.
    Complete,
    /// The sequence finished but at least one grant failed.
    Partial,
    /// Dry run; nothing was changed.
    Planned,
}

impl Decision {
    pub(crate) fn exit_code(self) -> u8 {
        match self {
            Decision::Complete | Decision::Planned => 0,
            Decision::Partial => 2,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Decision::Complete => "complete",
            Decision::Partial => "partial",
            Decision::Planned => "planned",
        }
    }
}

/// One grant and what happened to it.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct GrantRecord {
    pub(crate) step: GrantStep,
    pub(crate) principal: Principal,
    pub(crate) principal_id: Option<Identifier>,
    pub(crate) role: Role,
    pub(crate) role_id: &'static str,
    pub(crate) plane: RolePlane,
    pub(crate) target: GrantTarget,
    pub(crate) outcome: StepOutcome,
}

impl GrantRecord {
    pub(crate) fn new(grant: Grant, principal_id: Option<Identifier>, outcome: StepOutcome) -> Self {
        Self {
            step: grant.step,
            principal: grant.principal,
            principal_id,
            role: grant.role,
            role_id: grant.role.provider_id(),
            plane: grant.role.plane(),
            target: grant.target,
            outcome,
        }
    }
}

/// Observed assignment counts; `None` when the listing call failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct VerificationSummary {
    pub(crate) database_assignments: Option<usize>,
    pub(crate) account_scope: Scope,
    pub(crate) account_assignments: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ProvisionReport {
    pub(crate) schema_version: u32,
    pub(crate) generated_at_epoch_ms: u128,
    pub(crate) dry_run: bool,
    pub(crate) resources: ResourceNames,
    pub(crate) session_account: String,
    pub(crate) subscription_id: Identifier,
    pub(crate) user_id: Identifier,
    pub(crate) managed_identity_id: Option<Identifier>,
    pub(crate) scopes: Scopes,
    pub(crate) identity: StepOutcome,
    pub(crate) grants: Vec<GrantRecord>,
    pub(crate) verification: Option<VerificationSummary>,
    pub(crate) decision: Decision,
}

impl ProvisionReport {
    pub(crate) fn failed_grants(&self) -> impl Iterator<Item = &GrantRecord> {
        self.grants
            .iter()
            .filter(|record| record.outcome.status == StepStatus::Failed)
    }
}

/// Decide the overall result from the grant outcomes.
pub(crate) fn decide(dry_run: bool, grants: &[GrantRecord]) -> Decision {
    if dry_run {
        Decision::Planned
    } else if grants.iter().all(|record| record.outcome.status.is_success()) {
        Decision::Complete
    } else {
        Decision::Partial
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct VerifyReport {
    pub(crate) schema_version: u32,
    pub(crate) generated_at_epoch_ms: u128,
    pub(crate) resources: ResourceNames,
    pub(crate) subscription_id: Identifier,
    pub(crate) managed_identity_id: Identifier,
    pub(crate) verification: VerificationSummary,
}

fn count_text(count: Option<usize>) -> String {
    count.map_or_else(|| "unavailable".to_string(), |n| n.to_string())
}

fn render_verification(out: &mut String, verification: &VerificationSummary) {
    let _ = writeln!(out, "Verification:");
    let _ = writeln!(
        out,
        "  database role assignments:  {}",
        count_text(verification.database_assignments)
    );
    let _ = writeln!(
        out,
        "  account-scope assignments:  {}",
        count_text(verification.account_assignments)
    );
}

/// Render the human-readable summary printed at the end of a provision run.
pub(crate) fn render_summary(report: &ProvisionReport) -> String {
    let mut out = String::new();
    let title = if report.dry_run {
        "Provisioning plan (dry run)"
    } else {
        "Provisioning summary"
    };
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "  subscription:      {}", report.subscription_id);
    let _ = writeln!(out, "  resource group:    {}", report.resources.resource_group);
    let _ = writeln!(out, "  search service:    {}", report.resources.search_service);
    let _ = writeln!(out, "  user:              {}", report.user_id);
    let identity = report
        .managed_identity_id
        .as_ref()
        .map_or("<pending>", Identifier::as_str);
    let _ = writeln!(out, "  search identity:   {identity}");
    let _ = writeln!(out, "  database scope:    {}", report.scopes.database_account);
    let _ = writeln!(out, "  ai account scope:  {}", report.scopes.cognitive_account);
    let _ = writeln!(out, "  ai project scope:  {}", report.scopes.cognitive_project);

    let _ = writeln!(out, "Grants:");
    for record in &report.grants {
        let _ = writeln!(
            out,
            "  [{:<7}] {} ({})",
            record.outcome.status.label(),
            record.outcome.description,
            record.step
        );
    }

    if let Some(verification) = &report.verification {
        render_verification(&mut out, verification);
    }

    let failed = report.failed_grants().count();
    match report.decision {
        Decision::Complete => {
            let _ = writeln!(out, "Result: {} (all grants in place)", report.decision.as_str());
        }
        Decision::Partial => {
            let _ = writeln!(
                out,
                "Result: {} ({failed} of {} grants failed)",
                report.decision.as_str(),
                report.grants.len()
            );
        }
        Decision::Planned => {
            let _ = writeln!(out, "Result: {} (no changes made)", report.decision.as_str());
        }
    }
    out
}

/// Render the summary printed by `verify`.
pub(crate) fn render_verify_summary(report: &VerifyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Search identity {}", report.managed_identity_id);
    render_verification(&mut out, &report.verification);
    out
}
