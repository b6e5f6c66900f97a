//! The provisioning sequence.
//!
//! Strictly linear: authenticate, resolve the subscription and the operator,
//! enable the search identity, resolve it, issue the seven grants, then
//! optionally verify. Resolution failures and the identity update are fatal;
//! grant failures are recorded and the sequence continues.
use super::context::{search_service_ref, Principal, ProvisionContext, Scopes};
use super::grants::planned_grants;
use super::progress::{self, Level};
use super::report::{decide, GrantRecord, ProvisionReport, REPORT_SCHEMA_VERSION};
use super::verify::verify_assignments;
use crate::config::{ResourceNames, Settings};
use crate::control_plane::ControlPlane;
use crate::executor::{Executor, StepOutcome, StepStatus};
use crate::resolve::{self, Identifier};
use crate::session::SessionGuard;
use crate::util::now_epoch_ms;
use anyhow::{anyhow, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ProvisionOptions {
    pub(crate) skip_verify: bool,
    pub(crate) dry_run: bool,
}

const MANAGED_IDENTITY_LABEL: &str = "managed identity principal id";

fn identity_description(names: &ResourceNames) -> String {
    format!(
        "enable system-assigned identity on search service {}",
        names.search_service
    )
}

fn planned(description: String) -> StepOutcome {
    StepOutcome {
        description,
        status: StepStatus::Planned,
        attempts: 0,
        failure_kind: None,
        error: None,
    }
}

/// Run the full sequence against `plane` and return the run report.
///
/// `Err` means a fatal precondition failed and no later step ran. A report
/// with failed grants is still `Ok`; its decision carries the partial result.
pub(crate) fn provision(
    plane: &dyn ControlPlane,
    settings: &Settings,
    options: ProvisionOptions,
) -> Result<ProvisionReport> {
    let names = &settings.names;
    let session = SessionGuard::new(plane, settings.run.login_timeout);

    let session_account = session.ensure_authenticated()?;
    progress::line(Level::Ok, &format!("signed in as {session_account}"));

    let subscription = resolve::resolve("subscription id", || plane.subscription_id())?;
    progress::line(Level::Ok, &format!("subscription {subscription}"));
    let user = resolve::resolve("signed-in user id", || plane.signed_in_user_id())?;
    progress::line(Level::Ok, &format!("user {user}"));
    let scopes = Scopes::build(&subscription, names)?;

    if options.dry_run {
        return plan_only(plane, names, session_account, subscription, user, scopes);
    }

    let executor = Executor::new(plane, &session, settings.run.max_attempts);

    let identity = executor.execute_critical(&identity_description(names), |plane| {
        plane.enable_system_identity(search_service_ref(names))
    })?;
    progress::step("ENABLE_IDENTITY", &identity);

    let managed_identity =
        resolve::resolve_polled(MANAGED_IDENTITY_LABEL, settings.run.identity_poll, || {
            plane.identity_principal_id(search_service_ref(names))
        })?;
    progress::line(Level::Ok, &format!("search identity {managed_identity}"));

    let context = ProvisionContext {
        names: names.clone(),
        subscription,
        user,
        managed_identity,
        scopes,
    };

    let mut grants = Vec::new();
    for grant in planned_grants(&context.scopes) {
        let principal_id = context.principal_id(grant.principal);
        let outcome = executor.execute(&grant.description(), |plane| {
            grant.issue(plane, &context.names, principal_id.as_str())
        });
        progress::step(grant.step.as_str(), &outcome);
        grants.push(GrantRecord::new(grant, Some(principal_id.clone()), outcome));
    }

    let verification = if options.skip_verify {
        tracing::debug!("verification skipped");
        None
    } else {
        Some(verify_assignments(
            &executor,
            &context.names,
            &context.managed_identity,
            &context.scopes.cognitive_account,
        ))
    };

    let decision = decide(false, &grants);
    tracing::info!(
        failed = grants.iter().filter(|g| !g.outcome.status.is_success()).count(),
        decision = ?decision,
        "provisioning finished"
    );

    Ok(ProvisionReport {
        schema_version: REPORT_SCHEMA_VERSION,
        generated_at_epoch_ms: now_epoch_ms()?,
        dry_run: false,
        resources: context.names,
        session_account,
        subscription_id: context.subscription,
        user_id: context.user,
        managed_identity_id: Some(context.managed_identity),
        scopes: context.scopes,
        identity,
        grants,
        verification,
        decision,
    })
}

/// Build the report for `--dry-run`: the identity is read, never enabled, and
/// every grant is listed as planned.
fn plan_only(
    plane: &dyn ControlPlane,
    names: &ResourceNames,
    session_account: String,
    subscription: Identifier,
    user: Identifier,
    scopes: Scopes,
) -> Result<ProvisionReport> {
    // A service without an identity answers with an empty value; any failed
    // lookup means the service itself cannot be read.
    let raw = plane
        .identity_principal_id(search_service_ref(names))
        .map_err(|failure| anyhow!("failed to resolve {MANAGED_IDENTITY_LABEL}: {failure}"))?;
    let managed_identity = Identifier::new(MANAGED_IDENTITY_LABEL, &raw).ok();
    match &managed_identity {
        Some(id) => progress::line(Level::Info, &format!("search identity {id}")),
        None => progress::line(
            Level::Info,
            "search identity not enabled yet; it would be enabled first",
        ),
    }

    let identity = planned(identity_description(names));
    progress::step("ENABLE_IDENTITY", &identity);

    let grants: Vec<GrantRecord> = planned_grants(&scopes)
        .into_iter()
        .map(|grant| {
            let principal_id = match grant.principal {
                Principal::User => Some(user.clone()),
                Principal::ManagedIdentity => managed_identity.clone(),
            };
            let outcome = planned(format!("grant {}", grant.description()));
            progress::step(grant.step.as_str(), &outcome);
            GrantRecord::new(grant, principal_id, outcome)
        })
        .collect();

    Ok(ProvisionReport {
        schema_version: REPORT_SCHEMA_VERSION,
        generated_at_epoch_ms: now_epoch_ms()?,
        dry_run: true,
        resources: names.clone(),
        session_account,
        subscription_id: subscription,
        user_id: user,
        managed_identity_id: managed_identity,
        scopes,
        identity,
        decision: decide(true, &grants),
        grants,
        verification: None,
    })
}
