//! Read-only check of the assignments a provision run should have created.
use super::context::{database_account_ref, search_service_ref, Scopes};
use super::progress::{self, Level};
use super::report::{VerificationSummary, VerifyReport, REPORT_SCHEMA_VERSION};
use crate::config::{ResourceNames, Settings};
use crate::control_plane::ControlPlane;
use crate::executor::Executor;
use crate::resolve::{self, Identifier};
use crate::scope::Scope;
use crate::session::SessionGuard;
use crate::util::now_epoch_ms;
use anyhow::Result;

/// Count database role assignments and account-scope assignments held by the
/// managed identity. Issues exactly two listing calls; failures and zero
/// counts are reported, never fatal.
pub(crate) fn verify_assignments(
    executor: &Executor<'_>,
    names: &ResourceNames,
    managed_identity: &Identifier,
    account_scope: &Scope,
) -> VerificationSummary {
    let mut errors = Vec::new();

    let (_, database) = executor.call("list database role assignments", |plane| {
        plane.count_data_role_assignments(database_account_ref(names), managed_identity.as_str())
    });
    let database_assignments = match database {
        Ok(count) => Some(count),
        Err(failure) => {
            progress::line(
                Level::Warn,
                &format!("could not list database role assignments: {failure}"),
            );
            errors.push(format!("database role assignments: {failure}"));
            None
        }
    };

    let (_, account) = executor.call("list account-scope role assignments", |plane| {
        plane.count_role_assignments(managed_identity.as_str(), account_scope.as_str())
    });
    let account_assignments = match account {
        Ok(count) => Some(count),
        Err(failure) => {
            progress::line(
                Level::Warn,
                &format!("could not list role assignments at {account_scope}: {failure}"),
            );
            errors.push(format!("account-scope role assignments: {failure}"));
            None
        }
    };

    for (what, count) in [
        ("database role assignments", database_assignments),
        ("account-scope role assignments", account_assignments),
    ] {
        match count {
            Some(0) => progress::line(
                Level::Info,
                &format!("no {what} found for {managed_identity}"),
            ),
            Some(n) => progress::line(Level::Ok, &format!("{n} {what} for {managed_identity}")),
            None => {}
        }
    }

    VerificationSummary {
        database_assignments,
        account_scope: account_scope.clone(),
        account_assignments,
        errors,
    }
}

/// Audit an earlier run: authenticate, resolve the subscription and the
/// existing identity, then list assignments. Nothing is modified.
pub(crate) fn verify_only(plane: &dyn ControlPlane, settings: &Settings) -> Result<VerifyReport> {
    let names = &settings.names;
    let session = SessionGuard::new(plane, settings.run.login_timeout);
    session.ensure_authenticated()?;

    let subscription = resolve::resolve("subscription id", || plane.subscription_id())?;
    let managed_identity = resolve::resolve("managed identity principal id", || {
        plane.identity_principal_id(search_service_ref(names))
    })?;
    let scopes = Scopes::build(&subscription, names)?;

    let executor = Executor::new(plane, &session, settings.run.max_attempts);
    let verification = verify_assignments(
        &executor,
        names,
        &managed_identity,
        &scopes.cognitive_account,
    );

    Ok(VerifyReport {
        schema_version: REPORT_SCHEMA_VERSION,
        generated_at_epoch_ms: now_epoch_ms()?,
        resources: names.clone(),
        subscription_id: subscription,
        managed_identity_id: managed_identity,
        verification,
    })
}
