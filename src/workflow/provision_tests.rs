use super::grants::GrantStep;
use super::provision::{provision, ProvisionOptions};
use super::report::Decision;
use super::verify::verify_only;
use crate::config::{ResourceNames, RunSettings, Settings};
use crate::control_plane::fake::{Call, FakeControlPlane, Op};
use crate::control_plane::FailureKind;
use crate::executor::StepStatus;
use crate::resolve::PollPolicy;
use std::time::Duration;

const DB_SCOPE: &str =
    "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.DocumentDB/databaseAccounts/db-1";
const AI_ACCOUNT_SCOPE: &str =
    "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.CognitiveServices/accounts/acct-1";
const AI_PROJECT_SCOPE: &str = "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.CognitiveServices/accounts/acct-1/projects/proj-1";

fn settings(max_attempts: u32) -> Settings {
    Settings {
        names: ResourceNames::new("rg-1", "srch", "db-1", "acct-1", "proj-1").expect("names"),
        run: RunSettings {
            az_command: "az".to_string(),
            max_attempts,
            login_timeout: Duration::from_secs(1),
            identity_poll: PollPolicy {
                attempts: 3,
                interval: Duration::ZERO,
            },
        },
    }
}

fn full_run() -> ProvisionOptions {
    ProvisionOptions::default()
}

fn grant_calls(plane: &FakeControlPlane) -> Vec<Call> {
    plane.calls().into_iter().filter(Call::is_grant).collect()
}

fn data_grant(principal_id: &str, role_definition_id: &str) -> Call {
    Call::CreateDataRoleAssignment {
        account: "db-1".to_string(),
        path: "/".to_string(),
        principal_id: principal_id.to_string(),
        role_definition_id: role_definition_id.to_string(),
    }
}

fn rbac_grant(role_name: &str, scope: &str) -> Call {
    Call::CreateRoleAssignment {
        assignee: "mi-1".to_string(),
        principal_type: "ServicePrincipal".to_string(),
        role_name: role_name.to_string(),
        scope: scope.to_string(),
    }
}

#[test]
fn unauthenticated_session_logs_in_once_before_subscription_lookup() {
    let plane = FakeControlPlane::default();
    plane.fail(Op::CurrentSession, FailureKind::AuthExpired, "Please run 'az login'");

    provision(&plane, &settings(2), full_run()).expect("provision");

    let calls = plane.calls();
    assert_eq!(plane.count(&Call::Login), 1);
    let login = calls.iter().position(|c| *c == Call::Login).expect("login");
    let subscription = calls
        .iter()
        .position(|c| *c == Call::SubscriptionId)
        .expect("subscription");
    assert!(login < subscription, "{calls:?}");
}

#[test]
fn managed_identity_id_is_trimmed_mock_value() {
    let plane = FakeControlPlane::default().with_principal_ids(&["  mi-1 \n"]);

    let report = provision(&plane, &settings(2), full_run()).expect("provision");

    let identity = report.managed_identity_id.expect("identity");
    assert_eq!(identity.as_str(), "mi-1");
    assert_eq!(report.user_id.as_str(), "user-1");
    assert_eq!(report.subscription_id.as_str(), "sub-1");
}

#[test]
fn issues_seven_grants_in_fixed_order() {
    let plane = FakeControlPlane::default();

    let report = provision(&plane, &settings(2), full_run()).expect("provision");

    assert_eq!(
        grant_calls(&plane),
        vec![
            data_grant("user-1", "00000000-0000-0000-0000-000000000002"),
            rbac_grant("Cosmos DB Account Reader Role", DB_SCOPE),
            data_grant("mi-1", "00000000-0000-0000-0000-000000000001"),
            data_grant("mi-1", "00000000-0000-0000-0000-000000000002"),
            rbac_grant("Cognitive Services OpenAI User", AI_PROJECT_SCOPE),
            rbac_grant("Cognitive Services OpenAI User", AI_ACCOUNT_SCOPE),
            rbac_grant("Cognitive Services Contributor", AI_PROJECT_SCOPE),
        ]
    );
    assert_eq!(report.grants.len(), 7);
    assert_eq!(report.decision, Decision::Complete);
    assert_eq!(report.decision.exit_code(), 0);
    assert_eq!(report.scopes.database_account.as_str(), DB_SCOPE);
    assert_eq!(report.scopes.cognitive_account.as_str(), AI_ACCOUNT_SCOPE);
    assert_eq!(report.scopes.cognitive_project.as_str(), AI_PROJECT_SCOPE);
}

#[test]
fn identity_is_enabled_before_it_is_resolved() {
    let plane = FakeControlPlane::default();

    provision(&plane, &settings(2), full_run()).expect("provision");

    let calls = plane.calls();
    let enable = calls
        .iter()
        .position(|c| matches!(c, Call::EnableSystemIdentity { .. }))
        .expect("enable");
    let read = calls
        .iter()
        .position(|c| *c == Call::IdentityPrincipalId)
        .expect("read");
    assert!(enable < read, "{calls:?}");
    assert_eq!(
        calls[enable],
        Call::EnableSystemIdentity {
            resource_group: "rg-1".to_string(),
            name: "srch".to_string(),
        }
    );
}

#[test]
fn auth_failure_on_one_grant_refreshes_and_retries_only_that_grant() {
    let plane = FakeControlPlane::default();
    plane.fail(
        Op::CreateRoleAssignment,
        FailureKind::AuthExpired,
        "AADSTS700082: The refresh token has expired",
    );

    let report = provision(&plane, &settings(2), full_run()).expect("provision");

    assert_eq!(plane.count(&Call::Login), 1);
    assert_eq!(plane.count(&Call::SubscriptionId), 1);
    assert_eq!(plane.count(&Call::SignedInUserId), 1);
    assert_eq!(plane.count(&Call::CurrentSession), 1);
    let reader = rbac_grant("Cosmos DB Account Reader Role", DB_SCOPE);
    assert_eq!(plane.count(&reader), 2);
    assert_eq!(grant_calls(&plane).len(), 8);

    let calls = plane.calls();
    let first = calls.iter().position(|c| *c == reader).expect("grant");
    assert_eq!(calls[first + 1], Call::Login);
    assert_eq!(calls[first + 2], reader);

    assert_eq!(report.grants[1].outcome.attempts, 2);
    assert_eq!(report.decision, Decision::Complete);
}

#[test]
fn skip_verify_issues_no_listing_calls() {
    let plane = FakeControlPlane::default();
    let options = ProvisionOptions {
        skip_verify: true,
        dry_run: false,
    };

    let report = provision(&plane, &settings(2), options).expect("provision");

    assert!(plane.calls().iter().all(|c| !c.is_listing()));
    assert!(report.verification.is_none());
}

#[test]
fn verification_issues_exactly_two_listing_calls() {
    let plane = FakeControlPlane::default();

    let report = provision(&plane, &settings(2), full_run()).expect("provision");

    let listings: Vec<Call> = plane
        .calls()
        .into_iter()
        .filter(Call::is_listing)
        .collect();
    assert_eq!(
        listings,
        vec![
            Call::CountDataRoleAssignments {
                principal_id: "mi-1".to_string(),
            },
            Call::CountRoleAssignments {
                assignee: "mi-1".to_string(),
                scope: AI_ACCOUNT_SCOPE.to_string(),
            },
        ]
    );
    let verification = report.verification.expect("verification");
    assert_eq!(verification.database_assignments, Some(3));
    assert_eq!(verification.account_assignments, Some(1));
}

#[test]
fn zero_counts_and_listing_failures_do_not_change_the_decision() {
    let mut plane = FakeControlPlane::default();
    plane.data_assignment_count = 0;
    plane.fail(Op::CountRoleAssignments, FailureKind::Other, "listing failed");

    let report = provision(&plane, &settings(2), full_run()).expect("provision");

    let verification = report.verification.as_ref().expect("verification");
    assert_eq!(verification.database_assignments, Some(0));
    assert_eq!(verification.account_assignments, None);
    assert_eq!(verification.errors.len(), 1);
    assert_eq!(report.decision, Decision::Complete);
}

#[test]
fn failed_grant_is_recorded_and_sequence_continues() {
    let plane = FakeControlPlane::default();
    plane.fail(
        Op::CreateDataRoleAssignment,
        FailureKind::PermissionDenied,
        "AuthorizationFailed",
    );

    let report = provision(&plane, &settings(2), full_run()).expect("provision");

    assert_eq!(grant_calls(&plane).len(), 7);
    assert_eq!(report.decision, Decision::Partial);
    assert_eq!(report.decision.exit_code(), 2);
    let failed: Vec<GrantStep> = report.failed_grants().map(|g| g.step).collect();
    assert_eq!(failed, vec![GrantStep::UserDataRole]);
    assert_eq!(
        report.grants[0].outcome.failure_kind,
        Some(FailureKind::PermissionDenied)
    );
    assert_eq!(plane.count(&Call::Login), 0);
}

#[test]
fn existing_assignment_counts_as_success() {
    let plane = FakeControlPlane::default();
    plane.fail(
        Op::CreateRoleAssignment,
        FailureKind::Conflict,
        "The role assignment already exists.",
    );

    let report = provision(&plane, &settings(2), full_run()).expect("provision");

    assert_eq!(report.grants[1].outcome.status, StepStatus::AlreadyExists);
    assert_eq!(report.decision, Decision::Complete);
}

#[test]
fn identity_principal_is_polled_until_available() {
    let plane = FakeControlPlane::default().with_principal_ids(&["", "", "mi-9"]);

    let report = provision(&plane, &settings(2), full_run()).expect("provision");

    assert_eq!(plane.count(&Call::IdentityPrincipalId), 3);
    assert_eq!(
        report.managed_identity_id.map(|id| id.as_str().to_string()),
        Some("mi-9".to_string())
    );
}

#[test]
fn identity_that_never_appears_is_fatal() {
    let plane = FakeControlPlane::default().with_principal_ids(&[""]);

    let err = provision(&plane, &settings(2), full_run()).unwrap_err();

    assert!(
        err.to_string().contains("managed identity principal id"),
        "{err}"
    );
    assert_eq!(plane.count(&Call::IdentityPrincipalId), 3);
    assert!(grant_calls(&plane).is_empty());
}

#[test]
fn failed_identity_update_stops_the_sequence() {
    let plane = FakeControlPlane::default();
    plane.fail(
        Op::EnableSystemIdentity,
        FailureKind::PermissionDenied,
        "AuthorizationFailed",
    );

    assert!(provision(&plane, &settings(2), full_run()).is_err());
    assert_eq!(plane.count(&Call::IdentityPrincipalId), 0);
    assert!(grant_calls(&plane).is_empty());
}

#[test]
fn empty_subscription_is_fatal_before_any_mutation() {
    let mut plane = FakeControlPlane::default();
    plane.subscription = " \n".to_string();

    let err = provision(&plane, &settings(2), full_run()).unwrap_err();

    assert!(err.to_string().contains("subscription id"), "{err}");
    assert_eq!(plane.count(&Call::SignedInUserId), 0);
    assert!(plane
        .calls()
        .iter()
        .all(|c| !c.is_grant() && !matches!(c, Call::EnableSystemIdentity { .. })));
}

#[test]
fn login_timeout_is_fatal() {
    let plane = FakeControlPlane::default();
    plane.fail(Op::CurrentSession, FailureKind::AuthExpired, "expired");
    plane.fail(Op::Login, FailureKind::LoginTimedOut, "no response within 1s");

    let err = provision(&plane, &settings(2), full_run()).unwrap_err();

    assert!(err.to_string().contains("timed out"), "{err}");
    assert_eq!(plane.count(&Call::SubscriptionId), 0);
}

#[test]
fn dry_run_issues_no_mutating_calls() {
    let plane = FakeControlPlane::default();
    let options = ProvisionOptions {
        skip_verify: false,
        dry_run: true,
    };

    let report = provision(&plane, &settings(2), options).expect("provision");

    assert!(plane.calls().iter().all(|c| {
        !c.is_grant() && !c.is_listing() && !matches!(c, Call::EnableSystemIdentity { .. })
    }));
    assert_eq!(report.decision, Decision::Planned);
    assert_eq!(report.grants.len(), 7);
    assert!(report
        .grants
        .iter()
        .all(|g| g.outcome.status == StepStatus::Planned));
    assert_eq!(report.identity.status, StepStatus::Planned);
}

#[test]
fn dry_run_without_identity_leaves_principal_pending() {
    let plane = FakeControlPlane::default().with_principal_ids(&[""]);
    let options = ProvisionOptions {
        skip_verify: false,
        dry_run: true,
    };

    let report = provision(&plane, &settings(2), options).expect("provision");

    assert!(report.managed_identity_id.is_none());
    assert_eq!(plane.count(&Call::IdentityPrincipalId), 1);
    assert!(report.grants[0].principal_id.is_some());
    assert!(report.grants[1..].iter().all(|g| g.principal_id.is_none()));
}

#[test]
fn dry_run_fails_when_the_search_service_cannot_be_read() {
    for kind in [FailureKind::NotFound, FailureKind::PermissionDenied] {
        let plane = FakeControlPlane::default();
        plane.fail(
            Op::IdentityPrincipalId,
            kind,
            "(ResourceNotFound) search service srch was not found",
        );
        let options = ProvisionOptions {
            skip_verify: false,
            dry_run: true,
        };

        let err = provision(&plane, &settings(2), options).unwrap_err();

        assert!(
            err.to_string().contains("managed identity principal id"),
            "{kind}: {err}"
        );
        assert!(plane.calls().iter().all(|c| !c.is_grant()));
    }
}

#[test]
fn dry_run_planned_steps_carry_their_verb() {
    let plane = FakeControlPlane::default();
    let options = ProvisionOptions {
        skip_verify: false,
        dry_run: true,
    };

    let report = provision(&plane, &settings(2), options).expect("provision");

    assert!(report.identity.description.starts_with("enable "));
    assert!(report
        .grants
        .iter()
        .all(|g| g.outcome.description.starts_with("grant ")));
}

#[test]
fn verify_only_reads_without_updating_the_identity() {
    let plane = FakeControlPlane::default();

    let report = verify_only(&plane, &settings(2)).expect("verify");

    let calls = plane.calls();
    assert!(calls
        .iter()
        .all(|c| !c.is_grant() && !matches!(c, Call::EnableSystemIdentity { .. })));
    assert_eq!(calls.iter().filter(|c| c.is_listing()).count(), 2);
    assert_eq!(report.managed_identity_id.as_str(), "mi-1");
    assert_eq!(report.verification.database_assignments, Some(3));
}

#[test]
fn report_serializes_step_names_and_decision() {
    let plane = FakeControlPlane::default();

    let report = provision(&plane, &settings(2), full_run()).expect("provision");
    let json = serde_json::to_value(&report).expect("json");

    assert_eq!(json["schema_version"], 1);
    assert_eq!(json["decision"], "complete");
    assert_eq!(json["grants"][0]["step"], "GRANT_USER_DATA_ROLE");
    assert_eq!(json["grants"][0]["role_id"], "00000000-0000-0000-0000-000000000002");
    assert_eq!(json["grants"][0]["plane"], "data");
    assert_eq!(json["grants"][1]["target"]["value"], DB_SCOPE);
    assert_eq!(json["managed_identity_id"], "mi-1");
}
