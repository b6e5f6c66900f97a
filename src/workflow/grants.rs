//! The fixed grant table.
//!
//! Seven grants, always in this order. Data-plane grants target a path inside
//! the database account; control-plane grants target a fully qualified scope.
use super::context::{database_account_ref, Principal, Scopes};
use crate::config::ResourceNames;
use crate::control_plane::{CallResult, ControlPlane, DataRoleAssignment, RbacRoleAssignment};
use crate::roles::Role;
use crate::scope::Scope;
use serde::{Serialize, Serializer};
use std::fmt;

/// Data-plane path covering the whole database account.
pub(crate) const DATABASE_ROOT_PATH: &str = "/";

/// Sequence states 6 through 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GrantStep {
    UserDataRole,
    ManagedIdentityAccountReader,
    ManagedIdentityDataReader,
    ManagedIdentityDataContributor,
    ManagedIdentityAiUserProjectScope,
    ManagedIdentityAiUserAccountScope,
    ManagedIdentityAiContributorProjectScope,
}

impl GrantStep {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            GrantStep::UserDataRole => "GRANT_USER_DATA_ROLE",
            GrantStep::ManagedIdentityAccountReader => "GRANT_MANAGED_IDENTITY_ACCOUNT_READER",
            GrantStep::ManagedIdentityDataReader => "GRANT_MANAGED_IDENTITY_DATA_READER",
            GrantStep::ManagedIdentityDataContributor => {
                "GRANT_MANAGED_IDENTITY_DATA_CONTRIBUTOR"
            }
            GrantStep::ManagedIdentityAiUserProjectScope => {
                "GRANT_MANAGED_IDENTITY_AI_USER_PROJECT_SCOPE"
            }
            GrantStep::ManagedIdentityAiUserAccountScope => {
                "GRANT_MANAGED_IDENTITY_AI_USER_ACCOUNT_SCOPE"
            }
            GrantStep::ManagedIdentityAiContributorProjectScope => {
                "GRANT_MANAGED_IDENTITY_AI_CONTRIBUTOR_PROJECT_SCOPE"
            }
        }
    }
}

impl Serialize for GrantStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for GrantStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a grant applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub(crate) enum GrantTarget {
    /// Path inside the database account (data plane).
    DatabasePath(&'static str),
    /// Resource-manager scope (control plane).
    Scope(Scope),
}

impl fmt::Display for GrantTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantTarget::DatabasePath(path) => write!(f, "database path {path}"),
            GrantTarget::Scope(scope) => write!(f, "{scope}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Grant {
    pub(crate) step: GrantStep,
    pub(crate) principal: Principal,
    pub(crate) role: Role,
    pub(crate) target: GrantTarget,
}

impl Grant {
    pub(crate) fn description(&self) -> String {
        format!(
            "{} to {} on {}",
            self.role,
            self.principal.label(),
            self.target
        )
    }

    /// Issue the grant for `principal_id`.
    pub(crate) fn issue(
        &self,
        plane: &dyn ControlPlane,
        names: &ResourceNames,
        principal_id: &str,
    ) -> CallResult<()> {
        match &self.target {
            GrantTarget::DatabasePath(path) => {
                plane.create_data_role_assignment(&DataRoleAssignment {
                    account: database_account_ref(names),
                    path: *path,
                    principal_id,
                    role_definition_id: self.role.provider_id(),
                })
            }
            GrantTarget::Scope(scope) => plane.create_role_assignment(&RbacRoleAssignment {
                assignee_object_id: principal_id,
                principal_type: self.principal.principal_type(),
                role_name: self.role.provider_id(),
                scope: scope.as_str(),
            }),
        }
    }
}

/// The seven grants in issue order.
pub(crate) fn planned_grants(scopes: &Scopes) -> Vec<Grant> {
    let database_root = || GrantTarget::DatabasePath(DATABASE_ROOT_PATH);
    vec![
        Grant {
            step: GrantStep::UserDataRole,
            principal: Principal::User,
            role: Role::DataContributor,
            target: database_root(),
        },
        Grant {
            step: GrantStep::ManagedIdentityAccountReader,
            principal: Principal::ManagedIdentity,
            role: Role::AccountReader,
            target: GrantTarget::Scope(scopes.database_account.clone()),
        },
        Grant {
            step: GrantStep::ManagedIdentityDataReader,
            principal: Principal::ManagedIdentity,
            role: Role::DataReader,
            target: database_root(),
        },
        Grant {
            step: GrantStep::ManagedIdentityDataContributor,
            principal: Principal::ManagedIdentity,
            role: Role::DataContributor,
            target: database_root(),
        },
        Grant {
            step: GrantStep::ManagedIdentityAiUserProjectScope,
            principal: Principal::ManagedIdentity,
            role: Role::OpenAiUser,
            target: GrantTarget::Scope(scopes.cognitive_project.clone()),
        },
        Grant {
            step: GrantStep::ManagedIdentityAiUserAccountScope,
            principal: Principal::ManagedIdentity,
            role: Role::OpenAiUser,
            target: GrantTarget::Scope(scopes.cognitive_account.clone()),
        },
        Grant {
            step: GrantStep::ManagedIdentityAiContributorProjectScope,
            principal: Principal::ManagedIdentity,
            role: Role::CognitiveServicesContributor,
            target: GrantTarget::Scope(scopes.cognitive_project.clone()),
        },
    ]
}
