use crate::config::ResourceNames;
use crate::control_plane::{PrincipalType, ResourceRef};
use crate::resolve::Identifier;
use crate::scope::{ResourceKind, Scope};
use anyhow::Result;
use serde::Serialize;

/// Sub-resource type of a cognitive-services project under its account.
pub(crate) const PROJECT_CHILD_TYPE: &str = "projects";

/// The three scopes targeted by control-plane grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Scopes {
    pub(crate) database_account: Scope,
    pub(crate) cognitive_account: Scope,
    pub(crate) cognitive_project: Scope,
}

impl Scopes {
    pub(crate) fn build(subscription: &Identifier, names: &ResourceNames) -> Result<Self> {
        let database_account = Scope::resource(
            subscription,
            &names.resource_group,
            ResourceKind::DatabaseAccount,
            &names.cosmos_account,
        )?;
        let cognitive_account = Scope::resource(
            subscription,
            &names.resource_group,
            ResourceKind::CognitiveServicesAccount,
            &names.ai_account,
        )?;
        let cognitive_project = cognitive_account.child(PROJECT_CHILD_TYPE, &names.ai_project)?;
        Ok(Self {
            database_account,
            cognitive_account,
            cognitive_project,
        })
    }
}

/// Who receives a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Principal {
    /// The operator running the tool.
    User,
    /// The search service's system-assigned identity.
    ManagedIdentity,
}

impl Principal {
    pub(crate) fn principal_type(self) -> PrincipalType {
        match self {
            Principal::User => PrincipalType::User,
            Principal::ManagedIdentity => PrincipalType::ServicePrincipal,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Principal::User => "user",
            Principal::ManagedIdentity => "search identity",
        }
    }
}

/// Identifiers resolved before any grant is issued. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProvisionContext {
    pub(crate) names: ResourceNames,
    pub(crate) subscription: Identifier,
    pub(crate) user: Identifier,
    pub(crate) managed_identity: Identifier,
    pub(crate) scopes: Scopes,
}

impl ProvisionContext {
    pub(crate) fn principal_id(&self, principal: Principal) -> &Identifier {
        match principal {
            Principal::User => &self.user,
            Principal::ManagedIdentity => &self.managed_identity,
        }
    }
}

pub(crate) fn search_service_ref(names: &ResourceNames) -> ResourceRef<'_> {
    ResourceRef {
        resource_group: &names.resource_group,
        name: &names.search_service,
    }
}

pub(crate) fn database_account_ref(names: &ResourceNames) -> ResourceRef<'_> {
    ResourceRef {
        resource_group: &names.resource_group,
        name: &names.cosmos_account,
    }
}
