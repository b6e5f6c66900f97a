//! Symbolic roles granted by the provisioning sequence.
//!
//! The provider identifies data-plane roles by a role-definition GUID scoped to
//! the database account and control-plane roles by their built-in role name.
//! Keeping both behind one enum lets the grant table read as intent.
use serde::Serialize;
use std::fmt;

/// Built-in database role definition: read items and metadata.
pub const DATA_READER_DEFINITION_ID: &str = "00000000-0000-0000-0000-000000000001";
/// Built-in database role definition: read and write items.
pub const DATA_CONTRIBUTOR_DEFINITION_ID: &str = "00000000-0000-0000-0000-000000000002";

/// Which authorization system a role belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RolePlane {
    /// Database-native role assignment, addressed by definition id.
    Data,
    /// Resource-manager RBAC assignment, addressed by role name.
    Control,
}

/// Roles used by the fixed grant topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    DataReader,
    DataContributor,
    AccountReader,
    #[serde(rename = "OpenAIUser")]
    OpenAiUser,
    CognitiveServicesContributor,
}

impl Role {
    pub fn plane(self) -> RolePlane {
        match self {
            Role::DataReader | Role::DataContributor => RolePlane::Data,
            Role::AccountReader | Role::OpenAiUser | Role::CognitiveServicesContributor => {
                RolePlane::Control
            }
        }
    }

    /// Identifier the provider expects: a definition GUID for data-plane roles,
    /// a built-in role name for control-plane roles.
    pub fn provider_id(self) -> &'static str {
        match self {
            Role::DataReader => DATA_READER_DEFINITION_ID,
            Role::DataContributor => DATA_CONTRIBUTOR_DEFINITION_ID,
            Role::AccountReader => "Cosmos DB Account Reader Role",
            Role::OpenAiUser => "Cognitive Services OpenAI User",
            Role::CognitiveServicesContributor => "Cognitive Services Contributor",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::DataReader => "DataReader",
            Role::DataContributor => "DataContributor",
            Role::AccountReader => "AccountReader",
            Role::OpenAiUser => "OpenAIUser",
            Role::CognitiveServicesContributor => "CognitiveServicesContributor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
