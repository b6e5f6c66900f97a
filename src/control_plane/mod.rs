//! Control-plane collaborator abstraction.
//!
//! The provisioning workflow talks to the cloud provider only through the
//! [`ControlPlane`] trait. Failures come back already classified so retry policy
//! never has to look at error text; signature matching lives in [`classify`].
mod az;
pub(crate) mod classify;
#[cfg(test)]
pub(crate) mod fake;

pub use az::AzCli;

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Result of a single control-plane call.
pub type CallResult<T> = Result<T, CallFailure>;

/// Classification of a failed control-plane call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No session, an expired token, or a transient auth timeout.
    AuthExpired,
    PermissionDenied,
    /// The object already exists (e.g. a duplicate role assignment).
    Conflict,
    NotFound,
    /// The interactive login did not finish before the configured deadline.
    LoginTimedOut,
    Other,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::AuthExpired => "auth_expired",
            FailureKind::PermissionDenied => "permission_denied",
            FailureKind::Conflict => "conflict",
            FailureKind::NotFound => "not_found",
            FailureKind::LoginTimedOut => "login_timed_out",
            FailureKind::Other => "other",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed call: its classification plus the provider's raw message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl CallFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CallFailure {}

/// How the assignee of a control-plane grant is registered in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrincipalType {
    User,
    ServicePrincipal,
}

impl PrincipalType {
    pub fn as_str(self) -> &'static str {
        match self {
            PrincipalType::User => "User",
            PrincipalType::ServicePrincipal => "ServicePrincipal",
        }
    }
}

/// A resource addressed by resource group and name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRef<'a> {
    pub resource_group: &'a str,
    pub name: &'a str,
}

/// Data-plane role assignment inside a database account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRoleAssignment<'a> {
    pub account: ResourceRef<'a>,
    /// Path inside the account; `/` covers the whole account.
    pub path: &'a str,
    pub principal_id: &'a str,
    pub role_definition_id: &'a str,
}

/// Resource-manager role assignment at a fully qualified scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RbacRoleAssignment<'a> {
    pub assignee_object_id: &'a str,
    pub principal_type: PrincipalType,
    pub role_name: &'a str,
    pub scope: &'a str,
}

/// Fixed sub-command contract the provisioning workflow depends on.
pub trait ControlPlane {
    /// Identify the active session; `AuthExpired` when there is none.
    fn current_session(&self) -> CallResult<String>;

    /// Run the interactive device-code login, bounded by `timeout`.
    fn login(&self, timeout: Duration) -> CallResult<()>;

    fn subscription_id(&self) -> CallResult<String>;

    fn signed_in_user_id(&self) -> CallResult<String>;

    /// Set the search service identity type to system-assigned.
    fn enable_system_identity(&self, search: ResourceRef<'_>) -> CallResult<()>;

    /// Read the principal id of the search service's managed identity.
    fn identity_principal_id(&self, search: ResourceRef<'_>) -> CallResult<String>;

    fn create_data_role_assignment(&self, request: &DataRoleAssignment<'_>) -> CallResult<()>;

    fn create_role_assignment(&self, request: &RbacRoleAssignment<'_>) -> CallResult<()>;

    /// Count database role assignments held by `principal_id`.
    fn count_data_role_assignments(
        &self,
        account: ResourceRef<'_>,
        principal_id: &str,
    ) -> CallResult<usize>;

    /// Count resource-manager role assignments held by `assignee` at `scope`.
    fn count_role_assignments(&self, assignee: &str, scope: &str) -> CallResult<usize>;
}
