//! Scripted in-memory control plane for orchestration tests.
use super::{
    CallFailure, CallResult, ControlPlane, DataRoleAssignment, FailureKind, RbacRoleAssignment,
    ResourceRef,
};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// One recorded control-plane call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CurrentSession,
    Login,
    SubscriptionId,
    SignedInUserId,
    EnableSystemIdentity {
        resource_group: String,
        name: String,
    },
    IdentityPrincipalId,
    CreateDataRoleAssignment {
        account: String,
        path: String,
        principal_id: String,
        role_definition_id: String,
    },
    CreateRoleAssignment {
        assignee: String,
        principal_type: String,
        role_name: String,
        scope: String,
    },
    CountDataRoleAssignments {
        principal_id: String,
    },
    CountRoleAssignments {
        assignee: String,
        scope: String,
    },
}

impl Call {
    pub fn is_grant(&self) -> bool {
        matches!(
            self,
            Call::CreateDataRoleAssignment { .. } | Call::CreateRoleAssignment { .. }
        )
    }

    pub fn is_listing(&self) -> bool {
        matches!(
            self,
            Call::CountDataRoleAssignments { .. } | Call::CountRoleAssignments { .. }
        )
    }
}

/// Operation keys used to script failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Op {
    CurrentSession,
    Login,
    SubscriptionId,
    SignedInUserId,
    EnableSystemIdentity,
    IdentityPrincipalId,
    CreateDataRoleAssignment,
    CreateRoleAssignment,
    CountDataRoleAssignments,
    CountRoleAssignments,
}

/// Fake whose calls succeed with fixed values unless a failure is scripted.
///
/// Scripted failures for an operation are consumed in order, one per call.
pub struct FakeControlPlane {
    pub session: String,
    pub subscription: String,
    pub user: String,
    /// Successive values returned by `identity_principal_id`; the last repeats.
    pub principal_ids: RefCell<VecDeque<String>>,
    pub data_assignment_count: usize,
    pub rbac_assignment_count: usize,
    failures: RefCell<BTreeMap<Op, VecDeque<CallFailure>>>,
    calls: RefCell<Vec<Call>>,
}

impl Default for FakeControlPlane {
    fn default() -> Self {
        Self {
            session: "operator@example.com".to_string(),
            subscription: "sub-1".to_string(),
            user: "user-1".to_string(),
            principal_ids: RefCell::new(VecDeque::from(["mi-1".to_string()])),
            data_assignment_count: 3,
            rbac_assignment_count: 1,
            failures: RefCell::new(BTreeMap::new()),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl FakeControlPlane {
    pub fn fail(&self, op: Op, kind: FailureKind, message: &str) {
        self.failures
            .borrow_mut()
            .entry(op)
            .or_default()
            .push_back(CallFailure::new(kind, message));
    }

    pub fn with_principal_ids(self, ids: &[&str]) -> Self {
        *self.principal_ids.borrow_mut() = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.borrow().iter().filter(|c| *c == call).count()
    }

    fn record(&self, op: Op, call: Call) -> CallResult<()> {
        self.calls.borrow_mut().push(call);
        match self
            .failures
            .borrow_mut()
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
        {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

impl ControlPlane for FakeControlPlane {
    fn current_session(&self) -> CallResult<String> {
        self.record(Op::CurrentSession, Call::CurrentSession)?;
        Ok(self.session.clone())
    }

    fn login(&self, _timeout: Duration) -> CallResult<()> {
        self.record(Op::Login, Call::Login)
    }

    fn subscription_id(&self) -> CallResult<String> {
        self.record(Op::SubscriptionId, Call::SubscriptionId)?;
        Ok(self.subscription.clone())
    }

    fn signed_in_user_id(&self) -> CallResult<String> {
        self.record(Op::SignedInUserId, Call::SignedInUserId)?;
        Ok(self.user.clone())
    }

    fn enable_system_identity(&self, search: ResourceRef<'_>) -> CallResult<()> {
        self.record(
            Op::EnableSystemIdentity,
            Call::EnableSystemIdentity {
                resource_group: search.resource_group.to_string(),
                name: search.name.to_string(),
            },
        )
    }

    fn identity_principal_id(&self, _search: ResourceRef<'_>) -> CallResult<String> {
        self.record(Op::IdentityPrincipalId, Call::IdentityPrincipalId)?;
        let mut ids = self.principal_ids.borrow_mut();
        if ids.len() > 1 {
            Ok(ids.pop_front().unwrap_or_default())
        } else {
            Ok(ids.front().cloned().unwrap_or_default())
        }
    }

    fn create_data_role_assignment(&self, request: &DataRoleAssignment<'_>) -> CallResult<()> {
        self.record(
            Op::CreateDataRoleAssignment,
            Call::CreateDataRoleAssignment {
                account: request.account.name.to_string(),
                path: request.path.to_string(),
                principal_id: request.principal_id.to_string(),
                role_definition_id: request.role_definition_id.to_string(),
            },
        )
    }

    fn create_role_assignment(&self, request: &RbacRoleAssignment<'_>) -> CallResult<()> {
        self.record(
            Op::CreateRoleAssignment,
            Call::CreateRoleAssignment {
                assignee: request.assignee_object_id.to_string(),
                principal_type: request.principal_type.as_str().to_string(),
                role_name: request.role_name.to_string(),
                scope: request.scope.to_string(),
            },
        )
    }

    fn count_data_role_assignments(
        &self,
        _account: ResourceRef<'_>,
        principal_id: &str,
    ) -> CallResult<usize> {
        self.record(
            Op::CountDataRoleAssignments,
            Call::CountDataRoleAssignments {
                principal_id: principal_id.to_string(),
            },
        )?;
        Ok(self.data_assignment_count)
    }

    fn count_role_assignments(&self, assignee: &str, scope: &str) -> CallResult<usize> {
        self.record(
            Op::CountRoleAssignments,
            Call::CountRoleAssignments {
                assignee: assignee.to_string(),
                scope: scope.to_string(),
            },
        )?;
        Ok(self.rbac_assignment_count)
    }
}
