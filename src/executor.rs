//! Retry wrapper for individual control-plane calls.
//!
//! A call that fails with an expired session is retried after a forced login
//! until `max_attempts` is spent. Every other failure is returned at once; the
//! caller decides whether the step is critical.
use crate::control_plane::{CallFailure, CallResult, ControlPlane, FailureKind};
use crate::session::SessionGuard;
use anyhow::{anyhow, Result};
use serde::Serialize;

/// Final state of one executed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    /// The provider reported the object already exists; counted as success.
    AlreadyExists,
    Failed,
    /// Not executed (dry run).
    Planned,
}

impl StepStatus {
    pub fn is_success(self) -> bool {
        matches!(self, StepStatus::Succeeded | StepStatus::AlreadyExists)
    }

    pub fn label(self) -> &'static str {
        match self {
            StepStatus::Succeeded => "ok",
            StepStatus::AlreadyExists => "exists",
            StepStatus::Failed => "FAILED",
            StepStatus::Planned => "planned",
        }
    }
}

/// Outcome of one step, kept for the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub description: String,
    pub status: StepStatus,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct Executor<'a> {
    plane: &'a dyn ControlPlane,
    session: &'a SessionGuard<'a>,
    max_attempts: u32,
}

impl<'a> Executor<'a> {
    pub fn new(
        plane: &'a dyn ControlPlane,
        session: &'a SessionGuard<'a>,
        max_attempts: u32,
    ) -> Self {
        Self {
            plane,
            session,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Run `operation`, refreshing the session on `AuthExpired` while attempts
    /// remain. Returns the attempt count alongside the final result.
    pub fn call<T, F>(&self, description: &str, mut operation: F) -> (u32, CallResult<T>)
    where
        F: FnMut(&dyn ControlPlane) -> CallResult<T>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation(self.plane) {
                Err(failure)
                    if failure.kind == FailureKind::AuthExpired && attempt < self.max_attempts =>
                {
                    tracing::warn!(
                        step = description,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %failure,
                        "session expired; re-authenticating before retry"
                    );
                    if let Err(err) = self.session.refresh() {
                        let message =
                            format!("{}; re-authentication failed: {err:#}", failure.message);
                        return (
                            attempt,
                            Err(CallFailure::new(FailureKind::AuthExpired, message)),
                        );
                    }
                }
                result => return (attempt, result),
            }
        }
    }

    /// Run a step whose failure is recorded but does not stop the sequence.
    pub fn execute<F>(&self, description: &str, operation: F) -> StepOutcome
    where
        F: FnMut(&dyn ControlPlane) -> CallResult<()>,
    {
        let (attempts, result) = self.call(description, operation);
        let outcome = match result {
            Ok(()) => StepOutcome {
                description: description.to_string(),
                status: StepStatus::Succeeded,
                attempts,
                failure_kind: None,
                error: None,
            },
            Err(failure) if failure.kind == FailureKind::Conflict => StepOutcome {
                description: description.to_string(),
                status: StepStatus::AlreadyExists,
                attempts,
                failure_kind: None,
                error: None,
            },
            Err(failure) => StepOutcome {
                description: description.to_string(),
                status: StepStatus::Failed,
                attempts,
                failure_kind: Some(failure.kind),
                error: Some(failure.message),
            },
        };
        tracing::debug!(
            step = description,
            status = outcome.status.label(),
            attempts,
            "step finished"
        );
        outcome
    }

    /// Run a step whose failure aborts the run.
    pub fn execute_critical<F>(&self, description: &str, operation: F) -> Result<StepOutcome>
    where
        F: FnMut(&dyn ControlPlane) -> CallResult<()>,
    {
        let outcome = self.execute(description, operation);
        if outcome.status == StepStatus::Failed {
            return Err(anyhow!(
                "{description} failed after {} attempt(s): {}",
                outcome.attempts,
                outcome.error.as_deref().unwrap_or("unknown error")
            ));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
