//! Identifier resolution with validation.
//!
//! Every identifier the workflow uses passes through here so an empty or
//! whitespace-only lookup result can never reach a scope string or a grant.
use crate::control_plane::{CallResult, FailureKind};
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// A trimmed, non-empty identifier resolved from the control plane or input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Validate `raw`, naming `label` in the error when it is blank.
    pub fn new(label: &str, raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("{label} resolved to an empty value"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Retry budget for identifiers that may not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

/// Run a read-only lookup once and validate the result.
pub fn resolve<F>(label: &str, query: F) -> Result<Identifier>
where
    F: FnOnce() -> CallResult<String>,
{
    let raw = query().map_err(|failure| anyhow!("failed to resolve {label}: {failure}"))?;
    let identifier = Identifier::new(label, &raw)?;
    tracing::debug!(label, value = %identifier, "resolved identifier");
    Ok(identifier)
}

/// Like [`resolve`], but retries empty and `NotFound` results.
///
/// Any other failure kind stops polling immediately.
pub fn resolve_polled<F>(label: &str, policy: PollPolicy, mut query: F) -> Result<Identifier>
where
    F: FnMut() -> CallResult<String>,
{
    let attempts = policy.attempts.max(1);
    let mut last_problem = String::from("empty value");
    for attempt in 1..=attempts {
        match query() {
            Ok(raw) => {
                if let Ok(identifier) = Identifier::new(label, &raw) {
                    tracing::debug!(label, attempt, value = %identifier, "resolved identifier");
                    return Ok(identifier);
                }
                last_problem = "empty value".to_string();
            }
            Err(failure) if failure.kind == FailureKind::NotFound => {
                last_problem = failure.to_string();
            }
            Err(failure) => return Err(anyhow!("failed to resolve {label}: {failure}")),
        }
        if attempt < attempts {
            tracing::debug!(label, attempt, "identifier not yet available; polling");
            std::thread::sleep(policy.interval);
        }
    }
    Err(anyhow!(
        "failed to resolve {label} after {attempts} attempts ({last_problem})"
    ))
}
