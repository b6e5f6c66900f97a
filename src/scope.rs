//! Hierarchical resource scopes used by control-plane role assignments.
use crate::resolve::Identifier;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::fmt;

/// Resource kinds the provisioning topology addresses by scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    DatabaseAccount,
    CognitiveServicesAccount,
}

impl ResourceKind {
    fn provider_path(self) -> &'static str {
        match self {
            ResourceKind::DatabaseAccount => "Microsoft.DocumentDB/databaseAccounts",
            ResourceKind::CognitiveServicesAccount => "Microsoft.CognitiveServices/accounts",
        }
    }
}

/// A fully qualified scope path such as
/// `/subscriptions/{sub}/resourceGroups/{rg}/providers/{provider}/{type}/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    /// Build the scope of a top-level resource.
    pub fn resource(
        subscription: &Identifier,
        resource_group: &str,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Self> {
        let resource_group = segment("resource group", resource_group)?;
        let name = segment("resource name", name)?;
        Ok(Self(format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
            subscription,
            resource_group,
            kind.provider_path(),
            name
        )))
    }

    /// Extend this scope with a `/{child_type}/{name}` sub-resource.
    pub fn child(&self, child_type: &str, name: &str) -> Result<Self> {
        let child_type = segment("sub-resource type", child_type)?;
        let name = segment("sub-resource name", name)?;
        Ok(Self(format!("{}/{}/{}", self.0, child_type, name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn segment<'a>(label: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(anyhow!("cannot build scope: {label} is empty"));
    }
    if value.contains('/') {
        return Err(anyhow!(
            "cannot build scope: {label} {value:?} must not contain '/'"
        ));
    }
    Ok(value)
}
