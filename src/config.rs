//! Configuration layering for provisioning runs.
//!
//! Each value is taken from the first source that supplies a non-blank one:
//! CLI flag, environment variable, config file, built-in default. Required
//! resource names have no default; all missing ones are reported together
//! before any control-plane call is made.
use crate::cli::{ConnectionArgs, ResourceArgs};
use crate::resolve::PollPolicy;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current schema version for the JSON config file.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

pub const ENV_RESOURCE_GROUP: &str = "SRBAC_RESOURCE_GROUP";
pub const ENV_SEARCH_SERVICE: &str = "SRBAC_SEARCH_SERVICE";
pub const ENV_COSMOS_ACCOUNT: &str = "SRBAC_COSMOS_ACCOUNT";
pub const ENV_AI_ACCOUNT: &str = "SRBAC_AI_ACCOUNT";
pub const ENV_AI_PROJECT: &str = "SRBAC_AI_PROJECT";
pub const ENV_AZ_COMMAND: &str = "SRBAC_AZ_COMMAND";

pub const DEFAULT_AI_PROJECT: &str = "default";
pub const DEFAULT_AZ_COMMAND: &str = "az";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_IDENTITY_POLL_ATTEMPTS: u32 = 5;
pub const DEFAULT_IDENTITY_POLL_INTERVAL_SECS: u64 = 3;

/// On-disk config; every field is optional so flags and env can fill gaps.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProvisionConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosmos_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub az_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_poll_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_poll_interval_secs: Option<u64>,
}

fn default_schema_version() -> u32 {
    CONFIG_SCHEMA_VERSION
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            resource_group: None,
            search_service: None,
            cosmos_account: None,
            ai_account: None,
            ai_project: None,
            az_command: None,
            max_attempts: None,
            login_timeout_secs: None,
            identity_poll_attempts: None,
            identity_poll_interval_secs: None,
        }
    }
}

/// Validated names of the resources in the fixed topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceNames {
    pub resource_group: String,
    pub search_service: String,
    pub cosmos_account: String,
    pub ai_account: String,
    pub ai_project: String,
}

impl ResourceNames {
    /// Validate and trim the five names.
    pub fn new(
        resource_group: &str,
        search_service: &str,
        cosmos_account: &str,
        ai_account: &str,
        ai_project: &str,
    ) -> Result<Self> {
        let fields = [
            ("resource group", resource_group),
            ("search service", search_service),
            ("cosmos account", cosmos_account),
            ("ai account", ai_account),
            ("ai project", ai_project),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(label, _)| *label)
            .collect();
        if !missing.is_empty() {
            return Err(anyhow!("missing required parameters: {}", missing.join(", ")));
        }
        Ok(Self {
            resource_group: resource_group.trim().to_string(),
            search_service: search_service.trim().to_string(),
            cosmos_account: cosmos_account.trim().to_string(),
            ai_account: ai_account.trim().to_string(),
            ai_project: ai_project.trim().to_string(),
        })
    }
}

/// Settings controlling how the control plane is driven.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub az_command: String,
    pub max_attempts: u32,
    pub login_timeout: Duration,
    pub identity_poll: PollPolicy,
}

/// Fully resolved inputs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub names: ResourceNames,
    pub run: RunSettings,
}

/// Default config location: `<config dir>/srbac/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("srbac").join("config.json"))
}

/// Load a config file from `path`.
pub fn load_config(path: &Path) -> Result<ProvisionConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: ProvisionConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Load the explicit config, or the default one when it exists.
pub fn load_config_optional(explicit: Option<&Path>) -> Result<Option<ProvisionConfig>> {
    if let Some(path) = explicit {
        return load_config(path).map(Some);
    }
    match default_config_path() {
        Some(path) if path.is_file() => {
            tracing::debug!(path = %path.display(), "loading default config");
            load_config(&path).map(Some)
        }
        _ => Ok(None),
    }
}

/// Validate schema version and numeric limits.
pub fn validate_config(config: &ProvisionConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.max_attempts == Some(0) {
        return Err(anyhow!("max_attempts must be at least 1"));
    }
    if config.login_timeout_secs == Some(0) {
        return Err(anyhow!("login_timeout_secs must be at least 1"));
    }
    if config.identity_poll_attempts == Some(0) {
        return Err(anyhow!("identity_poll_attempts must be at least 1"));
    }
    Ok(())
}

/// Merge CLI flags, environment and config file into validated settings.
///
/// `env` is injected so precedence can be tested without touching the
/// process environment.
pub fn resolve_settings<E>(
    resources: &ResourceArgs,
    connection: &ConnectionArgs,
    file: Option<&ProvisionConfig>,
    env: E,
) -> Result<Settings>
where
    E: Fn(&str) -> Option<String>,
{
    let empty = ProvisionConfig::default();
    let file = file.unwrap_or(&empty);

    let pick = |flag: &Option<String>, var: &str, from_file: &Option<String>| {
        non_blank(flag.clone())
            .or_else(|| non_blank(env(var)))
            .or_else(|| non_blank(from_file.clone()))
    };

    let resource_group = pick(
        &resources.resource_group,
        ENV_RESOURCE_GROUP,
        &file.resource_group,
    );
    let search_service = pick(
        &resources.search_service,
        ENV_SEARCH_SERVICE,
        &file.search_service,
    );
    let cosmos_account = pick(
        &resources.cosmos_account,
        ENV_COSMOS_ACCOUNT,
        &file.cosmos_account,
    );
    let ai_account = pick(&resources.ai_account, ENV_AI_ACCOUNT, &file.ai_account);
    let ai_project = pick(&resources.ai_project, ENV_AI_PROJECT, &file.ai_project)
        .unwrap_or_else(|| DEFAULT_AI_PROJECT.to_string());

    let required = [
        ("--resource-group", ENV_RESOURCE_GROUP, &resource_group),
        ("--search-service", ENV_SEARCH_SERVICE, &search_service),
        ("--cosmos-account", ENV_COSMOS_ACCOUNT, &cosmos_account),
        ("--ai-account", ENV_AI_ACCOUNT, &ai_account),
    ];
    let missing: Vec<String> = required
        .iter()
        .filter(|(_, _, value)| value.is_none())
        .map(|(flag, var, _)| format!("{flag} (or {var})"))
        .collect();
    if !missing.is_empty() {
        return Err(anyhow!(
            "missing required parameters: {}",
            missing.join(", ")
        ));
    }

    let names = ResourceNames::new(
        resource_group.as_deref().unwrap_or_default(),
        search_service.as_deref().unwrap_or_default(),
        cosmos_account.as_deref().unwrap_or_default(),
        ai_account.as_deref().unwrap_or_default(),
        &ai_project,
    )?;

    let az_command = pick(&connection.az, ENV_AZ_COMMAND, &file.az_command)
        .unwrap_or_else(|| DEFAULT_AZ_COMMAND.to_string());
    let max_attempts = connection
        .max_attempts
        .or(file.max_attempts)
        .unwrap_or(DEFAULT_MAX_ATTEMPTS);
    if max_attempts == 0 {
        return Err(anyhow!("--max-attempts must be at least 1"));
    }
    let login_timeout_secs = connection
        .login_timeout_secs
        .or(file.login_timeout_secs)
        .unwrap_or(DEFAULT_LOGIN_TIMEOUT_SECS);
    if login_timeout_secs == 0 {
        return Err(anyhow!("--login-timeout-secs must be at least 1"));
    }

    Ok(Settings {
        names,
        run: RunSettings {
            az_command,
            max_attempts,
            login_timeout: Duration::from_secs(login_timeout_secs),
            identity_poll: PollPolicy {
                attempts: file
                    .identity_poll_attempts
                    .unwrap_or(DEFAULT_IDENTITY_POLL_ATTEMPTS),
                interval: Duration::from_secs(
                    file.identity_poll_interval_secs
                        .unwrap_or(DEFAULT_IDENTITY_POLL_INTERVAL_SECS),
                ),
            },
        },
    })
}

/// Resolve settings from the process environment and the config file.
pub fn load_settings(resources: &ResourceArgs, connection: &ConnectionArgs) -> Result<Settings> {
    let file = load_config_optional(connection.config.as_deref())?;
    resolve_settings(resources, connection, file.as_ref(), |var| {
        std::env::var(var).ok()
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
