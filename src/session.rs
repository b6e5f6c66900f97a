//! Session guard: make sure the control plane has an authenticated session.
use crate::control_plane::{CallFailure, ControlPlane, FailureKind};
use anyhow::{anyhow, Result};
use std::time::Duration;

pub struct SessionGuard<'a> {
    plane: &'a dyn ControlPlane,
    login_timeout: Duration,
}

impl<'a> SessionGuard<'a> {
    pub fn new(plane: &'a dyn ControlPlane, login_timeout: Duration) -> Self {
        Self {
            plane,
            login_timeout,
        }
    }

    /// Query the current session and log in once when it is absent or expired.
    ///
    /// Returns the session's account name. Any other failure is fatal.
    pub fn ensure_authenticated(&self) -> Result<String> {
        match self.plane.current_session() {
            Ok(account) if !account.trim().is_empty() => {
                tracing::debug!(account = account.trim(), "existing session");
                return Ok(account.trim().to_string());
            }
            Ok(_) => tracing::info!("no active session; starting login"),
            Err(failure) if failure.kind == FailureKind::AuthExpired => {
                tracing::info!(error = %failure, "session missing or expired; starting login");
            }
            Err(failure) => return Err(anyhow!("query current session: {failure}")),
        }

        self.login()?;

        match self.plane.current_session() {
            Ok(account) if !account.trim().is_empty() => Ok(account.trim().to_string()),
            Ok(_) => Err(anyhow!("login completed but no session is active")),
            Err(failure) => Err(anyhow!("query session after login: {failure}")),
        }
    }

    /// Force a new login after a call reported an expired token.
    pub fn refresh(&self) -> Result<()> {
        tracing::warn!("re-authenticating after expired session");
        self.login()
    }

    fn login(&self) -> Result<()> {
        self.plane
            .login(self.login_timeout)
            .map_err(|failure| login_error(&failure))
    }
}

fn login_error(failure: &CallFailure) -> anyhow::Error {
    match failure.kind {
        FailureKind::LoginTimedOut => anyhow!("login timed out: {}", failure.message),
        _ => anyhow!("login failed: {}", failure.message),
    }
}
