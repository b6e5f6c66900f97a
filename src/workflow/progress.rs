//! Operator-facing status lines on stderr.
//!
//! Stdout is reserved for the summary or the JSON report.
use crate::executor::{StepOutcome, StepStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Level {
    Ok,
    Info,
    Warn,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Ok => "[ok]",
            Level::Info => "[info]",
            Level::Warn => "[warn]",
            Level::Error => "[error]",
        }
    }
}

pub(crate) fn line(level: Level, message: &str) {
    eprintln!("{} {message}", level.tag());
}

/// Report a finished step; failures include the provider error.
pub(crate) fn step(label: &str, outcome: &StepOutcome) {
    let level = match outcome.status {
        StepStatus::Succeeded => Level::Ok,
        StepStatus::AlreadyExists | StepStatus::Planned => Level::Info,
        StepStatus::Failed => Level::Error,
    };
    line(level, &step_message(label, outcome));
}

/// Planned descriptions start with their own verb ("grant ...", "enable ...").
fn step_message(label: &str, outcome: &StepOutcome) -> String {
    match outcome.status {
        StepStatus::Succeeded => format!("{label}: {}", outcome.description),
        StepStatus::AlreadyExists => format!("{label}: {} (already exists)", outcome.description),
        StepStatus::Planned => format!("{label}: would {}", outcome.description),
        StepStatus::Failed => format!(
            "{label}: {} failed after {} attempt(s): {}",
            outcome.description,
            outcome.attempts,
            outcome.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
