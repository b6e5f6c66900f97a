//! Map provider error text onto [`FailureKind`].
//!
//! Patterns are checked in order; the first matching group wins. Auth
//! signatures go first because an expired token often surfaces alongside
//! generic "forbidden" wording.
use super::FailureKind;
use regex::RegexSet;
use std::sync::OnceLock;

const AUTH_PATTERNS: &[&str] = &[
    r"(?i)please run ['`]?az login",
    r"(?i)\baz login\b",
    r"(?i)token (has )?expired",
    r"(?i)\bexpired\b",
    r"(?i)AADSTS(70043|700082|50173|50078|50076)",
    r"(?i)interaction_?required",
    r"(?i)\bunauthori[sz]ed\b",
    r"(?i)\(401\)|status(?: code)?:? 401",
    r"(?i)timed? ?out",
];

const CONFLICT_PATTERNS: &[&str] = &[
    r"(?i)RoleAssignmentExists",
    r"(?i)already exists",
    r"(?i)\bconflict\b",
    r"(?i)\(409\)",
];

const PERMISSION_PATTERNS: &[&str] = &[
    r"(?i)AuthorizationFailed",
    r"(?i)does not have (the )?authorization",
    r"(?i)insufficient privileges",
    r"(?i)\bforbidden\b",
    r"(?i)\(403\)",
];

const NOT_FOUND_PATTERNS: &[&str] = &[
    r"(?i)ResourceNotFound",
    r"(?i)ResourceGroupNotFound",
    r"(?i)could not be found",
    r"(?i)\bnot found\b",
    r"(?i)\(404\)",
];

struct Signatures {
    auth: RegexSet,
    conflict: RegexSet,
    permission: RegexSet,
    not_found: RegexSet,
}

fn signatures() -> &'static Signatures {
    static SIGNATURES: OnceLock<Signatures> = OnceLock::new();
    SIGNATURES.get_or_init(|| Signatures {
        auth: RegexSet::new(AUTH_PATTERNS).expect("auth signatures compile"),
        conflict: RegexSet::new(CONFLICT_PATTERNS).expect("conflict signatures compile"),
        permission: RegexSet::new(PERMISSION_PATTERNS).expect("permission signatures compile"),
        not_found: RegexSet::new(NOT_FOUND_PATTERNS).expect("not-found signatures compile"),
    })
}

/// Classify the stderr of a failed provider command.
pub fn classify_failure(stderr: &str) -> FailureKind {
    let signatures = signatures();
    if signatures.auth.is_match(stderr) {
        FailureKind::AuthExpired
    } else if signatures.conflict.is_match(stderr) {
        FailureKind::Conflict
    } else if signatures.permission.is_match(stderr) {
        FailureKind::PermissionDenied
    } else if signatures.not_found.is_match(stderr) {
        FailureKind::NotFound
    } else {
        FailureKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_missing_or_expired_session() {
        assert_eq!(
            classify_failure("ERROR: Please run 'az login' to setup account."),
            FailureKind::AuthExpired
        );
        assert_eq!(
            classify_failure(
                "AADSTS70043: The refresh token has expired or is invalid due to sign-in frequency checks"
            ),
            FailureKind::AuthExpired
        );
        assert_eq!(
            classify_failure("Operation returned an invalid status 'Unauthorized'"),
            FailureKind::AuthExpired
        );
        assert_eq!(
            classify_failure("ERROR: The operation timed out"),
            FailureKind::AuthExpired
        );
    }

    #[test]
    fn detects_existing_assignment() {
        assert_eq!(
            classify_failure("(RoleAssignmentExists) The role assignment already exists."),
            FailureKind::Conflict
        );
    }

    #[test]
    fn authorization_failed_is_permission_not_auth() {
        assert_eq!(
            classify_failure(
                "(AuthorizationFailed) The client 'x' with object id 'y' does not have authorization to perform action"
            ),
            FailureKind::PermissionDenied
        );
    }

    #[test]
    fn detects_missing_resource() {
        assert_eq!(
            classify_failure(
                "(ResourceNotFound) The Resource 'Microsoft.Search/searchServices/s1' under resource group 'rg' was not found."
            ),
            FailureKind::NotFound
        );
    }

    #[test]
    fn unknown_text_is_other() {
        assert_eq!(
            classify_failure("ERROR: argument --scope: expected one argument"),
            FailureKind::Other
        );
    }
}
