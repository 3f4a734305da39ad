//! Security event schema.
//!
//! Events carry identifiers and reasons only. Cookie values, tokens,
//! passwords and keys never appear in them.

use std::fmt;

use crate::principal::{Principal, Role};

/// Kind of security-relevant event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityEventKind {
    /// A session cookie was present but failed to decode
    SessionRejected,
    /// An unsafe request carried no valid authenticity token
    TokenRejected,
    /// No ability allowed the requested action
    AccessDenied,
    /// The session named a user the store could not load
    PrincipalMissing,
    /// A user logged in
    LoginSucceeded,
    /// A login attempt was refused
    LoginFailed,
    /// A user logged out
    Logout,
}

impl SecurityEventKind {
    /// Returns the outcome this kind of event represents.
    pub fn outcome(self) -> AuditOutcome {
        match self {
            SecurityEventKind::LoginSucceeded | SecurityEventKind::Logout => AuditOutcome::Success,
            SecurityEventKind::PrincipalMissing => AuditOutcome::Error,
            SecurityEventKind::SessionRejected
            | SecurityEventKind::TokenRejected
            | SecurityEventKind::AccessDenied
            | SecurityEventKind::LoginFailed => AuditOutcome::Denied,
        }
    }
}

impl fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityEventKind::SessionRejected => write!(f, "session_rejected"),
            SecurityEventKind::TokenRejected => write!(f, "token_rejected"),
            SecurityEventKind::AccessDenied => write!(f, "access_denied"),
            SecurityEventKind::PrincipalMissing => write!(f, "principal_missing"),
            SecurityEventKind::LoginSucceeded => write!(f, "login_succeeded"),
            SecurityEventKind::LoginFailed => write!(f, "login_failed"),
            SecurityEventKind::Logout => write!(f, "logout"),
        }
    }
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    /// Operation succeeded
    Success,
    /// Operation was refused
    Denied,
    /// Operation degraded because a collaborator failed
    Error,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Denied => write!(f, "denied"),
            AuditOutcome::Error => write!(f, "error"),
        }
    }
}

/// A structured security event.
///
/// # Example
///
/// ```
/// use cms_guard::audit::{SecurityEvent, SecurityEventKind, AuditOutcome};
///
/// let event = SecurityEvent::new("req-123", SecurityEventKind::AccessDenied)
///     .with_method("POST")
///     .with_path("/pages/4/update")
///     .with_reason("not authorized to update pages with role reader");
///
/// assert_eq!(event.request_id(), "req-123");
/// assert_eq!(event.outcome(), AuditOutcome::Denied);
/// assert!(event.user_id().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityEvent {
    request_id: String,
    kind: SecurityEventKind,
    user_id: Option<u64>,
    role: Option<Role>,
    method: Option<String>,
    path: Option<String>,
    reason: Option<String>,
}

impl SecurityEvent {
    /// Creates an event with the required fields.
    pub fn new(request_id: impl Into<String>, kind: SecurityEventKind) -> Self {
        Self {
            request_id: request_id.into(),
            kind,
            user_id: None,
            role: None,
            method: None,
            path: None,
            reason: None,
        }
    }

    /// Records the acting principal. Anonymous principals record nothing.
    pub fn with_principal(mut self, principal: &Principal) -> Self {
        if let Principal::Authenticated { id, role, .. } = principal {
            self.user_id = Some(*id);
            self.role = Some(*role);
        }
        self
    }

    /// Records a user id without a loaded principal.
    pub fn with_user_id(mut self, user_id: u64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Sets the HTTP method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the request path (no query string).
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets a log-only reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns the request identifier.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the event kind.
    pub fn kind(&self) -> SecurityEventKind {
        self.kind
    }

    /// Returns the outcome implied by the kind.
    pub fn outcome(&self) -> AuditOutcome {
        self.kind.outcome()
    }

    /// Returns the user id, if known.
    pub fn user_id(&self) -> Option<u64> {
        self.user_id
    }

    /// Returns the role, if a principal was recorded.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Returns the HTTP method, if set.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Returns the path, if set.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Returns the reason, if set.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SecurityEvent[kind={}, outcome={}, request_id={}",
            self.kind,
            self.outcome(),
            self.request_id
        )?;

        if let Some(user_id) = self.user_id {
            write!(f, ", user_id={}", user_id)?;
        }
        if let Some(role) = self.role {
            write!(f, ", role={}", role)?;
        }
        if let Some(method) = &self.method {
            write!(f, ", method={}", method)?;
        }
        if let Some(path) = &self.path {
            write!(f, ", path={}", path)?;
        }
        if let Some(reason) = &self.reason {
            write!(f, ", reason={}", reason)?;
        }

        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_display() {
        assert_eq!(SecurityEventKind::TokenRejected.to_string(), "token_rejected");
        assert_eq!(SecurityEventKind::Logout.to_string(), "logout");
    }

    #[test]
    fn outcomes_follow_kind() {
        assert_eq!(SecurityEventKind::LoginSucceeded.outcome(), AuditOutcome::Success);
        assert_eq!(SecurityEventKind::LoginFailed.outcome(), AuditOutcome::Denied);
        assert_eq!(SecurityEventKind::PrincipalMissing.outcome(), AuditOutcome::Error);
    }

    #[test]
    fn anonymous_principal_records_nothing() {
        let event = SecurityEvent::new("req-1", SecurityEventKind::AccessDenied)
            .with_principal(&Principal::Anonymous);
        assert!(event.user_id().is_none());
        assert!(event.role().is_none());
    }

    #[test]
    fn authenticated_principal_is_recorded() {
        let principal = Principal::Authenticated {
            id: 12,
            role: Role::EDITOR,
            kind: "users".to_string(),
        };
        let event = SecurityEvent::new("req-2", SecurityEventKind::Logout).with_principal(&principal);
        assert_eq!(event.user_id(), Some(12));
        assert_eq!(event.role(), Some(Role::EDITOR));
    }

    #[test]
    fn display_lists_set_fields_only() {
        let event = SecurityEvent::new("req-3", SecurityEventKind::SessionRejected)
            .with_method("GET")
            .with_reason("mac mismatch");

        assert_eq!(
            event.to_string(),
            "SecurityEvent[kind=session_rejected, outcome=denied, request_id=req-3, method=GET, reason=mac mismatch]"
        );
    }
}
