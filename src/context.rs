use serde::Serialize;

use crate::principal::Principal;
use crate::session::Session;

/// Template key holding the freshly minted authenticity token.
pub const AUTHENTICITY_TOKEN_KEY: &str = "authenticity_token";

/// Template key holding the current principal.
pub const CURRENT_USER_KEY: &str = "current_user";

static ANONYMOUS: Principal = Principal::Anonymous;

/// Per-request state cached by the guard.
///
/// The session is decoded at most once, the principal is loaded at most once
/// and the minted token is kept so templates can embed it. Nothing in here
/// is shared between requests.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    session: Option<Session>,
    principal: Option<Principal>,
    authenticity_token: Option<String>,
}

impl RequestContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the decoded session, if it has been read.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Returns the decoded session for modification, if it has been read.
    ///
    /// Changes are only persisted when the guard writes the session.
    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// Returns true once the session has been decoded.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Returns the cached principal, anonymous if none was attached.
    pub fn principal(&self) -> &Principal {
        self.principal.as_ref().unwrap_or(&ANONYMOUS)
    }

    /// Returns true once a principal has been attached.
    pub fn has_principal(&self) -> bool {
        self.principal.is_some()
    }

    /// Returns the token minted for this response, if any.
    pub fn authenticity_token(&self) -> Option<&str> {
        self.authenticity_token.as_deref()
    }

    /// Builds the values exposed to the template renderer.
    pub fn template_context(&self) -> TemplateContext {
        TemplateContext {
            authenticity_token: self.authenticity_token.clone(),
            current_user: self.principal().clone(),
        }
    }

    pub(crate) fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub(crate) fn session_or_default(&mut self) -> &mut Session {
        self.session.get_or_insert_with(Session::new)
    }

    pub(crate) fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    pub(crate) fn set_authenticity_token(&mut self, token: String) {
        self.authenticity_token = Some(token);
    }
}

/// The two values templates may read.
///
/// Serializes to a map with the keys [`AUTHENTICITY_TOKEN_KEY`] and
/// [`CURRENT_USER_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateContext {
    /// Masked token for forms, absent when none was minted
    pub authenticity_token: Option<String>,
    /// The current principal
    pub current_user: Principal,
}
