//! Request binding: sessions, tokens, principals and abilities per request.
//!
//! [`Guard`] glues the session codec, the token protocol, the principal
//! store and the ability registry to one request/response pair. Handlers
//! go through [`Guard::admit`], which runs the mandatory order
//!
//! ```text
//! decode session
//!   ↓
//! verify token (unsafe methods)
//!   ↓
//! load principal
//!   ↓
//! mint token (HTML GETs)
//! ```
//!
//! and returns an [`Admission`]. Authorization, login and logout all take an
//! `Admission`, so none of them can run before the token check.

use std::fmt;
use std::sync::Arc;

use crate::audit::{self, AuditTrail, SecurityEvent, SecurityEventKind};
use crate::authorize::{Registry, Verb};
use crate::config::Config;
use crate::error::{AuthError, ConfigError, Error, LoginError, TokenError};
use crate::password::check_password;
use crate::principal::{load_principal, Principal, PrincipalStore};
use crate::resource::Resource;
use crate::session::{Session, SessionCodec};
use crate::token::{mint_token, verify_token};

use super::{RequestAdapter, ResponseAdapter};

/// Proof that [`Guard::admit`] ran for a request.
///
/// Cannot be constructed outside this crate.
#[derive(Debug)]
pub struct Admission {
    request_id: String,
}

impl Admission {
    /// Returns the ID of the admitted request.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

/// Per-request security binding.
///
/// A `Guard` is built once at startup and shared by all request threads.
/// The registry is read-only by then and the codec holds immutable keys,
/// so no per-request locking happens here.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use cms_guard::{register_default_abilities, MemoryStore, Registry, SessionCodec, SessionSettings};
/// use cms_guard::web::{Guard, HttpMethod, RequestAdapter, ResponseAdapter};
///
/// let registry = Registry::new();
/// register_default_abilities(&registry);
/// let codec = SessionCodec::new(SessionSettings::new([1; 32], [2; 32], "app_session"));
/// let guard = Guard::new(codec, Arc::new(registry), Arc::new(MemoryStore::new()));
///
/// let mut request = RequestAdapter::new("req-1", HttpMethod::Get, "/pages");
/// let mut response = ResponseAdapter::new();
/// guard.admit(&mut request, &mut response).unwrap();
///
/// // a fresh visitor gets a token secret cookie and a masked token
/// assert!(request.context().authenticity_token().is_some());
/// assert!(response.cookie("app_session").is_some());
/// ```
pub struct Guard {
    codec: SessionCodec,
    registry: Arc<Registry>,
    store: Arc<dyn PrincipalStore>,
    audit: Option<Arc<AuditTrail>>,
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("codec", &self.codec)
            .field("abilities", &self.registry.len())
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

impl Guard {
    /// Creates a guard from its collaborators.
    pub fn new(codec: SessionCodec, registry: Arc<Registry>, store: Arc<dyn PrincipalStore>) -> Self {
        Self {
            codec,
            registry,
            store,
            audit: None,
        }
    }

    /// Validates `config` and creates a guard.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for missing or malformed settings.
    pub fn from_config(
        config: &Config,
        registry: Arc<Registry>,
        store: Arc<dyn PrincipalStore>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(SessionCodec::from_config(config)?, registry, store))
    }

    /// Records security events into `trail` as well as logging them.
    pub fn with_audit(mut self, trail: Arc<AuditTrail>) -> Self {
        self.audit = Some(trail);
        self
    }

    /// Returns the session codec.
    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    /// Returns the ability registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Runs every per-request check in the required order.
    ///
    /// # Errors
    ///
    /// [`Error::Token`] if an unsafe request fails the token check (the
    /// session cookie is cleared first), or an encoding/crypto error if the
    /// session could not be written after minting a token.
    pub fn admit(&self, request: &mut RequestAdapter, response: &mut ResponseAdapter) -> Result<Admission, Error> {
        self.ensure_session(request);
        self.require_token(request, response)?;
        self.attach_principal(request);
        self.ensure_token_minted(request, response)?;

        Ok(Admission {
            request_id: request.request_id().to_string(),
        })
    }

    /// Loads and caches the principal for the session's user id.
    ///
    /// Anything short of a loaded user yields [`Principal::Anonymous`]. A
    /// stale id for a deleted user is logged and the request continues
    /// anonymously.
    pub fn attach_principal(&self, request: &mut RequestAdapter) -> Principal {
        if request.context().has_principal() {
            return request.context().principal().clone();
        }

        let user_id = self.session_mut(request).user_id();
        let principal = match load_principal(self.store.as_ref(), user_id) {
            Ok(principal) => principal,
            Err(err) => {
                request
                    .log()
                    .info(format_args!("session user {} not loaded: {}", user_id, err));
                self.record(
                    request,
                    SecurityEvent::new(request.request_id(), SecurityEventKind::PrincipalMissing)
                        .with_user_id(user_id)
                        .with_reason(err.to_string()),
                );
                Principal::Anonymous
            }
        };

        request.context_mut().set_principal(principal.clone());
        principal
    }

    /// Verifies the submitted authenticity token on unsafe methods.
    ///
    /// GET and HEAD pass without a check. On failure the session is cleared
    /// both in the request context and on the response.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] for every kind of failure.
    pub fn require_token(&self, request: &mut RequestAdapter, response: &mut ResponseAdapter) -> Result<(), TokenError> {
        if request.method().is_safe() {
            return Ok(());
        }

        let submitted = request.submitted_token().map(str::to_owned);
        let result = verify_token(self.session_mut(request), submitted.as_deref());

        if let Err(err) = &result {
            request
                .log()
                .warn(format_args!("authenticity token rejected: {}", err.failure()));
            self.session_mut(request).clear();
            self.codec.clear_session(response);
            self.record(
                request,
                SecurityEvent::new(request.request_id(), SecurityEventKind::TokenRejected)
                    .with_reason(err.failure().to_string()),
            );
        }
        result
    }

    /// Mints a token for HTML GET requests and exposes it to templates.
    ///
    /// Returns `None` for other requests. The session cookie is only written
    /// when a new token secret had to be created.
    ///
    /// # Errors
    ///
    /// Fails if the session cannot be encoded.
    pub fn ensure_token_minted(
        &self,
        request: &mut RequestAdapter,
        response: &mut ResponseAdapter,
    ) -> Result<Option<String>, Error> {
        if !request.wants_token() {
            return Ok(None);
        }
        if let Some(token) = request.context().authenticity_token() {
            return Ok(Some(token.to_string()));
        }

        let session = self.session_mut(request);
        let token = mint_token(session);
        if session.is_modified() {
            self.codec.write_session(response, session)?;
        }

        request.context_mut().set_authenticity_token(token.clone());
        Ok(Some(token))
    }

    /// Returns the principal attached to `request`, anonymous if none.
    pub fn current_principal<'r>(&self, request: &'r RequestAdapter) -> &'r Principal {
        request.context().principal()
    }

    /// Checks that the current principal may perform `verb` on `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if no ability matches, or if `admission` belongs
    /// to another request.
    pub fn authorize(
        &self,
        admission: &Admission,
        request: &RequestAdapter,
        verb: Verb,
        resource: Option<&dyn Resource>,
    ) -> Result<(), AuthError> {
        let principal = request.context().principal();

        let result = if admission.request_id() == request.request_id() {
            self.registry.check(verb, resource, Some(principal))
        } else {
            request.log().error(format_args!(
                "admission for {} used on another request",
                admission.request_id()
            ));
            Err(AuthError {
                verb,
                kind: resource.map(|r| r.kind().to_string()).unwrap_or_default(),
                role: principal.role(),
            })
        };

        if let Err(err) = &result {
            self.record(
                request,
                SecurityEvent::new(request.request_id(), SecurityEventKind::AccessDenied)
                    .with_principal(principal)
                    .with_reason(err.to_string()),
            );
        }
        result
    }

    /// Writes the request's session back if a handler changed it.
    ///
    /// # Errors
    ///
    /// Fails if the session cannot be encoded; nothing is written then.
    pub fn save_session(&self, request: &mut RequestAdapter, response: &mut ResponseAdapter) -> Result<(), Error> {
        let session = self.session_mut(request);
        if session.is_modified() {
            self.codec.write_session(response, session)?;
        }
        Ok(())
    }

    /// Logs a user in by email and password.
    ///
    /// On success the user id is stored in the session, the cookie is
    /// written and the request's principal is replaced.
    ///
    /// # Errors
    ///
    /// [`LoginError::AlreadyAuthenticated`] if a user is already attached,
    /// [`LoginError::UnknownEmail`] or [`LoginError::WrongPassword`] for bad
    /// credentials, [`LoginError::Hash`] for an unreadable stored hash.
    pub fn login(
        &self,
        _admission: &Admission,
        request: &mut RequestAdapter,
        response: &mut ResponseAdapter,
        email: &str,
        password: &str,
    ) -> Result<Principal, Error> {
        if !request.context().principal().is_anonymous() {
            return Err(LoginError::AlreadyAuthenticated.into());
        }

        let user = match self.store.find_by_email(email) {
            Ok(user) => user,
            Err(err) => {
                self.record(
                    request,
                    SecurityEvent::new(request.request_id(), SecurityEventKind::LoginFailed)
                        .with_reason(err.to_string()),
                );
                return Err(LoginError::UnknownEmail.into());
            }
        };

        if let Err(err) = check_password(password, &user.password_hash) {
            self.record(
                request,
                SecurityEvent::new(request.request_id(), SecurityEventKind::LoginFailed)
                    .with_user_id(user.id)
                    .with_reason(err.to_string()),
            );
            return Err(err.into());
        }

        let principal = Principal::from(&user);
        let session = self.session_mut(request);
        session.set_user_id(user.id);
        self.codec.write_session(response, session)?;

        request.context_mut().set_principal(principal.clone());
        self.record(
            request,
            SecurityEvent::new(request.request_id(), SecurityEventKind::LoginSucceeded).with_principal(&principal),
        );
        Ok(principal)
    }

    /// Logs the current user out by clearing the session cookie.
    pub fn logout(&self, _admission: &Admission, request: &mut RequestAdapter, response: &mut ResponseAdapter) {
        let principal = request.context().principal().clone();

        self.session_mut(request).clear();
        self.codec.clear_session(response);
        request.context_mut().set_principal(Principal::Anonymous);

        self.record(
            request,
            SecurityEvent::new(request.request_id(), SecurityEventKind::Logout).with_principal(&principal),
        );
    }

    fn ensure_session(&self, request: &mut RequestAdapter) {
        if request.context().has_session() {
            return;
        }

        let session = self.codec.read_session(request);
        if let Some(reason) = session.invalid_reason() {
            request.log().debug(format_args!("session cookie rejected: {}", reason));
            self.record(
                request,
                SecurityEvent::new(request.request_id(), SecurityEventKind::SessionRejected)
                    .with_reason(reason.to_string()),
            );
        }
        request.context_mut().set_session(session);
    }

    fn session_mut<'r>(&self, request: &'r mut RequestAdapter) -> &'r mut Session {
        self.ensure_session(request);
        request.context_mut().session_or_default()
    }

    fn record(&self, request: &RequestAdapter, event: SecurityEvent) {
        let event = event
            .with_method(request.method().to_string())
            .with_path(request.path());
        audit::emit_to(self.audit.as_deref(), event);
    }
}
