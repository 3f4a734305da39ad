//! Principals and the user lookup seam.
//!
//! A [`Principal`] is built once per request from `session["uid"]`. Where
//! users are stored is the application's business: it implements
//! [`PrincipalStore`] and the guard calls it with the decoded id.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;

use crate::resource::Resource;

/// Resource kind of user records, used for self-ownership checks.
pub const USER_KIND: &str = "users";

/// Numeric role bucket.
///
/// The values are persisted in user rows and must never change. Gaps leave
/// room for roles added later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Role(pub i64);

impl Role {
    /// Not logged in
    pub const ANON: Role = Role(0);
    /// May read and edit their own profile
    pub const READER: Role = Role(20);
    /// May edit content
    pub const EDITOR: Role = Role(50);
    /// May do anything
    pub const ADMIN: Role = Role(100);

    /// Returns the role's display name.
    pub fn name(self) -> &'static str {
        match self {
            Role::ANON => "anon",
            Role::READER => "reader",
            Role::EDITOR => "editor",
            Role::ADMIN => "admin",
            _ => "custom",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            "custom" => write!(f, "role {}", self.0),
            name => f.write_str(name),
        }
    }
}

impl From<i64> for Role {
    fn from(value: i64) -> Self {
        Role(value)
    }
}

/// The actor a request is processed for.
///
/// Anonymous is an explicit variant, so there is no "id 0 but some role"
/// state to reason about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Principal {
    /// No session user, or the user could not be loaded
    Anonymous,
    /// A user loaded from the store
    Authenticated {
        /// Non-zero user id
        id: u64,
        /// The user's role
        role: Role,
        /// Resource kind of the user record
        kind: String,
    },
}

impl Principal {
    /// Returns the user id, 0 when anonymous.
    pub fn id(&self) -> u64 {
        match self {
            Principal::Anonymous => 0,
            Principal::Authenticated { id, .. } => *id,
        }
    }

    /// Returns the role, [`Role::ANON`] when anonymous.
    pub fn role(&self) -> Role {
        match self {
            Principal::Anonymous => Role::ANON,
            Principal::Authenticated { role, .. } => *role,
        }
    }

    /// Returns true for the anonymous principal.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }
}

impl Default for Principal {
    fn default() -> Self {
        Principal::Anonymous
    }
}

impl From<&UserRecord> for Principal {
    fn from(user: &UserRecord) -> Self {
        if user.id == 0 {
            return Principal::Anonymous;
        }
        Principal::Authenticated {
            id: user.id,
            role: user.role,
            kind: user.kind.clone(),
        }
    }
}

// A principal is itself a resource, which is how "users may update their
// own record" is expressed.
impl Resource for Principal {
    fn kind(&self) -> &str {
        match self {
            Principal::Anonymous => USER_KIND,
            Principal::Authenticated { kind, .. } => kind,
        }
    }

    fn owned_by(&self, user_id: u64) -> bool {
        user_id != 0 && self.id() == user_id
    }
}

/// What the store must return for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// User id
    pub id: u64,
    /// Role bucket
    pub role: Role,
    /// Resource kind, normally [`USER_KIND`]
    pub kind: String,
    /// Login email
    pub email: String,
    /// PHC-format password hash
    pub password_hash: String,
}

impl UserRecord {
    /// Creates a user record of kind [`USER_KIND`].
    pub fn new(id: u64, role: Role, email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id,
            role,
            kind: USER_KIND.to_string(),
            email: email.into(),
            password_hash: password_hash.into(),
        }
    }
}

/// User lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// No user has this id
    #[error("user {0} not found")]
    NotFound(u64),
    /// No user has this email
    #[error("no user with that email")]
    EmailNotFound,
    /// The backing store failed
    #[error("user store failed: {0}")]
    Backend(String),
}

/// Source of user records.
///
/// Implementations may block on I/O; the guard calls them at most once per
/// request.
pub trait PrincipalStore: Send + Sync {
    /// Finds a user by id.
    fn find(&self, id: u64) -> Result<UserRecord, LookupError>;

    /// Finds a user by login email.
    fn find_by_email(&self, _email: &str) -> Result<UserRecord, LookupError> {
        Err(LookupError::EmailNotFound)
    }
}

/// Loads the principal for `user_id`.
///
/// Id 0 short-circuits to [`Principal::Anonymous`] without calling the store.
pub fn load_principal(store: &dyn PrincipalStore, user_id: u64) -> Result<Principal, LookupError> {
    if user_id == 0 {
        return Ok(Principal::Anonymous);
    }
    let user = store.find(user_id)?;
    Ok(Principal::from(&user))
}

/// In-memory [`PrincipalStore`].
///
/// Suitable for tests, demos and small deployments with a fixed user list.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<u64, UserRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a user.
    pub fn insert(&self, user: UserRecord) {
        self.users.write().insert(user.id, user);
    }

    /// Removes a user, returning it if present.
    pub fn remove(&self, id: u64) -> Option<UserRecord> {
        self.users.write().remove(&id)
    }

    /// Returns the number of users.
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

impl PrincipalStore for MemoryStore {
    fn find(&self, id: u64) -> Result<UserRecord, LookupError> {
        self.users
            .read()
            .get(&id)
            .cloned()
            .ok_or(LookupError::NotFound(id))
    }

    fn find_by_email(&self, email: &str) -> Result<UserRecord, LookupError> {
        self.users
            .read()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or(LookupError::EmailNotFound)
    }
}
