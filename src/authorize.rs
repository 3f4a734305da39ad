//! Role and ownership authorization.
//!
//! Abilities are registered at startup and checked on every request. Each
//! ability grants one role one verb on one resource kind, optionally only
//! for resources the principal owns. There are no deny rules: the first
//! ability that matches allows the action.
//!
//! # Examples
//!
//! ```
//! use cms_guard::{Kind, Principal, Registry, Role, Verb, ANY_KIND};
//!
//! let registry = Registry::new();
//! registry.authorize(Role::ADMIN, Verb::Manage, ANY_KIND);
//!
//! let admin = Principal::Authenticated { id: 1, role: Role::ADMIN, kind: "users".into() };
//! assert!(registry.check(Verb::Destroy, Some(&Kind("pages")), Some(&admin)).is_ok());
//! assert!(registry.check(Verb::List, Some(&Kind("pages")), None).is_err());
//! ```

use std::fmt;

use parking_lot::RwLock;
use serde::Serialize;

use crate::error::AuthError;
use crate::principal::{Principal, Role, USER_KIND};
use crate::resource::{Resource, ANY_KIND};

/// An action requested against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    /// Matches every other verb; only used when registering abilities
    Manage,
    /// List resources of a kind (never checks ownership)
    List,
    /// Create a resource of a kind (never checks ownership)
    Create,
    /// Show one resource
    Show,
    /// Update one resource
    Update,
    /// Destroy one resource
    Destroy,
}

impl Verb {
    /// Returns true for verbs that act on an existing resource.
    ///
    /// `List` and `Create` have no particular resource to own yet.
    pub fn targets_existing(self) -> bool {
        !matches!(self, Verb::List | Verb::Create)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verb::Manage => write!(f, "manage"),
            Verb::List => write!(f, "list"),
            Verb::Create => write!(f, "create"),
            Verb::Show => write!(f, "show"),
            Verb::Update => write!(f, "update"),
            Verb::Destroy => write!(f, "destroy"),
        }
    }
}

/// A single registered grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ability {
    role: Role,
    verb: Verb,
    kind: String,
    requires_owner: bool,
}

impl Ability {
    /// Returns true if this ability lets `principal` perform `verb` on `resource`.
    fn allows(&self, verb: Verb, resource: Option<&dyn Resource>, principal: &Principal) -> bool {
        if self.role != principal.role() {
            return false;
        }

        let any_kind = self.kind == ANY_KIND;
        if !any_kind {
            match resource {
                Some(r) if r.kind() == self.kind => {}
                _ => return false,
            }
        }

        if self.verb != Verb::Manage && self.verb != verb {
            return false;
        }

        if self.checks_owner(verb) {
            return match resource {
                Some(r) => r.owned_by(principal.id()),
                None => false,
            };
        }

        true
    }

    fn checks_owner(&self, verb: Verb) -> bool {
        self.requires_owner && verb.targets_existing() && self.kind != ANY_KIND
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} can {} {}", self.role, self.verb, self.kind)?;
        if self.requires_owner {
            write!(f, " (owner)")?;
        }
        Ok(())
    }
}

/// The table of registered abilities.
///
/// Registration takes the write lock and happens at startup; checks take
/// the read lock. The table is append-only and is never exposed for
/// iteration.
#[derive(Debug, Default)]
pub struct Registry {
    abilities: RwLock<Vec<Ability>>,
}

impl Registry {
    /// Creates an empty registry. Nothing is allowed until abilities are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `role` the `verb` on every resource of `kind`.
    pub fn authorize(&self, role: Role, verb: Verb, kind: impl Into<String>) {
        self.add(role, verb, kind.into(), false);
    }

    /// Grants `role` the `verb` on resources of `kind` that the principal owns.
    ///
    /// Ownership is ignored for `List`/`Create` requests and for `ANY_KIND`.
    pub fn authorize_owner(&self, role: Role, verb: Verb, kind: impl Into<String>) {
        self.add(role, verb, kind.into(), true);
    }

    fn add(&self, role: Role, verb: Verb, kind: String, requires_owner: bool) {
        let ability = Ability {
            role,
            verb,
            kind,
            requires_owner,
        };
        tracing::debug!(ability = %ability, "registered ability");
        self.abilities.write().push(ability);
    }

    /// Returns the number of registered abilities.
    pub fn len(&self) -> usize {
        self.abilities.read().len()
    }

    /// Returns true if no abilities are registered.
    pub fn is_empty(&self) -> bool {
        self.abilities.read().is_empty()
    }

    /// Checks whether `principal` may perform `verb` on `resource`.
    ///
    /// A missing principal is treated as anonymous. A missing resource is
    /// only meaningful for `List` and `Create`; for every other verb it is
    /// always denied, even when an `ANY_KIND` ability would match.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if no registered ability matches.
    pub fn check(
        &self,
        verb: Verb,
        resource: Option<&dyn Resource>,
        principal: Option<&Principal>,
    ) -> Result<(), AuthError> {
        let anonymous = Principal::Anonymous;
        let principal = principal.unwrap_or(&anonymous);

        let denied = || AuthError {
            verb,
            kind: resource.map(|r| r.kind().to_string()).unwrap_or_default(),
            role: principal.role(),
        };

        // Acting on a specific row without naming it is a caller bug.
        if resource.is_none() && verb.targets_existing() {
            return Err(denied());
        }

        let abilities = self.abilities.read();
        if abilities.iter().any(|a| a.allows(verb, resource, principal)) {
            Ok(())
        } else {
            Err(denied())
        }
    }

    /// Checks `Verb::Manage`.
    pub fn manage(&self, resource: &dyn Resource, principal: &Principal) -> Result<(), AuthError> {
        self.check(Verb::Manage, Some(resource), Some(principal))
    }

    /// Checks `Verb::List`.
    pub fn list(&self, resource: &dyn Resource, principal: &Principal) -> Result<(), AuthError> {
        self.check(Verb::List, Some(resource), Some(principal))
    }

    /// Checks `Verb::Create`.
    pub fn create(&self, resource: &dyn Resource, principal: &Principal) -> Result<(), AuthError> {
        self.check(Verb::Create, Some(resource), Some(principal))
    }

    /// Checks `Verb::Show`.
    pub fn show(&self, resource: &dyn Resource, principal: &Principal) -> Result<(), AuthError> {
        self.check(Verb::Show, Some(resource), Some(principal))
    }

    /// Checks `Verb::Update`.
    pub fn update(&self, resource: &dyn Resource, principal: &Principal) -> Result<(), AuthError> {
        self.check(Verb::Update, Some(resource), Some(principal))
    }

    /// Checks `Verb::Destroy`.
    pub fn destroy(&self, resource: &dyn Resource, principal: &Principal) -> Result<(), AuthError> {
        self.check(Verb::Destroy, Some(resource), Some(principal))
    }
}

/// Registers the abilities every CMS deployment starts from.
///
/// Admins manage everything; editors and readers may update their own
/// user record.
pub fn register_default_abilities(registry: &Registry) {
    registry.authorize(Role::ADMIN, Verb::Manage, ANY_KIND);
    registry.authorize_owner(Role::EDITOR, Verb::Update, USER_KIND);
    registry.authorize_owner(Role::READER, Verb::Update, USER_KIND);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Kind;

    struct Doc {
        kind: &'static str,
        owner: u64,
    }

    impl Resource for Doc {
        fn kind(&self) -> &str {
            self.kind
        }

        fn owned_by(&self, user_id: u64) -> bool {
            self.owner == user_id
        }
    }

    fn user(id: u64, role: Role) -> Principal {
        Principal::Authenticated {
            id,
            role,
            kind: USER_KIND.to_string(),
        }
    }

    #[test]
    fn empty_registry_denies_everything() {
        let registry = Registry::new();
        let admin = user(1, Role::ADMIN);
        assert!(registry.check(Verb::Show, Some(&Kind("pages")), Some(&admin)).is_err());
    }

    #[test]
    fn admin_manages_any_kind_regardless_of_owner() {
        let registry = Registry::new();
        registry.authorize(Role::ADMIN, Verb::Manage, ANY_KIND);

        let admin = user(7, Role::ADMIN);
        let other_user = Doc { kind: "users", owner: 1 };

        for verb in [Verb::List, Verb::Create, Verb::Show, Verb::Update, Verb::Destroy] {
            assert!(registry.check(verb, Some(&other_user), Some(&admin)).is_ok());
        }
    }

    #[test]
    fn role_must_match_exactly() {
        let registry = Registry::new();
        registry.authorize(Role::EDITOR, Verb::Manage, "pages");

        // admin outranks editor but there is no hierarchy
        let admin = user(1, Role::ADMIN);
        let err = registry
            .check(Verb::Show, Some(&Kind("pages")), Some(&admin))
            .unwrap_err();
        assert_eq!(err.role, Role::ADMIN);
        assert_eq!(err.verb, Verb::Show);
        assert_eq!(err.kind, "pages");
    }

    #[test]
    fn kind_must_match() {
        let registry = Registry::new();
        registry.authorize(Role::EDITOR, Verb::Manage, "pages");

        let editor = user(2, Role::EDITOR);
        assert!(registry.check(Verb::Update, Some(&Kind("pages")), Some(&editor)).is_ok());
        assert!(registry.check(Verb::Update, Some(&Kind("posts")), Some(&editor)).is_err());
    }

    #[test]
    fn verb_must_match_unless_manage() {
        let registry = Registry::new();
        registry.authorize(Role::READER, Verb::Show, "posts");

        let reader = user(3, Role::READER);
        assert!(registry.show(&Kind("posts"), &reader).is_ok());
        assert!(registry.update(&Kind("posts"), &reader).is_err());
    }

    #[test]
    fn owner_ability_requires_ownership() {
        let registry = Registry::new();
        registry.authorize_owner(Role::READER, Verb::Update, "users");

        let reader = user(5, Role::READER);
        let own = Doc { kind: "users", owner: 5 };
        let other = Doc { kind: "users", owner: 6 };

        assert!(registry.update(&own, &reader).is_ok());
        assert!(registry.update(&other, &reader).is_err());
    }

    #[test]
    fn owner_ability_skips_ownership_for_list_and_create() {
        let registry = Registry::new();
        registry.authorize_owner(Role::EDITOR, Verb::Manage, "images");

        let editor = user(4, Role::EDITOR);
        let not_owned = Doc { kind: "images", owner: 99 };

        assert!(registry.list(&not_owned, &editor).is_ok());
        assert!(registry.create(&not_owned, &editor).is_ok());
        assert!(registry.show(&not_owned, &editor).is_err());
    }

    #[test]
    fn owner_flag_is_ignored_for_any_kind() {
        let registry = Registry::new();
        registry.authorize_owner(Role::EDITOR, Verb::Show, ANY_KIND);

        let editor = user(4, Role::EDITOR);
        let not_owned = Doc { kind: "pages", owner: 99 };
        assert!(registry.show(&not_owned, &editor).is_ok());
    }

    #[test]
    fn missing_principal_is_anonymous() {
        let registry = Registry::new();
        assert!(registry.check(Verb::List, Some(&Kind("users")), None).is_err());

        registry.authorize(Role::ANON, Verb::List, "pages");
        assert!(registry.check(Verb::List, Some(&Kind("pages")), None).is_ok());
    }

    #[test]
    fn missing_resource_fails_closed_for_specific_verbs() {
        let registry = Registry::new();
        registry.authorize(Role::ADMIN, Verb::Manage, ANY_KIND);
        let admin = user(1, Role::ADMIN);

        assert!(registry.check(Verb::List, None, Some(&admin)).is_ok());
        assert!(registry.check(Verb::Create, None, Some(&admin)).is_ok());
        assert!(registry.check(Verb::Update, None, Some(&admin)).is_err());
        assert!(registry.check(Verb::Destroy, None, Some(&admin)).is_err());
    }

    #[test]
    fn missing_resource_never_matches_specific_kind() {
        let registry = Registry::new();
        registry.authorize(Role::EDITOR, Verb::List, "pages");
        let editor = user(2, Role::EDITOR);

        assert!(registry.check(Verb::List, None, Some(&editor)).is_err());
    }

    #[test]
    fn default_abilities() {
        let registry = Registry::new();
        register_default_abilities(&registry);
        assert_eq!(registry.len(), 3);

        let editor = user(8, Role::EDITOR);
        assert!(registry.update(&editor, &editor).is_ok());
        assert!(registry.destroy(&editor, &editor).is_err());

        let someone_else = user(9, Role::READER);
        assert!(registry.update(&someone_else, &editor).is_err());
    }

    #[test]
    fn ability_display() {
        let ability = Ability {
            role: Role::READER,
            verb: Verb::Update,
            kind: "users".to_string(),
            requires_owner: true,
        };
        assert_eq!(ability.to_string(), "reader can update users (owner)");
    }
}
