/// Ability kind that matches every resource kind.
///
/// Ownership is never checked for abilities registered on `ANY_KIND`.
pub const ANY_KIND: &str = "*";

/// Anything an ability can be checked against.
///
/// The registry never looks inside a resource; it only asks what kind it is
/// and whether a given user owns it.
///
/// # Examples
///
/// ```
/// use cms_guard::Resource;
///
/// struct Page {
///     author_id: u64,
/// }
///
/// impl Resource for Page {
///     fn kind(&self) -> &str {
///         "pages"
///     }
///
///     fn owned_by(&self, user_id: u64) -> bool {
///         user_id != 0 && self.author_id == user_id
///     }
/// }
///
/// let page = Page { author_id: 3 };
/// assert!(page.owned_by(3));
/// assert!(!page.owned_by(4));
/// ```
pub trait Resource {
    /// Stable name matched against ability kinds, usually the table name.
    fn kind(&self) -> &str;

    /// Returns true if `user_id` owns this resource.
    fn owned_by(&self, user_id: u64) -> bool;
}

/// A resource known only by its kind, owned by nobody.
///
/// Useful for `List` and `Create` checks where no row exists yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kind<'a>(pub &'a str);

impl Resource for Kind<'_> {
    fn kind(&self) -> &str {
        self.0
    }

    fn owned_by(&self, _user_id: u64) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_never_owned() {
        let pages = Kind("pages");
        assert_eq!(pages.kind(), "pages");
        assert!(!pages.owned_by(0));
        assert!(!pages.owned_by(1));
    }
}
