//! `Cookie` request header parsing and `Set-Cookie` rendering.

use std::fmt;

use chrono::{DateTime, Utc};
use cookie::time::{Duration, OffsetDateTime};
use cookie::Cookie;

/// Lifetime a browser keeps the session cookie.
///
/// Shorter than the cryptographic max age, so clients cycle the cookie
/// regularly. Both bounds must hold for a session to be accepted.
pub const COOKIE_LIFETIME_SECONDS: i64 = 7 * 86_400;

/// A cookie to be sent back in a `Set-Cookie` header.
///
/// Every cookie written here is `HttpOnly` with `Path=/`.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use cms_guard::web::SetCookie;
///
/// let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let header = SetCookie::session("app_session", "abc=", now, true).to_string();
///
/// assert!(header.starts_with("app_session=abc=;"));
/// assert!(header.contains("; Path=/"));
/// assert!(header.contains("; Max-Age=604800"));
/// assert!(header.contains("; Expires=Mon, 08 Jan 2024 00:00:00 GMT"));
/// assert!(header.contains("; HttpOnly"));
/// assert!(header.contains("; Secure"));
/// ```
#[derive(Debug, Clone)]
pub struct SetCookie {
    inner: Cookie<'static>,
}

impl SetCookie {
    /// Builds a session cookie that expires [`COOKIE_LIFETIME_SECONDS`] after `now`.
    pub fn session(name: impl Into<String>, value: impl Into<String>, now: DateTime<Utc>, secure: bool) -> Self {
        let lifetime = Duration::seconds(COOKIE_LIFETIME_SECONDS);
        let expires = OffsetDateTime::from_unix_timestamp(now.timestamp())
            .ok()
            .map(|issued| issued + lifetime);
        Self::build(name.into(), value.into(), expires, lifetime, secure)
    }

    /// Builds a cookie that tells the browser to drop `name` immediately.
    pub fn removal(name: impl Into<String>, secure: bool) -> Self {
        Self::build(
            name.into(),
            String::new(),
            Some(OffsetDateTime::UNIX_EPOCH),
            Duration::ZERO,
            secure,
        )
    }

    fn build(name: String, value: String, expires: Option<OffsetDateTime>, max_age: Duration, secure: bool) -> Self {
        let inner = Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .secure(secure)
            .expires(expires)
            .max_age(max_age)
            .build();
        Self { inner }
    }

    /// Returns the cookie name.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the cookie value.
    pub fn value(&self) -> &str {
        self.inner.value()
    }

    /// Returns the `Max-Age` in seconds.
    pub fn max_age(&self) -> i64 {
        self.inner.max_age().map_or(0, |age| age.whole_seconds())
    }

    /// Returns the `Expires` instant, if one is set.
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        let at = self.inner.expires_datetime()?;
        DateTime::from_timestamp(at.unix_timestamp(), 0)
    }

    /// Returns true if the cookie carries the `Secure` attribute.
    pub fn is_secure(&self) -> bool {
        self.inner.secure().unwrap_or(false)
    }

    /// Returns true if this cookie deletes the one already stored.
    pub fn is_removal(&self) -> bool {
        self.max_age() <= 0
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

/// Splits a `Cookie` request header into name/value pairs.
///
/// Malformed pairs are skipped. Surrounding double quotes are stripped
/// from values.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    Cookie::split_parse(header)
        .filter_map(Result::ok)
        .map(|cookie| (cookie.name().to_string(), cookie.value_trimmed().to_string()))
        .collect()
}
