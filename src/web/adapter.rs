//! Framework-neutral request and response views.

use std::collections::HashMap;

use crate::context::RequestContext;
use crate::logging::RequestLog;
use crate::token::TOKEN_FIELD;

use super::cookie::{parse_cookie_header, SetCookie};
use super::HttpMethod;

/// The parts of an HTTP request the guard needs.
///
/// `RequestAdapter` owns plain data so it does not tie the crate to a web
/// framework. Framework glue fills it from its own request type (see
/// [`ExtractAdapter`](super::ExtractAdapter) for the `http` crate) and
/// then passes it through [`Guard::admit`](super::Guard::admit).
///
/// Header names are matched case-insensitively. Query parameters are not
/// collected: authenticity tokens must never travel in the URL.
///
/// # Examples
///
/// ```
/// use cms_guard::web::{HttpMethod, RequestAdapter};
///
/// let mut request = RequestAdapter::new("req-12345", HttpMethod::Post, "/pages/create");
/// request.add_header("Cookie", "app_session=abc; theme=dark");
/// request.set_form_body("title=Hello+world&authenticity_token=t0k%3D");
///
/// assert_eq!(request.cookie("theme"), Some("dark"));
/// assert_eq!(request.form_value("title"), Some("Hello world"));
/// assert_eq!(request.submitted_token(), Some("t0k="));
/// ```
#[derive(Debug, Clone)]
pub struct RequestAdapter {
    request_id: String,
    method: HttpMethod,
    path: String,
    headers: HashMap<String, String>,
    cookies: HashMap<String, String>,
    form: HashMap<String, String>,
    context: RequestContext,
}

impl RequestAdapter {
    /// Creates an adapter with no headers, cookies or form fields.
    pub fn new(request_id: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            method,
            path: path.into(),
            headers: HashMap::new(),
            cookies: HashMap::new(),
            form: HashMap::new(),
            context: RequestContext::new(),
        }
    }

    /// Adds a header. A `Cookie` header is also split into cookies.
    pub fn add_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref().to_ascii_lowercase();
        let value = value.into();
        if name == "cookie" {
            for (cookie_name, cookie_value) in parse_cookie_header(&value) {
                self.cookies.entry(cookie_name).or_insert(cookie_value);
            }
        }
        self.headers.insert(name, value);
    }

    /// Adds a single cookie.
    pub fn add_cookie(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    /// Adds a decoded form field.
    pub fn add_form_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.form.insert(name.into(), value.into());
    }

    /// Parses an `application/x-www-form-urlencoded` body into form fields.
    ///
    /// Pairs that fail to percent-decode are skipped.
    pub fn set_form_body(&mut self, body: &str) {
        for pair in body.split('&').filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            if let (Some(name), Some(value)) = (decode_form_component(name), decode_form_component(value)) {
                self.form.insert(name, value);
            }
        }
    }

    /// Returns the request ID.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Returns the request path without query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Returns a cookie value by name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Returns a form field by name.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form.get(name).map(String::as_str)
    }

    /// Returns the submitted authenticity token.
    ///
    /// The form field wins over the header of the same name.
    pub fn submitted_token(&self) -> Option<&str> {
        self.form_value(TOKEN_FIELD).or_else(|| self.header(TOKEN_FIELD))
    }

    /// Returns true for GET requests outside the asset and file trees.
    ///
    /// Only these responses get a freshly minted token.
    pub fn wants_token(&self) -> bool {
        self.method == HttpMethod::Get && !is_static_path(&self.path)
    }

    /// Returns the per-request context.
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub(crate) fn context_mut(&mut self) -> &mut RequestContext {
        &mut self.context
    }

    /// Returns a logger bound to this request's ID.
    pub fn log(&self) -> RequestLog<'_> {
        RequestLog::new(&self.request_id)
    }
}

fn is_static_path(path: &str) -> bool {
    path.starts_with("/assets") || path.starts_with("/files")
}

fn decode_form_component(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).ok().map(|s| s.into_owned())
}

/// Cookies to send with the response.
///
/// At most one cookie per name is kept; setting a name again replaces the
/// earlier value, so a response never carries two session cookies.
#[derive(Debug, Clone, Default)]
pub struct ResponseAdapter {
    cookies: Vec<SetCookie>,
}

impl ResponseAdapter {
    /// Creates an empty response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a cookie, replacing any earlier cookie with the same name.
    pub fn set_cookie(&mut self, cookie: SetCookie) {
        self.cookies.retain(|c| c.name() != cookie.name());
        self.cookies.push(cookie);
    }

    /// Returns the pending cookie named `name`.
    pub fn cookie(&self, name: &str) -> Option<&SetCookie> {
        self.cookies.iter().find(|c| c.name() == name)
    }

    /// Returns all pending cookies.
    pub fn cookies(&self) -> &[SetCookie] {
        &self.cookies
    }

    /// Renders each pending cookie as a `Set-Cookie` header value.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.cookies.iter().map(ToString::to_string).collect()
    }
}
