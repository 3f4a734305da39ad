//! Conversions between the `http` crate and the adapters.

use http::header::{HeaderMap, HeaderValue, InvalidHeaderValue, CONTENT_TYPE, SET_COOKIE};

use super::{HttpMethod, RequestAdapter, ResponseAdapter, UnknownMethod};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Builds a [`RequestAdapter`] from a framework request type.
///
/// Implemented for `http::Request<B>` with any byte body, which covers
/// frameworks built on the `http` crate once the body has been collected.
///
/// # Examples
///
/// ```
/// use cms_guard::web::{ExtractAdapter, HttpMethod};
///
/// let request = http::Request::post("/pages/create")
///     .header("content-type", "application/x-www-form-urlencoded")
///     .header("cookie", "app_session=abc")
///     .body("title=Home&authenticity_token=xyz".to_string())
///     .unwrap();
///
/// let adapter = request.extract_adapter("req-1").unwrap();
/// assert_eq!(adapter.method(), HttpMethod::Post);
/// assert_eq!(adapter.cookie("app_session"), Some("abc"));
/// assert_eq!(adapter.submitted_token(), Some("xyz"));
/// ```
pub trait ExtractAdapter {
    /// Extracts the guard's view of the request.
    ///
    /// # Errors
    ///
    /// Fails for methods outside [`HttpMethod`].
    fn extract_adapter(&self, request_id: &str) -> Result<RequestAdapter, UnknownMethod>;
}

impl<B: AsRef<[u8]>> ExtractAdapter for http::Request<B> {
    fn extract_adapter(&self, request_id: &str) -> Result<RequestAdapter, UnknownMethod> {
        let method: HttpMethod = self.method().as_str().parse()?;
        let mut adapter = RequestAdapter::new(request_id, method, self.uri().path());

        for (name, value) in self.headers() {
            // non-UTF-8 header values cannot carry anything the guard reads
            if let Ok(value) = value.to_str() {
                adapter.add_header(name.as_str(), value);
            }
        }

        if is_form(self.headers()) {
            if let Ok(body) = std::str::from_utf8(self.body().as_ref()) {
                adapter.set_form_body(body);
            }
        }

        Ok(adapter)
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
        .unwrap_or(false)
}

impl RequestAdapter {
    /// Shorthand for [`ExtractAdapter::extract_adapter`].
    pub fn from_http<B: AsRef<[u8]>>(request: &http::Request<B>, request_id: &str) -> Result<Self, UnknownMethod> {
        request.extract_adapter(request_id)
    }
}

impl ResponseAdapter {
    /// Appends one `Set-Cookie` header per pending cookie.
    ///
    /// # Errors
    ///
    /// Fails if a rendered cookie is not a valid header value.
    pub fn apply_to(&self, headers: &mut HeaderMap) -> Result<(), InvalidHeaderValue> {
        for value in self.set_cookie_headers() {
            headers.append(SET_COOKIE, HeaderValue::from_str(&value)?);
        }
        Ok(())
    }
}
