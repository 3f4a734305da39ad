use std::fmt;

/// A logger bound to one request.
///
/// `RequestLog` is obtained from [`RequestAdapter::log`](crate::web::RequestAdapter::log)
/// and borrows the request id, so it cannot outlive the request.
///
/// Keys are wrapped in [`Secret`](crate::Secret) and session values are never
/// logged, so formatting arguments passed here stay free of key material.
///
/// All log messages automatically include the request ID for tracing.
#[derive(Debug, Clone, Copy)]
pub struct RequestLog<'a> {
    request_id: &'a str,
}

impl<'a> RequestLog<'a> {
    /// Creates a logger for `request_id`.
    ///
    /// This is `pub(crate)` - only the request adapter hands these out.
    pub(crate) fn new(request_id: &'a str) -> Self {
        Self { request_id }
    }

    /// Returns the request ID associated with this logger.
    pub fn request_id(&self) -> &str {
        self.request_id
    }

    /// Logs an info-level message with request ID.
    ///
    /// Use with `format_args!` for efficient formatting:
    /// ```
    /// # use cms_guard::web::{HttpMethod, RequestAdapter};
    /// let request = RequestAdapter::new("req-1", HttpMethod::Get, "/pages");
    /// request.log().info(format_args!("rendering {}", request.path()));
    /// ```
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a warning-level message with request ID.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(request_id = %self.request_id, "{}", args);
    }

    /// Logs an error-level message with request ID.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a debug-level message with request ID.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, "{}", args);
    }
}
