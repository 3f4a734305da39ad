use std::fmt;

use zeroize::Zeroize;

/// A wrapper that keeps key material out of logs and wipes it on drop.
///
/// `Secret<T>` holds the HMAC and AEAD keys loaded at startup. Its `Debug`
/// and `Display` output is always `[REDACTED]`, and the inner value is zeroed
/// when the wrapper is dropped. The value is only reachable through
/// [`expose_secret`](Self::expose_secret).
///
/// # Examples
///
/// ```
/// use cms_guard::Secret;
///
/// let key = Secret::new([7u8; 32]);
///
/// assert_eq!(format!("{:?}", key), "[REDACTED]");
/// assert_eq!(key.expose_secret()[0], 7);
/// ```
// Do NOT derive Clone, Copy or Default: copies would escape zeroization.
pub struct Secret<T: Zeroize> {
    // Must stay private, the only access path is expose_secret().
    inner: T,
}

impl<T: Zeroize> Secret<T> {
    /// Wraps a sensitive value.
    pub fn new(value: T) -> Self {
        Self { inner: value }
    }

    /// Explicitly exposes the secret value.
    ///
    /// The name is verbose on purpose. Never log or display the result.
    pub fn expose_secret(&self) -> &T {
        &self.inner
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

// Do NOT implement Deref, AsRef or Borrow. expose_secret() is the only way in.

impl<T: Zeroize> fmt::Debug for Secret<T> {
    /// Must unconditionally print "[REDACTED]" (CWE-532).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_redacts_debug() {
        let key = Secret::new(*b"0123456789abcdef0123456789abcdef");
        let debug_output = format!("{:?}", key);

        assert_eq!(debug_output, "[REDACTED]");
        assert!(!debug_output.contains("0123"));
        assert!(!debug_output.contains("u8")); // No type leak
    }

    #[test]
    fn secret_redacts_display() {
        let password = Secret::new("hunter2".to_string());
        let display_output = format!("{}", password);

        assert_eq!(display_output, "[REDACTED]");
        assert!(!display_output.contains("hunter2"));
    }

    #[test]
    fn secret_exposes_when_explicit() {
        let key = Secret::new([42u8; 32]);
        assert_eq!(key.expose_secret(), &[42u8; 32]);
    }

    #[test]
    fn secret_redacts_inside_containers() {
        let keys = vec![Secret::new([1u8; 32]), Secret::new([2u8; 32])];
        assert_eq!(format!("{:?}", keys), "[[REDACTED], [REDACTED]]");
    }
}
