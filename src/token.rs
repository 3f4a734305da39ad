//! Masked anti-forgery tokens.
//!
//! Each session holds a 32-byte secret under [`TOKEN_KEY`]. Every minted
//! token is `pad || (pad XOR secret)` with a fresh random pad, so no two
//! responses carry the same bytes while the server stores nothing beyond
//! the session cookie.
//!
//! # Examples
//!
//! ```
//! use cms_guard::token::{mint, verify, TokenSecret};
//!
//! let secret = TokenSecret::generate();
//! let first = mint(&secret);
//! let second = mint(&secret);
//!
//! assert_ne!(first, second);
//! assert!(verify(&first, &secret).is_ok());
//! assert!(verify(&second, &TokenSecret::generate()).is_err());
//! ```

use std::fmt;

use crate::crypto;
use crate::error::{TokenError, TokenFailure};
use crate::secret::Secret;
use crate::session::{Session, TOKEN_KEY};

/// Length of the per-session secret and of the pad.
pub const SECRET_LEN: usize = 32;

/// Length of a decoded masked token.
pub const MASKED_LEN: usize = SECRET_LEN * 2;

/// Form field and header name carrying the token.
pub const TOKEN_FIELD: &str = "authenticity_token";

/// The per-session token secret.
pub struct TokenSecret {
    bytes: Secret<[u8; SECRET_LEN]>,
}

impl TokenSecret {
    /// Draws a fresh secret from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_LEN];
        bytes.copy_from_slice(&crypto::random_bytes(SECRET_LEN));
        Self::from_bytes(bytes)
    }

    /// Wraps existing secret bytes.
    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Self {
            bytes: Secret::new(bytes),
        }
    }

    /// Parses the base64 form stored in the session.
    ///
    /// Returns `None` unless the value decodes to exactly 32 bytes.
    pub fn from_session_value(value: &str) -> Option<Self> {
        let decoded = crypto::decode_base64(value.as_bytes())?;
        if decoded.len() != SECRET_LEN {
            return None;
        }
        let mut bytes = [0u8; SECRET_LEN];
        bytes.copy_from_slice(&decoded);
        Some(Self::from_bytes(bytes))
    }

    /// Returns the base64 form stored in the session.
    pub fn to_session_value(&self) -> String {
        crypto::encode_base64(self.bytes.expose_secret())
    }

    fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        self.bytes.expose_secret()
    }
}

impl fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TokenSecret").field(&self.bytes).finish()
    }
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

/// Masks `secret` with a fresh pad and returns the base64 token.
pub fn mint(secret: &TokenSecret) -> String {
    let pad = crypto::random_bytes(SECRET_LEN);
    let mut token = Vec::with_capacity(MASKED_LEN);
    token.extend_from_slice(&pad);
    token.extend_from_slice(&xor(&pad, secret.as_bytes()));
    crypto::encode_base64(&token)
}

/// Checks a submitted token against `secret`.
///
/// # Errors
///
/// Returns [`TokenError`] if the token is not base64, is not 64 bytes, or
/// does not unmask to `secret`.
pub fn verify(submitted: &str, secret: &TokenSecret) -> Result<(), TokenError> {
    let token = crypto::decode_base64(submitted.as_bytes())
        .ok_or_else(|| TokenError::new(TokenFailure::Malformed))?;
    if token.len() != MASKED_LEN {
        return Err(TokenError::new(TokenFailure::Length(token.len())));
    }

    let (pad, masked) = token.split_at(SECRET_LEN);
    let candidate = xor(pad, masked);
    if crypto::constant_time_eq(&candidate, secret.as_bytes()) {
        Ok(())
    } else {
        Err(TokenError::new(TokenFailure::Mismatch))
    }
}

/// Returns the session's token secret, creating and storing one if needed.
///
/// A stored value that does not parse is replaced.
pub fn session_secret(session: &mut Session) -> TokenSecret {
    if let Some(secret) = session.get(TOKEN_KEY).and_then(TokenSecret::from_session_value) {
        return secret;
    }
    let secret = TokenSecret::generate();
    session.set(TOKEN_KEY, secret.to_session_value());
    secret
}

/// Mints a token for `session`, generating its secret on first use.
///
/// The session is marked modified when a secret was created; the caller
/// must write it back.
pub fn mint_token(session: &mut Session) -> String {
    mint(&session_secret(session))
}

/// Verifies `submitted` against the secret stored in `session`.
///
/// # Errors
///
/// Every failure is a [`TokenError`]; the reason is only for logs.
pub fn verify_token(session: &Session, submitted: Option<&str>) -> Result<(), TokenError> {
    let submitted = match submitted {
        Some(token) if !token.is_empty() => token,
        _ => return Err(TokenError::new(TokenFailure::Missing)),
    };
    let secret = session
        .get(TOKEN_KEY)
        .and_then(TokenSecret::from_session_value)
        .ok_or_else(|| TokenError::new(TokenFailure::NoSecret))?;
    verify(submitted, &secret)
}
