use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::authorize::Verb;
use crate::principal::Role;

/// Errors that can cross the boundary between the core and request handlers.
///
/// Every variant maps to exactly one HTTP status via [`Error::status`]. Messages
/// shown to end users come from [`Error::public_message`]; the `Display` output
/// of the inner error is meant for server-side logs only.
#[derive(Debug, Error)]
pub enum Error {
    /// Key material or AEAD failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// The session could not be encoded into a cookie
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// The submitted authenticity token did not verify
    #[error(transparent)]
    Token(#[from] TokenError),
    /// No registered ability allows the action
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Startup configuration is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Credentials were rejected
    #[error(transparent)]
    Login(#[from] LoginError),
}

impl Error {
    /// Returns the HTTP status the handler layer must respond with.
    pub fn status(&self) -> u16 {
        match self {
            Error::Crypto(_) | Error::Encoding(_) | Error::Config(_) => 500,
            Error::Token(_) | Error::Auth(_) => 403,
            Error::Login(LoginError::Hash) => 500,
            Error::Login(_) => 401,
        }
    }

    /// Returns a fixed message that is safe to show to end users.
    pub fn public_message(&self) -> &'static str {
        match self {
            Error::Crypto(_) | Error::Encoding(_) | Error::Config(_) => "Internal server error",
            Error::Token(_) => "Your session has expired, please reload the page and try again",
            Error::Auth(_) => "You are not authorized to do that",
            Error::Login(LoginError::AlreadyAuthenticated) => "You are already logged in",
            Error::Login(LoginError::Hash) => "Internal server error",
            Error::Login(_) => "Sorry, that email and password combination was not recognised",
        }
    }
}

/// Failures in the encryption and MAC primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// A key was not the required length
    #[error("key must be {expected} bytes, got {actual}")]
    KeyLength {
        /// Required key length
        expected: usize,
        /// Supplied key length
        actual: usize,
    },
    /// AES-GCM refused to seal the plaintext
    #[error("encryption failed")]
    Encrypt,
    /// Ciphertext was truncated or failed GCM authentication
    #[error("decryption failed")]
    Decrypt,
}

/// Failures while turning a session into a cookie value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// The cookie name is empty
    #[error("session cookie name is empty")]
    EmptyName,
    /// The encoded cookie exceeds the configured size budget
    #[error("encoded session is {len} bytes, limit is {max}")]
    TooLarge {
        /// Encoded length
        len: usize,
        /// Configured maximum
        max: usize,
    },
    /// The session map could not be serialized
    #[error("session serialization failed: {0}")]
    Serialize(String),
}

/// Why a submitted authenticity token was rejected.
///
/// Only for logs. Users see the same message for every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFailure {
    /// The request carried no token
    Missing,
    /// The session holds no token secret
    NoSecret,
    /// The token was not valid base64
    Malformed,
    /// The decoded token had the wrong length
    Length(usize),
    /// The unmasked token did not match the session secret
    Mismatch,
}

impl fmt::Display for TokenFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenFailure::Missing => write!(f, "no token submitted"),
            TokenFailure::NoSecret => write!(f, "no token secret in session"),
            TokenFailure::Malformed => write!(f, "token is not valid base64"),
            TokenFailure::Length(len) => write!(f, "token has invalid length {}", len),
            TokenFailure::Mismatch => write!(f, "token does not match session secret"),
        }
    }
}

/// The authenticity token check failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid authenticity token")]
pub struct TokenError {
    failure: TokenFailure,
}

impl TokenError {
    pub(crate) fn new(failure: TokenFailure) -> Self {
        Self { failure }
    }

    /// Returns the underlying reason, for server-side logging.
    pub fn failure(&self) -> TokenFailure {
        self.failure
    }
}

/// No registered ability allows `role` to perform `verb` on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not authorized to {verb} {kind} with role {role}")]
pub struct AuthError {
    /// The requested verb
    pub verb: Verb,
    /// The resource kind, or empty when no resource was given
    pub kind: String,
    /// The principal's role
    pub role: Role,
}

/// The configuration could not be turned into usable settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was read
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this schema
    #[error("failed to parse config: {message}")]
    Parse {
        /// Parser message
        message: String,
    },
    /// A required key is absent or empty
    #[error("missing required key `{0}`")]
    MissingKey(&'static str),
    /// A key is not valid hex
    #[error("key `{0}` is not valid hex")]
    InvalidHex(&'static str),
    /// A key decoded to the wrong length
    #[error("key `{name}` must be {expected} bytes, got {actual}")]
    KeyLength {
        /// Setting name
        name: &'static str,
        /// Required length
        expected: usize,
        /// Decoded length
        actual: usize,
    },
    /// `session_name` is empty
    #[error("session_name must not be empty")]
    EmptySessionName,
    /// `max_session_age_seconds` is negative
    #[error("max_session_age_seconds must not be negative, got {0}")]
    NegativeMaxAge(i64),
}

/// Login failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    /// The request already carries an authenticated principal
    #[error("already logged in")]
    AlreadyAuthenticated,
    /// No user has this email
    #[error("unknown email")]
    UnknownEmail,
    /// The password did not match the stored hash
    #[error("wrong password")]
    WrongPassword,
    /// The password could not be hashed or the stored hash is malformed
    #[error("password hashing failed")]
    Hash,
}
