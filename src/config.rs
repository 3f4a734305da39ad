//! Startup configuration.
//!
//! Settings are read from TOML. Keys are hex strings in the file and are
//! decoded, length-checked and moved into [`Secret`] wrappers by
//! [`Config::validate`]. Anything missing or short aborts startup.

use std::path::Path;

use serde::Deserialize;

use crate::crypto::{self, KEY_LEN};
use crate::error::ConfigError;
use crate::secret::Secret;

/// Default upper bound on an encoded session cookie.
pub const DEFAULT_MAX_COOKIE_BYTES: usize = 4096;

/// Default cryptographic lifetime of a session: 60 days.
pub const DEFAULT_MAX_SESSION_AGE_SECONDS: i64 = 86_400 * 60;

/// Raw configuration as it appears in the config file.
///
/// # Examples
///
/// ```
/// use cms_guard::Config;
///
/// let config = Config::parse(r#"
///     hmac_key = "1111111111111111111111111111111111111111111111111111111111111111"
///     aead_key = "2222222222222222222222222222222222222222222222222222222222222222"
///     session_name = "app_session"
/// "#).unwrap();
///
/// let settings = config.validate().unwrap();
/// assert_eq!(settings.session_name, "app_session");
/// assert_eq!(settings.max_cookie_bytes, 4096);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Hex-encoded 32-byte MAC key
    #[serde(default)]
    pub hmac_key: Option<String>,
    /// Hex-encoded 32-byte AES-GCM key
    #[serde(default, alias = "secret_key")]
    pub aead_key: Option<String>,
    /// Name of the session cookie
    #[serde(default)]
    pub session_name: Option<String>,
    /// Whether cookies carry the `Secure` attribute
    #[serde(default)]
    pub secure_cookies: bool,
    /// Maximum encoded cookie length
    #[serde(default = "default_max_cookie_bytes")]
    pub max_cookie_bytes: usize,
    /// Maximum accepted session age
    #[serde(default = "default_max_session_age")]
    pub max_session_age_seconds: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hmac_key: None,
            aead_key: None,
            session_name: None,
            secure_cookies: false,
            max_cookie_bytes: DEFAULT_MAX_COOKIE_BYTES,
            max_session_age_seconds: DEFAULT_MAX_SESSION_AGE_SECONDS,
        }
    }
}

fn default_max_cookie_bytes() -> usize {
    DEFAULT_MAX_COOKIE_BYTES
}

fn default_max_session_age() -> i64 {
    DEFAULT_MAX_SESSION_AGE_SECONDS
}

impl Config {
    /// Reads and parses a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parses TOML config text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Checks every setting and decodes the keys.
    ///
    /// # Errors
    ///
    /// Fails if either key is missing, not hex, or not exactly 32 bytes, if
    /// the session name is empty, or if the max session age is negative.
    pub fn validate(&self) -> Result<SessionSettings, ConfigError> {
        let hmac_key = decode_key("hmac_key", self.hmac_key.as_deref())?;
        let aead_key = decode_key("aead_key", self.aead_key.as_deref())?;

        let session_name = match self.session_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(ConfigError::EmptySessionName),
        };

        if self.max_session_age_seconds < 0 {
            return Err(ConfigError::NegativeMaxAge(self.max_session_age_seconds));
        }

        Ok(SessionSettings {
            hmac_key,
            aead_key,
            session_name,
            secure_cookies: self.secure_cookies,
            max_cookie_bytes: self.max_cookie_bytes,
            max_session_age_seconds: self.max_session_age_seconds,
        })
    }

    /// Generates a fresh pair of hex keys for a new deployment.
    ///
    /// Returns `(hmac_key, aead_key)`.
    pub fn generate_keys() -> (String, String) {
        (
            crypto::encode_hex(&crypto::random_bytes(KEY_LEN)),
            crypto::encode_hex(&crypto::random_bytes(KEY_LEN)),
        )
    }
}

fn decode_key(name: &'static str, value: Option<&str>) -> Result<Secret<[u8; KEY_LEN]>, ConfigError> {
    let value = match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => return Err(ConfigError::MissingKey(name)),
    };

    let mut bytes = crypto::decode_hex(value).ok_or(ConfigError::InvalidHex(name))?;
    if bytes.len() != KEY_LEN {
        let actual = bytes.len();
        zeroize::Zeroize::zeroize(&mut bytes);
        return Err(ConfigError::KeyLength {
            name,
            expected: KEY_LEN,
            actual,
        });
    }

    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&bytes);
    zeroize::Zeroize::zeroize(&mut bytes);
    Ok(Secret::new(key))
}

/// Validated settings, ready to build a session codec.
#[derive(Debug)]
pub struct SessionSettings {
    /// MAC key
    pub hmac_key: Secret<[u8; KEY_LEN]>,
    /// AES-GCM key
    pub aead_key: Secret<[u8; KEY_LEN]>,
    /// Cookie name
    pub session_name: String,
    /// Emit the `Secure` attribute
    pub secure_cookies: bool,
    /// Maximum encoded cookie length, 0 disables the check
    pub max_cookie_bytes: usize,
    /// Maximum accepted session age, 0 disables the check
    pub max_session_age_seconds: i64,
}

impl SessionSettings {
    /// Builds settings directly from raw keys with default limits.
    pub fn new(hmac_key: [u8; KEY_LEN], aead_key: [u8; KEY_LEN], session_name: impl Into<String>) -> Self {
        Self {
            hmac_key: Secret::new(hmac_key),
            aead_key: Secret::new(aead_key),
            session_name: session_name.into(),
            secure_cookies: false,
            max_cookie_bytes: DEFAULT_MAX_COOKIE_BYTES,
            max_session_age_seconds: DEFAULT_MAX_SESSION_AGE_SECONDS,
        }
    }
}
