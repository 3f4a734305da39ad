//! Encrypted, MAC-authenticated cookie sessions.
//!
//! The whole session lives in one cookie. Its value is
//!
//! ```text
//! base64url( timestamp "|" base64url(nonce || ciphertext) "|" hmac )
//! ```
//!
//! where the MAC covers `name|timestamp|base64url(nonce || ciphertext)`. The
//! cookie name takes part in the MAC but is not sent, so a value cannot be
//! replayed under another cookie name.
//!
//! Decoding never fails loudly. A cookie that is oversized, malformed,
//! forged, expired or undecryptable yields an empty [`Session`] marked with
//! an [`InvalidSession`], and callers treat it exactly like no cookie at all.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;

use crate::config::{Config, SessionSettings};
use crate::crypto;
use crate::error::{ConfigError, EncodingError, Error};
use crate::web::{RequestAdapter, ResponseAdapter, SetCookie};

/// Session key holding the decimal user id.
pub const USER_KEY: &str = "uid";

/// Session key holding the base64 authenticity token secret.
pub const TOKEN_KEY: &str = "tok";

/// A string map carried in the session cookie.
///
/// Values are always strings. Numeric ids are stored as decimal ASCII.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    values: BTreeMap<String, String>,
    modified: bool,
    cleared: bool,
    invalid: Option<InvalidSession>,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session holding `values`, as decoded from a cookie.
    pub fn from_values(values: BTreeMap<String, String>) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    /// Creates an empty session that records why the cookie was rejected.
    pub fn invalid(reason: InvalidSession) -> Self {
        Self {
            invalid: Some(reason),
            ..Self::default()
        }
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Stores `value` under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
        self.modified = true;
        self.cleared = false;
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.modified = true;
        }
        removed
    }

    /// Drops every value and marks the session for deletion.
    ///
    /// Writing a cleared session emits an expired, empty cookie.
    pub fn clear(&mut self) {
        self.values.clear();
        self.modified = true;
        self.cleared = true;
    }

    /// Returns the session values.
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Returns the number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the session holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns true if the session changed since it was decoded.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Returns true if [`clear`](Self::clear) was called.
    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Returns why the incoming cookie was rejected, if it was.
    pub fn invalid_reason(&self) -> Option<&InvalidSession> {
        self.invalid.as_ref()
    }

    /// Returns the user id in [`USER_KEY`], 0 when absent or not a number.
    pub fn user_id(&self) -> u64 {
        self.get(USER_KEY)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
    }

    /// Stores `id` in [`USER_KEY`].
    pub fn set_user_id(&mut self, id: u64) {
        self.set(USER_KEY, id.to_string());
    }
}

// Values may hold the token secret, so only keys are printed.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .field("modified", &self.modified)
            .field("cleared", &self.cleared)
            .field("invalid", &self.invalid)
            .finish()
    }
}

/// Why a session cookie was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidSession {
    /// The raw cookie exceeds the size limit
    TooLarge,
    /// A base64 layer did not decode
    Base64,
    /// The payload does not have three `|`-separated parts
    Format,
    /// The MAC did not verify
    Mac,
    /// The timestamp is not a number
    Timestamp,
    /// The session is older than the max age
    Expired,
    /// AES-GCM rejected the ciphertext
    Decrypt,
    /// The plaintext is not a serialized string map
    Deserialize,
}

impl fmt::Display for InvalidSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidSession::TooLarge => write!(f, "cookie too large"),
            InvalidSession::Base64 => write!(f, "invalid base64"),
            InvalidSession::Format => write!(f, "malformed payload"),
            InvalidSession::Mac => write!(f, "mac mismatch"),
            InvalidSession::Timestamp => write!(f, "invalid timestamp"),
            InvalidSession::Expired => write!(f, "session expired"),
            InvalidSession::Decrypt => write!(f, "decryption failed"),
            InvalidSession::Deserialize => write!(f, "undecodable values"),
        }
    }
}

fn mac_input(name: &str, timestamp: &[u8], ciphertext_b64: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(name.len() + timestamp.len() + ciphertext_b64.len() + 2);
    input.extend_from_slice(name.as_bytes());
    input.push(b'|');
    input.extend_from_slice(timestamp);
    input.push(b'|');
    input.extend_from_slice(ciphertext_b64);
    input
}

/// Encodes `values` into a cookie value stamped with `now`.
///
/// `max_bytes` of 0 disables the size check.
///
/// # Errors
///
/// [`EncodingError::EmptyName`] for an empty name, [`EncodingError::TooLarge`]
/// if the result exceeds `max_bytes`, and [`crate::CryptoError`] for a bad key.
pub fn encode_cookie(
    name: &str,
    values: &BTreeMap<String, String>,
    hmac_key: &[u8],
    aead_key: &[u8],
    now: i64,
    max_bytes: usize,
) -> Result<String, Error> {
    if name.is_empty() {
        return Err(EncodingError::EmptyName.into());
    }

    let plaintext = crypto::serialize(values)?;
    let ciphertext = crypto::encrypt(&plaintext, aead_key)?;
    let ciphertext_b64 = crypto::encode_base64(&ciphertext);
    let timestamp = now.to_string();

    let mac = crypto::hmac_sha256(
        &mac_input(name, timestamp.as_bytes(), ciphertext_b64.as_bytes()),
        hmac_key,
    )?;

    let mut payload = Vec::with_capacity(timestamp.len() + ciphertext_b64.len() + mac.len() + 2);
    payload.extend_from_slice(timestamp.as_bytes());
    payload.push(b'|');
    payload.extend_from_slice(ciphertext_b64.as_bytes());
    payload.push(b'|');
    payload.extend_from_slice(&mac);

    let encoded = crypto::encode_base64(&payload);
    if max_bytes > 0 && encoded.len() > max_bytes {
        return Err(EncodingError::TooLarge {
            len: encoded.len(),
            max: max_bytes,
        }
        .into());
    }
    Ok(encoded)
}

/// Decodes a cookie value produced by [`encode_cookie`].
///
/// `max_age` and `max_bytes` of 0 disable the corresponding check. A
/// negative `max_age` rejects every cookie as expired.
///
/// # Errors
///
/// Returns the first check that failed. No partial values are ever returned.
pub fn decode_cookie(
    name: &str,
    raw: &str,
    hmac_key: &[u8],
    aead_key: &[u8],
    now: i64,
    max_age: i64,
    max_bytes: usize,
) -> Result<BTreeMap<String, String>, InvalidSession> {
    if max_bytes > 0 && raw.len() > max_bytes {
        return Err(InvalidSession::TooLarge);
    }

    let payload = crypto::decode_base64(raw.as_bytes()).ok_or(InvalidSession::Base64)?;

    let mut parts = payload.splitn(3, |b| *b == b'|');
    let (timestamp, ciphertext_b64, mac) = match (parts.next(), parts.next(), parts.next()) {
        (Some(t), Some(c), Some(m)) => (t, c, m),
        _ => return Err(InvalidSession::Format),
    };

    if !crypto::verify_hmac(&mac_input(name, timestamp, ciphertext_b64), mac, hmac_key) {
        return Err(InvalidSession::Mac);
    }

    let issued: i64 = std::str::from_utf8(timestamp)
        .ok()
        .and_then(|t| t.parse().ok())
        .ok_or(InvalidSession::Timestamp)?;
    if max_age < 0 || (max_age > 0 && now.saturating_sub(issued) > max_age) {
        return Err(InvalidSession::Expired);
    }

    let ciphertext = crypto::decode_base64(ciphertext_b64).ok_or(InvalidSession::Base64)?;
    let plaintext = crypto::decrypt(&ciphertext, aead_key).map_err(|_| InvalidSession::Decrypt)?;
    crypto::deserialize(&plaintext).ok_or(InvalidSession::Deserialize)
}

/// Reads and writes session cookies with one set of keys and limits.
#[derive(Debug)]
pub struct SessionCodec {
    settings: SessionSettings,
}

impl SessionCodec {
    /// Creates a codec from validated settings.
    pub fn new(settings: SessionSettings) -> Self {
        Self { settings }
    }

    /// Validates `config` and creates a codec from it.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(config.validate()?))
    }

    /// Returns the cookie name.
    pub fn name(&self) -> &str {
        &self.settings.session_name
    }

    /// Returns the settings.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Encodes `session` stamped with `now`.
    pub fn encode(&self, session: &Session, now: i64) -> Result<String, Error> {
        encode_cookie(
            &self.settings.session_name,
            session.values(),
            self.settings.hmac_key.expose_secret(),
            self.settings.aead_key.expose_secret(),
            now,
            self.settings.max_cookie_bytes,
        )
    }

    /// Decodes a raw cookie value as of `now`.
    ///
    /// Never fails; a rejected cookie becomes an empty, invalid-marked session.
    pub fn decode(&self, raw: &str, now: i64) -> Session {
        match decode_cookie(
            &self.settings.session_name,
            raw,
            self.settings.hmac_key.expose_secret(),
            self.settings.aead_key.expose_secret(),
            now,
            self.settings.max_session_age_seconds,
            self.settings.max_cookie_bytes,
        ) {
            Ok(values) => Session::from_values(values),
            Err(reason) => Session::invalid(reason),
        }
    }

    /// Reads the session cookie from `request`.
    pub fn read_session(&self, request: &RequestAdapter) -> Session {
        self.read_session_at(request, Utc::now().timestamp())
    }

    /// Reads the session cookie from `request` as of `now`.
    ///
    /// A missing or empty cookie yields a fresh session without a marker.
    pub fn read_session_at(&self, request: &RequestAdapter, now: i64) -> Session {
        match request.cookie(self.name()) {
            Some(raw) if !raw.is_empty() => self.decode(raw, now),
            _ => Session::new(),
        }
    }

    /// Writes `session` to `response` as a single `Set-Cookie`.
    pub fn write_session(&self, response: &mut ResponseAdapter, session: &Session) -> Result<(), Error> {
        self.write_session_at(response, session, Utc::now().timestamp())
    }

    /// Writes `session` to `response` stamped with `now`.
    ///
    /// A cleared session is written as a removal cookie.
    ///
    /// # Errors
    ///
    /// Fails if the session cannot be encoded. Nothing is written then.
    pub fn write_session_at(&self, response: &mut ResponseAdapter, session: &Session, now: i64) -> Result<(), Error> {
        if session.is_cleared() {
            self.clear_session(response);
            return Ok(());
        }

        let value = self.encode(session, now)?;
        let issued = chrono::DateTime::from_timestamp(now, 0).unwrap_or_else(Utc::now);
        response.set_cookie(SetCookie::session(
            self.name(),
            value,
            issued,
            self.settings.secure_cookies,
        ));
        Ok(())
    }

    /// Tells the client to drop its session cookie.
    pub fn clear_session(&self, response: &mut ResponseAdapter) {
        response.set_cookie(SetCookie::removal(self.name(), self.settings.secure_cookies));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::HttpMethod;

    const HMAC_KEY: [u8; 32] = [0x01; 32];
    const AEAD_KEY: [u8; 32] = [0x02; 32];
    const NOW: i64 = 1_700_000_000;
    const SIXTY_DAYS: i64 = 5_184_000;

    fn values() -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();
        values.insert(USER_KEY.to_string(), "42".to_string());
        values.insert("flash".to_string(), "saved".to_string());
        values
    }

    fn encode(values: &BTreeMap<String, String>) -> String {
        encode_cookie("app_session", values, &HMAC_KEY, &AEAD_KEY, NOW, 4096).unwrap()
    }

    fn decode(raw: &str, now: i64) -> Result<BTreeMap<String, String>, InvalidSession> {
        decode_cookie("app_session", raw, &HMAC_KEY, &AEAD_KEY, now, SIXTY_DAYS, 4096)
    }

    fn codec() -> SessionCodec {
        SessionCodec::new(SessionSettings::new(HMAC_KEY, AEAD_KEY, "app_session"))
    }

    #[test]
    fn round_trip() {
        let cookie = encode(&values());
        assert_eq!(decode(&cookie, NOW).unwrap(), values());
    }

    #[test]
    fn empty_map_round_trips() {
        let cookie = encode(&BTreeMap::new());
        assert!(decode(&cookie, NOW).unwrap().is_empty());
    }

    #[test]
    fn name_is_not_in_cookie_but_is_authenticated() {
        let cookie = encode(&values());
        let payload = crypto::decode_base64(cookie.as_bytes()).unwrap();
        assert!(payload.starts_with(NOW.to_string().as_bytes()));

        let other_name = decode_cookie("other", &cookie, &HMAC_KEY, &AEAD_KEY, NOW, SIXTY_DAYS, 4096);
        assert_eq!(other_name, Err(InvalidSession::Mac));
    }

    #[test]
    fn flipped_last_character_is_rejected() {
        let cookie = encode(&values());
        let mut bytes = cookie.into_bytes();
        let last = bytes.len() - 1;
        bytes[last] = if bytes[last] == b'A' { b'B' } else { b'A' };
        let forged = String::from_utf8(bytes).unwrap();

        assert!(decode(&forged, NOW).is_err());
    }

    #[test]
    fn wrong_keys_are_rejected() {
        let cookie = encode(&values());
        assert_eq!(
            decode_cookie("app_session", &cookie, &[9; 32], &AEAD_KEY, NOW, SIXTY_DAYS, 4096),
            Err(InvalidSession::Mac)
        );
        assert_eq!(
            decode_cookie("app_session", &cookie, &HMAC_KEY, &[9; 32], NOW, SIXTY_DAYS, 4096),
            Err(InvalidSession::Decrypt)
        );
    }

    #[test]
    fn age_boundary() {
        let cookie = encode(&values());
        assert!(decode(&cookie, NOW + SIXTY_DAYS).is_ok());
        assert_eq!(decode(&cookie, NOW + SIXTY_DAYS + 1), Err(InvalidSession::Expired));
    }

    #[test]
    fn zero_max_age_disables_expiry() {
        let cookie = encode(&values());
        let decoded = decode_cookie("app_session", &cookie, &HMAC_KEY, &AEAD_KEY, NOW * 2, 0, 4096);
        assert!(decoded.is_ok());
    }

    #[test]
    fn negative_max_age_expires_everything() {
        let cookie = encode(&values());
        let fresh = decode_cookie("app_session", &cookie, &HMAC_KEY, &AEAD_KEY, NOW, -1, 4096);
        assert_eq!(fresh, Err(InvalidSession::Expired));

        let ten_years = NOW + 10 * 365 * 86_400;
        let old = decode_cookie("app_session", &cookie, &HMAC_KEY, &AEAD_KEY, ten_years, -1, 4096);
        assert_eq!(old, Err(InvalidSession::Expired));
    }

    #[test]
    fn oversized_input_is_rejected_before_decoding() {
        let raw = "A".repeat(4097);
        assert_eq!(decode(&raw, NOW), Err(InvalidSession::TooLarge));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(decode("not base64!", NOW), Err(InvalidSession::Base64));
        let no_pipes = crypto::encode_base64(b"no separators here");
        assert_eq!(decode(&no_pipes, NOW), Err(InvalidSession::Format));
    }

    #[test]
    fn encode_enforces_size_limit() {
        let mut big = BTreeMap::new();
        big.insert("blob".to_string(), "x".repeat(4000));

        let err = encode_cookie("app_session", &big, &HMAC_KEY, &AEAD_KEY, NOW, 4096).unwrap_err();
        assert!(matches!(err, Error::Encoding(EncodingError::TooLarge { max: 4096, .. })));
    }

    #[test]
    fn encode_rejects_empty_name() {
        let err = encode_cookie("", &values(), &HMAC_KEY, &AEAD_KEY, NOW, 4096).unwrap_err();
        assert!(matches!(err, Error::Encoding(EncodingError::EmptyName)));
    }

    #[test]
    fn session_tracks_modification() {
        let mut session = Session::from_values(values());
        assert!(!session.is_modified());
        assert_eq!(session.user_id(), 42);

        session.set("flash", "gone");
        assert!(session.is_modified());

        session.clear();
        assert!(session.is_cleared());
        assert!(session.is_empty());
        assert_eq!(session.user_id(), 0);
    }

    #[test]
    fn user_id_ignores_garbage() {
        let mut session = Session::new();
        session.set(USER_KEY, "seven");
        assert_eq!(session.user_id(), 0);
        session.set_user_id(7);
        assert_eq!(session.get(USER_KEY), Some("7"));
    }

    #[test]
    fn debug_hides_values() {
        let mut session = Session::new();
        session.set(TOKEN_KEY, "very-secret-value");
        let debug = format!("{:?}", session);
        assert!(debug.contains("tok"));
        assert!(!debug.contains("very-secret-value"));
    }

    #[test]
    fn codec_writes_and_reads_back() {
        let codec = codec();
        let mut session = Session::new();
        session.set_user_id(9);

        let mut response = ResponseAdapter::new();
        codec.write_session_at(&mut response, &session, NOW).unwrap();
        let cookie = response.cookie(codec.name()).unwrap().clone();
        assert!(!cookie.is_removal());

        let mut request = RequestAdapter::new("req-1", HttpMethod::Get, "/");
        request.add_cookie(codec.name(), cookie.value());
        let read = codec.read_session_at(&request, NOW + 10);
        assert_eq!(read.user_id(), 9);
        assert!(read.invalid_reason().is_none());
    }

    #[test]
    fn codec_marks_invalid_cookie() {
        let codec = codec();
        let mut request = RequestAdapter::new("req-1", HttpMethod::Get, "/");
        request.add_cookie(codec.name(), "forged");

        let session = codec.read_session_at(&request, NOW);
        assert!(session.is_empty());
        assert!(session.invalid_reason().is_some());
    }

    #[test]
    fn missing_cookie_is_a_clean_session() {
        let codec = codec();
        let request = RequestAdapter::new("req-1", HttpMethod::Get, "/");
        let session = codec.read_session_at(&request, NOW);
        assert!(session.is_empty());
        assert!(session.invalid_reason().is_none());
    }

    #[test]
    fn cleared_session_writes_removal_cookie() {
        let codec = codec();
        let mut session = Session::from_values(values());
        session.clear();

        let mut response = ResponseAdapter::new();
        codec.write_session_at(&mut response, &session, NOW).unwrap();
        assert!(response.cookie(codec.name()).unwrap().is_removal());
        assert_eq!(response.set_cookie_headers().len(), 1);
    }
}
