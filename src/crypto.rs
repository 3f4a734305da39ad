//! Encoding and cryptographic primitives.
//!
//! Every other module goes through these functions for AEAD, MACs, random
//! bytes and the byte encodings used on the wire. Nothing else in the crate
//! touches a cipher directly.

use std::collections::BTreeMap;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{CryptoError, EncodingError};

type HmacSha256 = Hmac<Sha256>;

/// Required length of both the HMAC and the AEAD key.
pub const KEY_LEN: usize = 32;

/// Length of the AES-GCM nonce prepended to every ciphertext.
pub const NONCE_LEN: usize = 12;

/// Length of an HMAC-SHA256 tag.
pub const MAC_LEN: usize = 32;

/// Encrypts `plaintext` with AES-256-GCM under `key`.
///
/// A fresh 12-byte nonce is drawn for every call and prepended to the
/// ciphertext, so the output is `nonce || ciphertext || tag`.
///
/// # Errors
///
/// Returns [`CryptoError::KeyLength`] if `key` is not 32 bytes.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher_for(key)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::Encrypt)?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypts the output of [`encrypt`].
///
/// GCM authenticates the ciphertext, so any modification of the nonce, body
/// or tag fails here.
///
/// # Errors
///
/// Returns [`CryptoError::KeyLength`] for a bad key and
/// [`CryptoError::Decrypt`] for truncated or tampered input.
pub fn decrypt(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher_for(key)?;
    if ciphertext.len() < NONCE_LEN {
        return Err(CryptoError::Decrypt);
    }
    let (nonce, body) = ciphertext.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), body)
        .map_err(|_| CryptoError::Decrypt)
}

fn cipher_for(key: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::KeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        });
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::KeyLength {
        expected: KEY_LEN,
        actual: key.len(),
    })
}

/// Computes HMAC-SHA256 of `message` under `key`.
///
/// # Errors
///
/// HMAC accepts keys of any length; the error path exists only because the
/// underlying constructor is fallible.
pub fn hmac_sha256(message: &[u8], key: &[u8]) -> Result<[u8; MAC_LEN], CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| CryptoError::KeyLength {
        expected: KEY_LEN,
        actual: key.len(),
    })?;
    mac.update(message);

    let mut out = [0u8; MAC_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Returns true if `mac` is the HMAC-SHA256 of `message` under `key`.
///
/// The comparison is constant time.
pub fn verify_hmac(message: &[u8], mac: &[u8], key: &[u8]) -> bool {
    match hmac_sha256(message, key) {
        Ok(expected) => constant_time_eq(&expected, mac),
        Err(_) => false,
    }
}

/// Compares two byte strings in time independent of their contents.
///
/// Slices of different length compare unequal.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Fills a new buffer of `n` bytes from the operating system RNG.
///
/// # Panics
///
/// Panics if the OS RNG is unavailable. There is no safe way to continue
/// without randomness, so this is deliberately not recoverable.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    buf
}

/// Encodes bytes as padded URL-safe base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    URL_SAFE.encode(bytes)
}

/// Decodes padded URL-safe base64.
///
/// Non-canonical input (wrong padding, stray trailing bits) is rejected.
pub fn decode_base64(encoded: &[u8]) -> Option<Vec<u8>> {
    URL_SAFE.decode(encoded).ok()
}

/// Encodes bytes as lowercase hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decodes hex of either case.
pub fn decode_hex(encoded: &str) -> Option<Vec<u8>> {
    hex::decode(encoded).ok()
}

/// Serializes a session map.
///
/// `BTreeMap` keeps keys ordered, so equal maps always produce equal bytes.
pub fn serialize(values: &BTreeMap<String, String>) -> Result<Vec<u8>, EncodingError> {
    bincode::serialize(values).map_err(|e| EncodingError::Serialize(e.to_string()))
}

/// Deserializes the output of [`serialize`].
pub fn deserialize(bytes: &[u8]) -> Option<BTreeMap<String, String>> {
    bincode::deserialize(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x11; 32];

    #[test]
    fn encrypt_then_decrypt_recovers_plaintext() {
        let sealed = encrypt(b"hello session", &KEY).unwrap();
        assert_eq!(decrypt(&sealed, &KEY).unwrap(), b"hello session");
    }

    #[test]
    fn encrypt_uses_fresh_nonce() {
        let a = encrypt(b"same", &KEY).unwrap();
        let b = encrypt(b"same", &KEY).unwrap();
        assert_ne!(a, b);
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
    }

    #[test]
    fn encrypt_rejects_short_key() {
        let err = encrypt(b"data", &[0u8; 16]).unwrap_err();
        assert_eq!(
            err,
            CryptoError::KeyLength {
                expected: 32,
                actual: 16
            }
        );
    }

    #[test]
    fn decrypt_rejects_tampered_ciphertext() {
        let mut sealed = encrypt(b"payload", &KEY).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert_eq!(decrypt(&sealed, &KEY), Err(CryptoError::Decrypt));
    }

    #[test]
    fn decrypt_rejects_wrong_key() {
        let sealed = encrypt(b"payload", &KEY).unwrap();
        assert_eq!(decrypt(&sealed, &[0x22; 32]), Err(CryptoError::Decrypt));
    }

    #[test]
    fn decrypt_rejects_truncated_input() {
        assert_eq!(decrypt(&[0u8; 5], &KEY), Err(CryptoError::Decrypt));
    }

    #[test]
    fn hmac_matches_known_vector() {
        // RFC 4231 test case 2
        let mac = hmac_sha256(b"what do ya want for nothing?", b"Jefe").unwrap();
        assert_eq!(
            encode_hex(&mac),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn verify_hmac_accepts_only_matching_tag() {
        let mac = hmac_sha256(b"message", &KEY).unwrap();
        assert!(verify_hmac(b"message", &mac, &KEY));
        assert!(!verify_hmac(b"messagE", &mac, &KEY));
        assert!(!verify_hmac(b"message", &mac[..31], &KEY));
    }

    #[test]
    fn constant_time_eq_handles_lengths() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn random_bytes_has_requested_length() {
        let a = random_bytes(32);
        let b = random_bytes(32);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn base64_is_url_safe_and_strict() {
        let encoded = encode_base64(&[0xfb, 0xff, 0xfe]);
        assert_eq!(encoded, "-__-");
        assert_eq!(decode_base64(encoded.as_bytes()).unwrap(), vec![0xfb, 0xff, 0xfe]);
        assert!(decode_base64(b"not base64!").is_none());
        // "QQ==" is canonical for "A"; "QR==" carries stray trailing bits
        assert_eq!(decode_base64(b"QQ==").unwrap(), b"A");
        assert!(decode_base64(b"QR==").is_none());
    }

    #[test]
    fn hex_accepts_both_cases() {
        assert_eq!(decode_hex("ABcd").unwrap(), vec![0xab, 0xcd]);
        assert!(decode_hex("xyz").is_none());
        assert_eq!(encode_hex(&[0xab, 0xcd]), "abcd");
    }

    #[test]
    fn serialize_is_deterministic() {
        let mut a = BTreeMap::new();
        a.insert("uid".to_string(), "7".to_string());
        a.insert("tok".to_string(), "abc".to_string());

        let mut b = BTreeMap::new();
        b.insert("tok".to_string(), "abc".to_string());
        b.insert("uid".to_string(), "7".to_string());

        let bytes = serialize(&a).unwrap();
        assert_eq!(bytes, serialize(&b).unwrap());
        assert_eq!(deserialize(&bytes).unwrap(), a);
    }

    #[test]
    fn deserialize_rejects_garbage() {
        assert!(deserialize(&[0xff; 3]).is_none());
    }
}
