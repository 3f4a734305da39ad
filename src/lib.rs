//! Request security core for server-rendered CMS applications.
//!
//! This crate provides the pieces a web handler needs before it may touch
//! content on behalf of a visitor:
//! - **Cookie sessions**: a small string map, encrypted and MACed, stored
//!   only in the client's cookie and expired by age
//! - **Authenticity tokens**: masked anti-forgery tokens minted on HTML
//!   GETs and verified on every unsafe method
//! - **Abilities**: role/verb/kind rules with optional ownership checks
//! - **Request binding**: a [`web::Guard`] that runs the checks in a fixed
//!   order and hands out an [`web::Admission`]
//!
//! # Core Types
//!
//! - [`Session`] and [`SessionCodec`]: cookie envelope and its encoder
//! - [`token::TokenSecret`]: per-session secret behind the masked tokens
//! - [`Registry`]: the ability table, checked with [`Registry::check`]
//! - [`Principal`]: the current user or [`Principal::Anonymous`]
//! - [`Secret<T>`]: wrapper that redacts and zeroizes key material
//!
//! # Examples
//!
//! ```
//! use cms_guard::{Kind, Principal, Registry, Role, Verb};
//!
//! let registry = Registry::new();
//! registry.authorize(Role::ANON, Verb::List, "pages");
//!
//! let anon = Principal::Anonymous;
//! assert!(registry.list(&Kind("pages"), &anon).is_ok());
//! assert!(registry.destroy(&Kind("pages"), &anon).is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
mod authorize;
mod config;
mod context;
pub mod crypto;
mod error;
mod logging;
mod password;
mod principal;
mod resource;
mod secret;
mod session;
pub mod token;
pub mod web;

pub use authorize::{register_default_abilities, Ability, Registry, Verb};
pub use config::{Config, SessionSettings, DEFAULT_MAX_COOKIE_BYTES, DEFAULT_MAX_SESSION_AGE_SECONDS};
pub use context::{RequestContext, TemplateContext, AUTHENTICITY_TOKEN_KEY, CURRENT_USER_KEY};
pub use error::{
    AuthError, ConfigError, CryptoError, EncodingError, Error, LoginError, TokenError, TokenFailure,
};
pub use logging::RequestLog;
pub use password::{check_password, hash_password};
pub use principal::{
    load_principal, LookupError, MemoryStore, Principal, PrincipalStore, Role, UserRecord, USER_KIND,
};
pub use resource::{Kind, Resource, ANY_KIND};
pub use secret::Secret;
pub use session::{
    decode_cookie, encode_cookie, InvalidSession, Session, SessionCodec, TOKEN_KEY, USER_KEY,
};
