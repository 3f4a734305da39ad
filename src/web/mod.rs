//! Web framework integration surface.
//!
//! This module is the boundary between HTTP frameworks and the session,
//! token and authorization core. It handles:
//! - Mapping HTTP requests to a framework-neutral [`RequestAdapter`]
//! - Collecting `Set-Cookie` output in a [`ResponseAdapter`]
//! - Running the per-request checks through [`Guard`]
//!
//! # Design Principles
//!
//! 1. **No Framework Dependencies**: Adapters hold plain owned data. The
//!    only framework glue shipped here targets the `http` crate types.
//!
//! 2. **Fixed Order**: [`Guard::admit`] is the only way to obtain an
//!    [`Admission`], and authorization requires one.
//!
//! 3. **Explicit Context**: No globals. The registry, store and keys live in
//!    the `Guard`; per-request state lives in the adapter's context.
//!
//! # Example Flow
//!
//! ```ignore
//! // In a framework-specific integration (e.g., axum, hyper):
//! let mut request = RequestAdapter::from_http(&http_request, &request_id)?;
//! let mut response = ResponseAdapter::new();
//!
//! let admission = guard.admit(&mut request, &mut response)?;
//! guard.authorize(&admission, &request, Verb::Update, Some(&page))?;
//!
//! // ... business logic, then copy cookies onto the framework response
//! response.apply_to(http_response.headers_mut())?;
//! ```

mod adapter;
mod cookie;
pub mod example_handler;
mod extract;
mod method;
mod middleware;

pub use adapter::{RequestAdapter, ResponseAdapter};
pub use cookie::{parse_cookie_header, SetCookie, COOKIE_LIFETIME_SECONDS};
pub use extract::ExtractAdapter;
pub use method::{HttpMethod, UnknownMethod};
pub use middleware::{Admission, Guard};
