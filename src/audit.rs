//! Security event logging.
//!
//! This module provides:
//! - `SecurityEvent`: structured event schema
//! - `AuditTrail`: thread-safe in-memory recorder
//! - `emit`: writes an event through `tracing` under the [`AUDIT_TARGET`] target
//!
//! Events only carry ids, roles, methods, paths and log-only reasons.

mod event;
mod trail;

pub use event::{AuditOutcome, SecurityEvent, SecurityEventKind};
pub use trail::AuditTrail;

/// `tracing` target of every security event.
pub const AUDIT_TARGET: &str = "cms_guard::audit";

/// Emits `event` as a structured `tracing` event.
///
/// Successes are logged at info level, everything else at warn.
pub fn emit(event: &SecurityEvent) {
    match event.outcome() {
        AuditOutcome::Success => tracing::info!(
            target: AUDIT_TARGET,
            request_id = %event.request_id(),
            kind = %event.kind(),
            outcome = %event.outcome(),
            user_id = ?event.user_id(),
            role = ?event.role().map(|r| r.0),
            method = ?event.method(),
            path = ?event.path(),
            reason = ?event.reason(),
            "security event"
        ),
        AuditOutcome::Denied | AuditOutcome::Error => tracing::warn!(
            target: AUDIT_TARGET,
            request_id = %event.request_id(),
            kind = %event.kind(),
            outcome = %event.outcome(),
            user_id = ?event.user_id(),
            role = ?event.role().map(|r| r.0),
            method = ?event.method(),
            path = ?event.path(),
            reason = ?event.reason(),
            "security event"
        ),
    }
}

/// Emits `event` and records it into `trail` when one is given.
pub fn emit_to(trail: Option<&AuditTrail>, event: SecurityEvent) {
    emit(&event);
    if let Some(trail) = trail {
        trail.record(event);
    }
}
