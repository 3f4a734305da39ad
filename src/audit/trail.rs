//! In-memory security event recorder.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::{SecurityEvent, SecurityEventKind};

/// Thread-safe in-memory recorder for security events.
///
/// The guard records into a shared trail when one is attached. Tests use it
/// to assert on what happened.
///
/// A trail built with [`AuditTrail::new`] grows without limit, so
/// long-running applications must [`drain`](AuditTrail::drain) it regularly
/// or use [`AuditTrail::bounded`], which evicts the oldest events first.
///
/// # Example
///
/// ```
/// use cms_guard::audit::{AuditTrail, SecurityEvent, SecurityEventKind};
///
/// let trail = AuditTrail::new();
/// trail.record(SecurityEvent::new("req-123", SecurityEventKind::Logout));
///
/// assert_eq!(trail.len(), 1);
/// assert_eq!(trail.count(SecurityEventKind::Logout), 1);
/// ```
#[derive(Debug, Default)]
pub struct AuditTrail {
    events: Mutex<VecDeque<SecurityEvent>>,
    capacity: Option<usize>,
}

impl AuditTrail {
    /// Creates a new empty, unbounded trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a trail that keeps at most `capacity` events.
    ///
    /// Once full, recording an event evicts the oldest one. A capacity of 0
    /// keeps nothing.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: Some(capacity),
        }
    }

    /// Returns the maximum number of events kept, if bounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Records an event. Events are kept in recording order.
    pub fn record(&self, event: SecurityEvent) {
        let mut events = self.events.lock();
        if let Some(capacity) = self.capacity {
            if capacity == 0 {
                return;
            }
            while events.len() >= capacity {
                events.pop_front();
            }
        }
        events.push_back(event);
    }

    /// Returns a snapshot of all recorded events.
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Returns how many events of `kind` were recorded.
    pub fn count(&self, kind: SecurityEventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }

    /// Removes and returns all recorded events.
    pub fn drain(&self) -> Vec<SecurityEvent> {
        self.events.lock().drain(..).collect()
    }

    /// Returns the number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if no events have been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn trail_starts_empty() {
        let trail = AuditTrail::new();
        assert!(trail.is_empty());
        assert_eq!(trail.len(), 0);
    }

    #[test]
    fn trail_keeps_order() {
        let trail = AuditTrail::new();
        trail.record(SecurityEvent::new("req-1", SecurityEventKind::LoginFailed));
        trail.record(SecurityEvent::new("req-2", SecurityEventKind::LoginSucceeded));

        let events = trail.events();
        assert_eq!(events[0].request_id(), "req-1");
        assert_eq!(events[1].request_id(), "req-2");
        assert_eq!(trail.count(SecurityEventKind::LoginFailed), 1);
    }

    #[test]
    fn drain_empties_trail() {
        let trail = AuditTrail::new();
        trail.record(SecurityEvent::new("req-1", SecurityEventKind::AccessDenied));

        assert_eq!(trail.drain().len(), 1);
        assert!(trail.is_empty());
    }

    #[test]
    fn bounded_trail_evicts_oldest() {
        let trail = AuditTrail::bounded(2);
        trail.record(SecurityEvent::new("req-1", SecurityEventKind::LoginFailed));
        trail.record(SecurityEvent::new("req-2", SecurityEventKind::LoginFailed));
        trail.record(SecurityEvent::new("req-3", SecurityEventKind::LoginSucceeded));

        let events = trail.events();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail.capacity(), Some(2));
        assert_eq!(events[0].request_id(), "req-2");
        assert_eq!(events[1].request_id(), "req-3");
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let trail = AuditTrail::bounded(0);
        trail.record(SecurityEvent::new("req-1", SecurityEventKind::Logout));
        assert!(trail.is_empty());
    }

    #[test]
    fn unbounded_trail_has_no_capacity() {
        assert_eq!(AuditTrail::new().capacity(), None);
    }

    #[test]
    fn trail_is_shared_across_threads() {
        let trail = Arc::new(AuditTrail::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let trail = Arc::clone(&trail);
                thread::spawn(move || {
                    trail.record(SecurityEvent::new(format!("req-{}", i), SecurityEventKind::TokenRejected));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(trail.count(SecurityEventKind::TokenRejected), 4);
    }
}
