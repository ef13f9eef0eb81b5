//! Location source boundary
//!
//! Platform providers implement `LocationSource`. Fixes are pushed into a
//! bounded channel owned by the consumer instead of an open callback
//! registry; when the consumer is busy the newest fix is dropped.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::location::coordinate::LocationSample;

/// Producer half handed to a source on `start`
#[derive(Debug, Clone)]
pub struct LocationListener {
    tx: mpsc::Sender<LocationSample>,
}

impl LocationListener {
    /// Create a listener and the receiver its samples arrive on
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<LocationSample>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Hand a sample to the consumer without blocking
    ///
    /// Returns false only once the consumer has gone away.
    pub fn deliver(&self, sample: LocationSample) -> bool {
        match self.tx.try_send(sample) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                tracing::debug!(
                    "Consumer busy, dropping fix at {}ms",
                    dropped.timestamp.as_millis()
                );
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A provider of position fixes
///
/// Implementations use interior mutability so one source can be shared
/// between the lifecycle owner and whoever reads `last_known`.
pub trait LocationSource: Send + Sync {
    /// Begin delivering fixes to `listener`. No-op if already started.
    fn start(&self, listener: LocationListener);

    /// Stop delivering. After this returns the listener is never invoked
    /// again. Safe to call when not started.
    fn stop(&self);

    /// Most recent fix, if any. Absence is a steady state, not an error.
    fn last_known(&self) -> Option<LocationSample>;

    fn is_running(&self) -> bool;
}

/// Outcome of the platform readiness check (services, settings)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionStatus {
    Satisfied,
    /// The platform can fix it with user interaction; the handle is opaque
    Resolvable(String),
    Unavailable(String),
}

impl PreconditionStatus {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, PreconditionStatus::Satisfied)
    }
}

/// Platform readiness check consumed before starting updates
pub trait Preconditions: Send + Sync {
    fn check_preconditions(&self) -> PreconditionStatus;
}

/// Preconditions that always pass (desktop, replay, tests)
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSatisfied;

impl Preconditions for AlwaysSatisfied {
    fn check_preconditions(&self) -> PreconditionStatus {
        PreconditionStatus::Satisfied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Timestamp;
    use crate::location::coordinate::Coordinate;

    fn sample(ms: u64) -> LocationSample {
        LocationSample::new(Coordinate::new(50.0, 2.0), Timestamp(ms))
    }

    #[test]
    fn test_deliver_drops_when_full() {
        let (listener, mut rx) = LocationListener::channel(1);
        assert!(listener.deliver(sample(1)));
        assert!(listener.deliver(sample(2)));
        assert_eq!(rx.try_recv().unwrap().timestamp, Timestamp(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_deliver_reports_closed_consumer() {
        let (listener, rx) = LocationListener::channel(4);
        drop(rx);
        assert!(listener.is_closed());
        assert!(!listener.deliver(sample(1)));
    }

    #[test]
    fn test_precondition_status() {
        assert!(AlwaysSatisfied.check_preconditions().is_satisfied());
        assert!(!PreconditionStatus::Resolvable("settings".into()).is_satisfied());
    }
}
