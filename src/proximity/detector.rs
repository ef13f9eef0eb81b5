//! Dwell-gated proximity detection
//!
//! Each sample is checked against every POI in catalog order. A POI whose
//! radius contains the sample gets a dwell timer; leaving the radius removes
//! the timer outright (no hysteresis). The first POI whose timer has run for
//! at least its minimum dwell is reported, and nothing more is reported
//! until the caller clears the current nearby POI.

use ahash::AHashMap;

use crate::catalog::{PoiCatalog, PointOfInterest};
use crate::core::types::{PoiId, Timestamp};
use crate::location::coordinate::LocationSample;

/// First-seen-within-radius timestamp per POI
#[derive(Debug, Clone, Default)]
pub struct ProximityTimer {
    first_seen: AHashMap<PoiId, Timestamp>,
}

impl ProximityTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock if it is not already running; returns the start time
    pub fn enter(&mut self, id: &PoiId, now: Timestamp) -> Timestamp {
        *self.first_seen.entry(id.clone()).or_insert(now)
    }

    /// Drop the clock; dwell restarts from zero on the next entry
    pub fn exit(&mut self, id: &PoiId) -> bool {
        self.first_seen.remove(id).is_some()
    }

    pub fn first_seen(&self, id: &PoiId) -> Option<Timestamp> {
        self.first_seen.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.first_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.first_seen.clear();
    }
}

/// Stateful detector fed one sample at a time
#[derive(Debug, Default)]
pub struct ProximityDetector {
    timer: ProximityTimer,
    current_nearby: Option<PoiId>,
}

impl ProximityDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one sample; returns the newly nearby POI, if any
    ///
    /// Malformed samples are logged and ignored. Dwell timers are updated for
    /// every POI even while a nearby POI is outstanding.
    pub fn on_location_sample(
        &mut self,
        sample: &LocationSample,
        catalog: &PoiCatalog,
    ) -> Option<PointOfInterest> {
        if let Err(e) = sample.validate() {
            tracing::warn!("Dropping malformed sample: {}", e);
            return None;
        }

        let now = sample.timestamp;
        let mut candidate: Option<&PointOfInterest> = None;

        for poi in catalog.iter() {
            if !poi.is_user_nearby(&sample.coordinate) {
                if self.timer.exit(&poi.id) {
                    tracing::debug!("Left {} radius, dwell reset", poi.id);
                }
                continue;
            }

            let since = self.timer.enter(&poi.id, now);
            let elapsed = now.millis_since(since);
            if candidate.is_none() && elapsed >= poi.min_dwell_millis() {
                candidate = Some(poi);
            }
        }

        if self.current_nearby.is_some() {
            return None;
        }

        let poi = candidate?;
        tracing::debug!(
            "Dwell satisfied for {} after {}ms",
            poi.id,
            now.millis_since(self.timer.first_seen(&poi.id).unwrap_or(now))
        );
        self.current_nearby = Some(poi.id.clone());
        Some(poi.clone())
    }

    /// The POI last reported and not yet cleared
    pub fn current_nearby(&self) -> Option<&PoiId> {
        self.current_nearby.as_ref()
    }

    /// Allow the next eligible POI (possibly the same one) to be reported
    pub fn clear_nearby(&mut self) {
        self.current_nearby = None;
    }

    pub fn timer(&self) -> &ProximityTimer {
        &self.timer
    }

    /// Forget every dwell timer and the current nearby POI
    pub fn reset(&mut self) {
        self.timer.clear();
        self.current_nearby = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::coordinate::Coordinate;

    const HOME: Coordinate = Coordinate::new(50.736942, 2.251044);
    // ~111m north of HOME
    const AWAY: Coordinate = Coordinate::new(50.737942, 2.251044);

    fn catalog(radius: f64, dwell: u32) -> PoiCatalog {
        PoiCatalog::new(vec![PointOfInterest::new("home", "Home", HOME).with_trigger(radius, dwell)])
            .unwrap()
    }

    fn at(coordinate: Coordinate, secs: u64) -> LocationSample {
        LocationSample::new(coordinate, Timestamp::from_secs(secs))
    }

    #[test]
    fn test_triggers_once_dwell_reached() {
        let catalog = catalog(5.0, 6);
        let mut detector = ProximityDetector::new();

        for t in [0, 2, 4] {
            assert!(detector.on_location_sample(&at(HOME, t), &catalog).is_none());
        }
        let hit = detector.on_location_sample(&at(HOME, 6), &catalog);
        assert_eq!(hit.map(|p| p.id), Some(PoiId::from("home")));
    }

    #[test]
    fn test_zero_dwell_triggers_on_first_sample() {
        let catalog = catalog(5.0, 0);
        let mut detector = ProximityDetector::new();
        assert!(detector.on_location_sample(&at(HOME, 0), &catalog).is_some());
    }

    #[test]
    fn test_exit_resets_dwell() {
        let catalog = catalog(5.0, 6);
        let mut detector = ProximityDetector::new();

        detector.on_location_sample(&at(HOME, 0), &catalog);
        detector.on_location_sample(&at(HOME, 4), &catalog);
        detector.on_location_sample(&at(AWAY, 5), &catalog);
        assert!(detector.timer().is_empty());

        // Clock restarted at t=6, so t=10 is only 4s of dwell
        assert!(detector.on_location_sample(&at(HOME, 6), &catalog).is_none());
        assert!(detector.on_location_sample(&at(HOME, 10), &catalog).is_none());
        assert!(detector.on_location_sample(&at(HOME, 12), &catalog).is_some());
    }

    #[test]
    fn test_single_report_until_cleared() {
        let catalog = catalog(5.0, 0);
        let mut detector = ProximityDetector::new();

        assert!(detector.on_location_sample(&at(HOME, 0), &catalog).is_some());
        for t in 1..5 {
            assert!(detector.on_location_sample(&at(HOME, t), &catalog).is_none());
        }
        assert_eq!(detector.current_nearby(), Some(&PoiId::from("home")));

        detector.clear_nearby();
        assert!(detector.on_location_sample(&at(HOME, 6), &catalog).is_some());
    }

    #[test]
    fn test_timers_tracked_while_report_outstanding() {
        let catalog = catalog(5.0, 3);
        let mut detector = ProximityDetector::new();
        detector.on_location_sample(&at(HOME, 0), &catalog);
        assert!(detector.on_location_sample(&at(HOME, 3), &catalog).is_some());

        // Leaving while the report is outstanding still resets the timer
        detector.on_location_sample(&at(AWAY, 4), &catalog);
        detector.clear_nearby();
        assert!(detector.on_location_sample(&at(HOME, 5), &catalog).is_none());
        assert!(detector.on_location_sample(&at(HOME, 8), &catalog).is_some());
    }

    #[test]
    fn test_catalog_order_wins_over_distance() {
        // Both contain the sample; "far" is listed first and is farther away
        let near = PointOfInterest::new("near", "Near", HOME).with_trigger(50.0, 0);
        let far = PointOfInterest::new("far", "Far", Coordinate::new(50.737142, 2.251044))
            .with_trigger(50.0, 0);
        let catalog = PoiCatalog::new(vec![far, near]).unwrap();
        let mut detector = ProximityDetector::new();

        let hit = detector.on_location_sample(&at(HOME, 0), &catalog).unwrap();
        assert_eq!(hit.id, PoiId::from("far"));
    }

    #[test]
    fn test_malformed_sample_ignored() {
        let catalog = catalog(5.0, 0);
        let mut detector = ProximityDetector::new();
        let bad = LocationSample::new(Coordinate::new(f64::NAN, 2.25), Timestamp(0));
        assert!(detector.on_location_sample(&bad, &catalog).is_none());
        assert!(detector.timer().is_empty());
        assert!(detector.on_location_sample(&at(HOME, 1), &catalog).is_some());
    }

    #[test]
    fn test_out_of_order_timestamp_does_not_underflow() {
        let catalog = catalog(5.0, 6);
        let mut detector = ProximityDetector::new();
        detector.on_location_sample(&at(HOME, 10), &catalog);
        assert!(detector.on_location_sample(&at(HOME, 4), &catalog).is_none());
    }
}
