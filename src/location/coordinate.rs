//! Coordinate and location sample value types

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use crate::core::error::{QuestError, Result};
use crate::core::types::Timestamp;

/// A WGS84 latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both components finite and inside the valid degree ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance in meters
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        self.to_point().haversine_distance(&other.to_point())
    }

    fn to_point(self) -> Point<f64> {
        // geo points are (x, y) = (longitude, latitude)
        Point::new(self.longitude, self.latitude)
    }
}

/// One position fix delivered by a location source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub coordinate: Coordinate,
    pub timestamp: Timestamp,
}

impl LocationSample {
    pub fn new(coordinate: Coordinate, timestamp: Timestamp) -> Self {
        Self {
            coordinate,
            timestamp,
        }
    }

    /// Reject samples whose coordinate is non-finite or out of range
    pub fn validate(&self) -> Result<()> {
        if self.coordinate.is_valid() {
            Ok(())
        } else {
            Err(QuestError::InvalidSample(format!(
                "({}, {}) at {}ms",
                self.coordinate.latitude,
                self.coordinate.longitude,
                self.timestamp.as_millis()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_zero_for_same_point() {
        let c = Coordinate::new(50.750067, 2.251813);
        assert!(c.distance_to(&c).abs() < 1e-9);
    }

    #[test]
    fn test_distance_grand_place_to_cathedral() {
        // Roughly 310m apart in Saint-Omer
        let grand_place = Coordinate::new(50.750067, 2.251813);
        let cathedral = Coordinate::new(50.747345, 2.252833);
        let d = grand_place.distance_to(&cathedral);
        assert!(d > 290.0 && d < 320.0, "distance was {}", d);
        assert!((d - cathedral.distance_to(&grand_place)).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_non_finite() {
        let sample = LocationSample::new(Coordinate::new(f64::NAN, 2.0), Timestamp(0));
        assert!(sample.validate().is_err());
        let sample = LocationSample::new(Coordinate::new(50.0, f64::INFINITY), Timestamp(0));
        assert!(sample.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -180.5).is_valid());
        assert!(Coordinate::new(-90.0, 180.0).is_valid());
    }
}
