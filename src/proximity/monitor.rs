//! Lifecycle-bound location pipeline
//!
//! `resume` checks platform preconditions, runs the last known fix through
//! the detector and starts the source; `pause` stops the source and the
//! consumer task. Nearby POIs and the latest position are published on
//! watch channels for the UI side.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::catalog::{PoiCatalog, PointOfInterest};
use crate::core::config::LocationConfig;
use crate::location::coordinate::{Coordinate, LocationSample};
use crate::location::source::{LocationListener, LocationSource, PreconditionStatus, Preconditions};
use crate::proximity::detector::ProximityDetector;

/// Map center used before the first fix (Grand-Place, Saint-Omer)
pub const DEFAULT_MAP_CENTER: Coordinate = Coordinate::new(50.750067, 2.251813);

/// A POI reported nearby
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyEvent {
    pub poi: PointOfInterest,
    /// True only for the report that flipped the catalog's reached flag
    pub first_visit: bool,
}

/// State shared between the monitor handle and its consumer task
#[derive(Debug)]
struct MonitorShared {
    catalog: Arc<PoiCatalog>,
    detector: Mutex<ProximityDetector>,
    nearby_tx: watch::Sender<Option<NearbyEvent>>,
    location_tx: watch::Sender<Option<LocationSample>>,
}

impl MonitorShared {
    fn detector(&self) -> MutexGuard<'_, ProximityDetector> {
        self.detector.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_sample(&self, sample: LocationSample) -> Option<NearbyEvent> {
        if sample.coordinate.is_valid() {
            self.location_tx.send_replace(Some(sample));
        }

        let poi = self.detector().on_location_sample(&sample, &self.catalog)?;
        let first_visit = match self.catalog.mark_reached(&poi.id) {
            Ok(first) => first,
            Err(e) => {
                tracing::warn!("Nearby POI missing from catalog: {}", e);
                false
            }
        };
        if first_visit {
            tracing::info!("Nearby point of interest: {} ({})", poi.name, poi.id);
        } else {
            tracing::debug!("Nearby again: {} ({})", poi.name, poi.id);
        }
        let event = NearbyEvent { poi, first_visit };
        self.nearby_tx.send_replace(Some(event.clone()));
        Some(event)
    }
}

/// Owns the detector and drives it from a location source
pub struct ProximityMonitor {
    shared: Arc<MonitorShared>,
    source: Arc<dyn LocationSource>,
    preconditions: Arc<dyn Preconditions>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    channel_capacity: usize,
}

impl ProximityMonitor {
    pub fn new(
        catalog: Arc<PoiCatalog>,
        source: Arc<dyn LocationSource>,
        preconditions: Arc<dyn Preconditions>,
        config: &LocationConfig,
    ) -> Self {
        let (nearby_tx, _) = watch::channel(None);
        let (location_tx, _) = watch::channel(None);
        Self {
            shared: Arc::new(MonitorShared {
                catalog,
                detector: Mutex::new(ProximityDetector::new()),
                nearby_tx,
                location_tx,
            }),
            source,
            preconditions,
            consumer: Mutex::new(None),
            channel_capacity: config.channel_capacity,
        }
    }

    /// Start updates if the platform allows it. Idempotent.
    ///
    /// Must be called from within a tokio runtime.
    pub fn resume(&self) -> PreconditionStatus {
        let status = self.preconditions.check_preconditions();
        if !status.is_satisfied() {
            tracing::warn!("Location preconditions not met: {:?}", status);
            return status;
        }

        let mut consumer = self.consumer();
        if consumer.is_some() {
            return status;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::error!("Cannot resume location updates outside an async runtime");
                return PreconditionStatus::Unavailable("no async runtime".into());
            }
        };

        if let Some(last) = self.source.last_known() {
            tracing::debug!("Bootstrapping from last known fix");
            self.shared.handle_sample(last);
        }

        let (listener, rx) = LocationListener::channel(self.channel_capacity);
        *consumer = Some(runtime.spawn(run_consumer(Arc::clone(&self.shared), rx)));
        self.source.start(listener);
        status
    }

    /// Stop updates; safe to call repeatedly or before `resume`
    pub fn pause(&self) {
        self.source.stop();
        if let Some(task) = self.consumer().take() {
            task.abort();
            tracing::debug!("Proximity consumer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.consumer().is_some()
    }

    /// Run one sample through the detector synchronously
    pub fn handle_sample(&self, sample: LocationSample) -> Option<NearbyEvent> {
        self.shared.handle_sample(sample)
    }

    /// Acknowledge the current nearby POI so the next one can be reported
    pub fn clear_nearby(&self) {
        self.shared.detector().clear_nearby();
        self.shared.nearby_tx.send_replace(None);
    }

    pub fn current_nearby(&self) -> Option<PointOfInterest> {
        self.shared.nearby_tx.borrow().as_ref().map(|event| event.poi.clone())
    }

    pub fn subscribe_nearby(&self) -> watch::Receiver<Option<NearbyEvent>> {
        self.shared.nearby_tx.subscribe()
    }

    pub fn subscribe_location(&self) -> watch::Receiver<Option<LocationSample>> {
        self.shared.location_tx.subscribe()
    }

    /// Latest valid position, or the default map center
    pub fn map_center(&self) -> Coordinate {
        self.shared
            .location_tx
            .borrow()
            .map(|sample| sample.coordinate)
            .unwrap_or(DEFAULT_MAP_CENTER)
    }

    pub fn catalog(&self) -> &Arc<PoiCatalog> {
        &self.shared.catalog
    }

    fn consumer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.consumer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ProximityMonitor {
    fn drop(&mut self) {
        self.pause();
    }
}

async fn run_consumer(shared: Arc<MonitorShared>, mut rx: mpsc::Receiver<LocationSample>) {
    while let Some(sample) = rx.recv().await {
        shared.handle_sample(sample);
    }
    tracing::debug!("Location channel closed");
}
