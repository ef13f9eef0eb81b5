//! Replays a recorded track as if it came from a live provider
//!
//! Gaps between fixes are reproduced in wall time divided by `speedup`.
//! Fixes closer than the minimum update interval to the previously
//! delivered one are skipped, the way a platform provider throttles.
//! A stop/start pair resumes from where the track was left. Once the
//! track is exhausted the source stops on its own.

use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::core::config::LocationConfig;
use crate::core::error::Result;
use crate::core::types::Timestamp;
use crate::location::coordinate::{Coordinate, LocationSample};
use crate::location::source::{LocationListener, LocationSource};

#[derive(Debug, Default)]
struct ReplayState {
    listener: Option<LocationListener>,
    task: Option<JoinHandle<()>>,
    cursor: usize,
    last_delivered: Option<Timestamp>,
    last_known: Option<LocationSample>,
}

/// Location source backed by an in-memory track
#[derive(Debug)]
pub struct ReplayLocationSource {
    track: Arc<Vec<LocationSample>>,
    min_interval_ms: u64,
    speedup: f64,
    state: Arc<Mutex<ReplayState>>,
}

impl ReplayLocationSource {
    pub fn new(track: Vec<LocationSample>, config: &LocationConfig) -> Self {
        Self {
            track: Arc::new(track),
            min_interval_ms: config.min_update_interval_ms,
            speedup: 1.0,
            state: Arc::new(Mutex::new(ReplayState::default())),
        }
    }

    /// Compress replay time; 1000.0 plays a 2s gap in 2ms
    pub fn with_speedup(mut self, speedup: f64) -> Self {
        if speedup.is_finite() && speedup > 0.0 {
            self.speedup = speedup;
        }
        self
    }

    /// Seed the fix reported by `last_known` before any replay
    pub fn with_last_known(self, sample: LocationSample) -> Self {
        lock(&self.state).last_known = Some(sample);
        self
    }

    /// Number of track entries consumed so far (delivered or throttled)
    pub fn position(&self) -> usize {
        lock(&self.state).cursor
    }

    pub fn len(&self) -> usize {
        self.track.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track.is_empty()
    }
}

impl LocationSource for ReplayLocationSource {
    fn start(&self, listener: LocationListener) {
        let mut state = lock(&self.state);
        if state.listener.is_some() {
            tracing::debug!("Replay source already started");
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("No async runtime available, replay source not started");
                return;
            }
        };

        state.listener = Some(listener);
        state.task = Some(runtime.spawn(run_replay(
            Arc::clone(&self.track),
            Arc::clone(&self.state),
            self.min_interval_ms,
            self.speedup,
        )));
        tracing::info!("Location updates started at track position {}", state.cursor);
    }

    fn stop(&self) {
        let mut state = lock(&self.state);
        let was_running = state.listener.take().is_some();
        if let Some(task) = state.task.take() {
            task.abort();
        }
        if was_running {
            tracing::info!("Location updates stopped at track position {}", state.cursor);
        }
    }

    fn last_known(&self) -> Option<LocationSample> {
        lock(&self.state).last_known
    }

    fn is_running(&self) -> bool {
        lock(&self.state).listener.is_some()
    }
}

impl Drop for ReplayLocationSource {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_replay(
    track: Arc<Vec<LocationSample>>,
    state: Arc<Mutex<ReplayState>>,
    min_interval_ms: u64,
    speedup: f64,
) {
    let mut previous: Option<Timestamp> = None;

    loop {
        let index = lock(&state).cursor;
        let Some(sample) = track.get(index).copied() else {
            tracing::debug!("Replay track exhausted after {} fixes", index);
            // Dropping the listener closes the channel so the consumer drains and ends
            lock(&state).listener = None;
            return;
        };

        if let Some(prev) = previous {
            let gap_ms = sample.timestamp.millis_since(prev) as f64;
            tokio::time::sleep(Duration::from_secs_f64(gap_ms / 1000.0 / speedup)).await;
        }
        previous = Some(sample.timestamp);

        // Delivery happens under the state lock so `stop` cannot interleave
        let mut guard = lock(&state);
        if guard.listener.is_none() {
            return;
        }
        guard.cursor = index + 1;

        let throttled = guard
            .last_delivered
            .map(|last| sample.timestamp.millis_since(last) < min_interval_ms)
            .unwrap_or(false);
        if throttled {
            tracing::trace!("Throttling fix at {}ms", sample.timestamp.as_millis());
            continue;
        }

        let open = guard
            .listener
            .as_ref()
            .map(|listener| listener.deliver(sample))
            .unwrap_or(false);
        guard.last_delivered = Some(sample.timestamp);
        guard.last_known = Some(sample);
        if !open {
            tracing::debug!("Location consumer went away, ending replay");
            return;
        }
    }
}

fn lock(state: &Mutex<ReplayState>) -> MutexGuard<'_, ReplayState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// TOML representation of a recorded track
#[derive(Debug, Deserialize)]
struct TomlTrack {
    fixes: Vec<TomlFix>,
}

#[derive(Debug, Deserialize)]
struct TomlFix {
    latitude: f64,
    longitude: f64,
    /// Milliseconds since the start of the track
    t_ms: u64,
}

/// Parse a track of `[[fixes]]` entries
pub fn parse_track_toml(content: &str) -> Result<Vec<LocationSample>> {
    let track: TomlTrack = toml::from_str(content)?;
    Ok(track
        .fixes
        .into_iter()
        .map(|fix| {
            LocationSample::new(
                Coordinate::new(fix.latitude, fix.longitude),
                Timestamp::from_millis(fix.t_ms),
            )
        })
        .collect())
}

/// Load a track from a TOML file
pub fn load_track_toml(path: &Path) -> Result<Vec<LocationSample>> {
    let content = std::fs::read_to_string(path)?;
    parse_track_toml(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(times_ms: &[u64]) -> Vec<LocationSample> {
        times_ms
            .iter()
            .map(|&t| LocationSample::new(Coordinate::new(50.0, 2.0), Timestamp(t)))
            .collect()
    }

    fn config(min_interval_ms: u64) -> LocationConfig {
        LocationConfig {
            min_update_interval_ms: min_interval_ms,
            ..LocationConfig::default()
        }
    }

    #[tokio::test]
    async fn test_replay_delivers_in_order() {
        let source = ReplayLocationSource::new(track(&[0, 2000, 4000]), &config(2000))
            .with_speedup(1000.0);
        let (listener, mut rx) = LocationListener::channel(8);
        source.start(listener);

        for expected in [0, 2000, 4000] {
            let sample = rx.recv().await.unwrap();
            assert_eq!(sample.timestamp, Timestamp(expected));
        }
        assert_eq!(source.last_known().unwrap().timestamp, Timestamp(4000));
    }

    #[tokio::test]
    async fn test_replay_throttles_below_min_interval() {
        let source = ReplayLocationSource::new(track(&[0, 500, 2000, 2500, 4100]), &config(2000))
            .with_speedup(1000.0);
        let (listener, mut rx) = LocationListener::channel(8);
        source.start(listener);

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(rx.recv().await.unwrap().timestamp.as_millis());
        }
        assert_eq!(seen, vec![0, 2000, 4100]);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_is_safe() {
        let source = ReplayLocationSource::new(track(&[0]), &config(0));
        source.stop();
        assert!(!source.is_running());

        let (first, mut rx_first) = LocationListener::channel(4);
        let (second, mut rx_second) = LocationListener::channel(4);
        source.start(first);
        source.start(second);
        assert!(source.is_running());

        assert!(rx_first.recv().await.is_some());
        source.stop();
        assert!(rx_second.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_delivery_after_stop() {
        let source = ReplayLocationSource::new(track(&[0, 50, 100, 150]), &config(0));
        let (listener, mut rx) = LocationListener::channel(8);
        source.start(listener);
        assert!(rx.recv().await.is_some());

        source.stop();
        // The sender was dropped by stop, so the channel drains and closes
        while rx.recv().await.is_some() {}
        assert!(source.position() < 4);
    }

    #[tokio::test]
    async fn test_exhausted_track_stops_source() {
        let source = ReplayLocationSource::new(track(&[0, 2000]), &config(0)).with_speedup(1000.0);
        let (listener, mut rx) = LocationListener::channel(8);
        source.start(listener);
        assert!(source.is_running());

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            let mut count = 0;
            while rx.recv().await.is_some() {
                count += 1;
            }
            count
        })
        .await
        .expect("channel closes once the track ends");

        assert_eq!(drained, 2);
        assert_eq!(source.position(), source.len());
        assert!(!source.is_running());
    }

    #[test]
    fn test_last_known_seeded_without_runtime() {
        let seed = LocationSample::new(Coordinate::new(50.75, 2.25), Timestamp(9));
        let source = ReplayLocationSource::new(Vec::new(), &config(0)).with_last_known(seed);
        assert_eq!(source.last_known(), Some(seed));

        // No runtime: start logs and stays stopped
        let (listener, _rx) = LocationListener::channel(1);
        source.start(listener);
        assert!(!source.is_running());
    }

    #[test]
    fn test_parse_track() {
        let samples = parse_track_toml(
            r#"
            [[fixes]]
            latitude = 50.736942
            longitude = 2.251044
            t_ms = 0

            [[fixes]]
            latitude = 50.736950
            longitude = 2.251050
            t_ms = 2000
            "#,
        )
        .unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].timestamp, Timestamp(2000));
    }
}
