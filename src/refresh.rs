//! Auto-refresh: a background worker that re-reads the backing source on a
//! timer and hands fresh tables to the UI thread over a channel.
//!
//! The original design slept on the serving thread; here the worker owns the
//! sleeping and the UI only drains events, so user actions never wait on a
//! tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};

use crate::data::loader::{load_source, Credentials, DataSource};
use crate::data::model::Table;

/// Smallest accepted refresh interval, exclusive.
pub const MIN_INTERVAL_SECS: f64 = 0.1;
/// Largest accepted refresh interval, inclusive (one day).
pub const MAX_INTERVAL_SECS: f64 = 86_400.0;

/// Periodic-save cadence, decoupled from the refresh interval.
const SNAPSHOT_CADENCE: Duration = Duration::from_secs(10);

/// Slice used for sleeping so stop requests stay responsive.
const STOP_POLL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Events sent to the UI thread
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RefreshEvent {
    /// ≥10 s elapsed since the last snapshot write; the owner should persist.
    SnapshotDue,
    /// The source changed and was reloaded.
    Reloaded {
        table: Table,
        modified: Option<i64>,
    },
    /// A reload attempt failed; the old table stays in place.
    Failed(String),
}

// ---------------------------------------------------------------------------
// Handle + state machine
// ---------------------------------------------------------------------------

/// Running half of the Stopped/Running state machine. Exists only while the
/// loop runs; dropping or calling [`RefreshHandle::stop`] joins the worker.
pub struct RefreshHandle {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Check the user-supplied interval against the accepted bounds.
pub fn validate_interval(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= MIN_INTERVAL_SECS || secs > MAX_INTERVAL_SECS {
        bail!(
            "refresh interval must be greater than {MIN_INTERVAL_SECS} and at most \
             {MAX_INTERVAL_SECS} seconds, got {secs}"
        );
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Spawn the refresh worker. `last_modified` seeds the change detection;
/// URL sources have no marker and are treated as always changed, matching
/// the original dashboard.
pub fn start(
    source: DataSource,
    credentials: Option<Credentials>,
    interval_secs: f64,
    last_modified: Option<i64>,
    events: mpsc::Sender<RefreshEvent>,
) -> Result<RefreshHandle> {
    let interval = validate_interval(interval_secs)?;
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let worker = std::thread::Builder::new()
        .name("refresh-loop".into())
        .spawn(move || run_loop(source, credentials, interval, last_modified, stop_flag, events))?;

    log::info!("auto-refresh started (every {interval_secs} s)");
    Ok(RefreshHandle {
        stop,
        worker: Some(worker),
    })
}

fn run_loop(
    source: DataSource,
    credentials: Option<Credentials>,
    interval: Duration,
    mut last_modified: Option<i64>,
    stop: Arc<AtomicBool>,
    events: mpsc::Sender<RefreshEvent>,
) {
    let mut last_snapshot = Instant::now();

    'ticks: loop {
        // Sleep one interval in small slices so stop takes effect promptly.
        let tick_start = Instant::now();
        while tick_start.elapsed() < interval {
            if stop.load(Ordering::Relaxed) {
                break 'ticks;
            }
            std::thread::sleep(STOP_POLL.min(interval));
        }
        if stop.load(Ordering::Relaxed) {
            break;
        }

        if last_snapshot.elapsed() >= SNAPSHOT_CADENCE {
            if events.send(RefreshEvent::SnapshotDue).is_err() {
                break;
            }
            last_snapshot = Instant::now();
        }

        let marker = source.modification_marker();
        let changed = match (marker, last_modified) {
            (Some(current), Some(stored)) => current != stored,
            // No marker on either side → assume changed (URL sources).
            _ => true,
        };
        if !changed {
            continue;
        }

        match load_source(&source, credentials.as_ref()) {
            Ok(table) => {
                let modified = marker.or_else(now_millis);
                last_modified = modified;
                log::info!("source changed, reloaded {}", source.describe());
                if events.send(RefreshEvent::Reloaded { table, modified }).is_err() {
                    break;
                }
            }
            Err(e) => {
                log::error!("auto-refresh reload failed: {e}");
                if events.send(RefreshEvent::Failed(e.to_string())).is_err() {
                    break;
                }
            }
        }
    }

    log::info!("auto-refresh stopped");
}

fn now_millis() -> Option<i64> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn interval_bounds() {
        assert!(validate_interval(0.05).is_err());
        assert!(validate_interval(0.1).is_err()); // exclusive lower bound
        assert!(validate_interval(100_000.0).is_err());
        assert!(validate_interval(f64::NAN).is_err());
        assert!(validate_interval(10.0).is_ok());
        assert!(validate_interval(86_400.0).is_ok());
    }

    #[test]
    fn reloads_when_marker_differs() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "ts,v").unwrap();
        writeln!(file, "2024-01-01 00:00:00,1").unwrap();
        file.flush().unwrap();

        let source = DataSource::Path(file.path().to_path_buf());
        let (tx, rx) = mpsc::channel();
        // Stored marker of None mismatches the file's real mtime.
        let handle = start(source, None, 0.2, None, tx).unwrap();

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        match event {
            RefreshEvent::Reloaded { table, modified } => {
                assert_eq!(table.num_rows(), 1);
                assert!(modified.is_some());
            }
            other => panic!("expected Reloaded, got {other:?}"),
        }
        handle.stop();
    }

    #[test]
    fn stop_joins_the_worker() {
        let (tx, _rx) = mpsc::channel();
        let handle = start(
            DataSource::Path("missing.csv".into()),
            None,
            1.0,
            None,
            tx,
        )
        .unwrap();
        handle.stop(); // must return promptly, not after a full interval
    }
}
