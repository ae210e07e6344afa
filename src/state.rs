use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};

use crate::data::filter::RangeBounds;
use crate::data::loader::{self, Credentials, DataSource};
use crate::data::model::Table;
use crate::data::writer;
use crate::persist::{self, SessionSnapshot, SNAPSHOT_FILE};
use crate::plots::{PlotPatch, PlotSelection, PlotSpec, PlotStore};
use crate::refresh::{self, RefreshEvent, RefreshHandle};

// ---------------------------------------------------------------------------
// Transient widget state (not persisted)
// ---------------------------------------------------------------------------

/// Sidebar form fields. Lives outside the snapshot: only committed actions
/// mutate the session.
pub struct FormState {
    pub source_input: String,
    pub username: String,
    pub password: String,
    pub filter_column: String,
    pub value_columns: Vec<String>,
    pub plot_name: String,
    /// "All" or a plot display name.
    pub selected_plot: String,
    pub start_date: NaiveDate,
    pub start_time: String,
    pub end_date: NaiveDate,
    pub end_time: String,
    pub refresh_interval_input: f64,
    pub add_date: NaiveDate,
    pub add_time: String,
    pub add_value: f64,
    pub add_column: String,
}

impl Default for FormState {
    fn default() -> Self {
        let today = chrono::Local::now().date_naive();
        FormState {
            source_input: String::new(),
            username: String::new(),
            password: String::new(),
            filter_column: String::new(),
            value_columns: Vec::new(),
            plot_name: String::new(),
            selected_plot: "All".into(),
            start_date: today,
            start_time: "00:00".into(),
            end_date: today,
            end_time: "23:59".into(),
            refresh_interval_input: 10.0,
            add_date: today,
            add_time: "00:00".into(),
            add_value: 0.0,
            add_column: String::new(),
        }
    }
}

impl FormState {
    fn credentials(&self) -> Option<Credentials> {
        if self.username.is_empty() {
            None
        } else {
            Some(Credentials {
                username: self.username.clone(),
                password: self.password.clone(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full session, independent of rendering. Every committed mutation
/// writes the snapshot file through before returning.
pub struct AppState {
    snapshot_path: PathBuf,

    pub source: Option<DataSource>,
    pub table: Option<Table>,
    pub column_names: Vec<String>,
    pub plots: PlotStore,
    pub refresh_interval_secs: f64,
    pub last_modified: Option<i64>,
    /// Persisted Stopped/Running flag; `refresh` is the live handle.
    pub auto_refresh: bool,

    refresh: Option<RefreshHandle>,
    refresh_events: Option<mpsc::Receiver<RefreshEvent>>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    pub form: FormState,
}

impl Default for AppState {
    fn default() -> Self {
        AppState {
            snapshot_path: PathBuf::from(SNAPSHOT_FILE),
            source: None,
            table: None,
            column_names: Vec::new(),
            plots: PlotStore::default(),
            refresh_interval_secs: 10.0,
            last_modified: None,
            auto_refresh: false,
            refresh: None,
            refresh_events: None,
            status_message: None,
            form: FormState::default(),
        }
    }
}

impl AppState {
    /// Restore the previous session from the snapshot file, if any. A
    /// session that was auto-refreshing resumes in the Running state.
    pub fn restore(snapshot_path: PathBuf) -> Self {
        let mut state = AppState {
            snapshot_path,
            ..AppState::default()
        };

        match persist::load_snapshot(&state.snapshot_path) {
            Ok(Some(snapshot)) => {
                state.source = snapshot.source;
                state.table = snapshot.table;
                state.column_names = snapshot.column_names;
                state.plots = snapshot.plots;
                state.refresh_interval_secs = snapshot.refresh_interval_secs;
                state.last_modified = snapshot.last_modified;
                state.form.refresh_interval_input = snapshot.refresh_interval_secs;
                if let Some(source) = &state.source {
                    state.form.source_input = source.describe();
                }
                if snapshot.auto_refresh {
                    if let Err(e) = state.start_refresh(snapshot.refresh_interval_secs) {
                        log::error!("could not resume auto-refresh: {e}");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => log::error!("failed to restore session: {e:#}"),
        }
        state
    }

    /// Write-through: persist the session after a committed mutation.
    pub fn write_snapshot(&self) {
        let snapshot = SessionSnapshot {
            source: self.source.clone(),
            table: self.table.clone(),
            column_names: self.column_names.clone(),
            auto_refresh: self.auto_refresh,
            last_modified: self.last_modified,
            plots: self.plots.clone(),
            refresh_interval_secs: self.refresh_interval_secs,
        };
        if let Err(e) = persist::save_snapshot(&snapshot, &self.snapshot_path) {
            log::error!("snapshot write failed: {e:#}");
        }
    }

    // ---- Loading -----------------------------------------------------

    /// Load the typed-in path or URL and make it the session source.
    pub fn load_from_input(&mut self) {
        let source = DataSource::parse(&self.form.source_input);
        let credentials = self.form.credentials();
        self.ingest(source, credentials.as_ref());
    }

    /// Load a file picked in the native dialog.
    pub fn load_from_path(&mut self, path: PathBuf) {
        self.form.source_input = path.display().to_string();
        self.ingest(DataSource::Path(path), None);
    }

    fn ingest(&mut self, source: DataSource, credentials: Option<&Credentials>) {
        match loader::load_source(&source, credentials) {
            Ok(table) => {
                log::info!(
                    "loaded {} rows with columns {:?}",
                    table.num_rows(),
                    table.column_names()
                );
                self.column_names = table.column_names();
                self.last_modified = source.modification_marker().or_else(now_millis);
                self.table = Some(table);
                self.source = Some(source);
                self.status_message = None;
                self.sync_form_columns();
                self.write_snapshot();
            }
            Err(e) => {
                log::error!("failed to load data: {e}");
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Re-read the current source on user request.
    pub fn manual_refresh(&mut self) {
        let Some(source) = self.source.clone() else {
            return;
        };
        let credentials = self.form.credentials();
        match loader::load_source(&source, credentials.as_ref()) {
            Ok(table) => {
                self.column_names = table.column_names();
                self.last_modified = source.modification_marker().or_else(now_millis);
                self.table = Some(table);
                self.status_message = None;
                self.sync_form_columns();
                self.write_snapshot();
            }
            Err(e) => {
                log::error!("manual refresh failed: {e}");
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Keep form selections valid after the column set changed.
    fn sync_form_columns(&mut self) {
        if !self.column_names.contains(&self.form.filter_column) {
            self.form.filter_column = self.column_names.first().cloned().unwrap_or_default();
        }
        self.form
            .value_columns
            .retain(|c| self.column_names.contains(c));
        if !self.column_names.contains(&self.form.add_column) {
            self.form.add_column.clear();
        }
    }

    // ---- Plot store --------------------------------------------------

    pub fn add_plot(&mut self, spec: PlotSpec) {
        match self.plots.add(spec) {
            Ok(()) => {
                self.status_message = None;
                self.write_snapshot();
            }
            Err(e) => self.status_message = Some(format!("Error: {e}")),
        }
    }

    pub fn update_plot(&mut self, index: usize, patch: PlotPatch) {
        if let Err(e) = self.plots.update(index, patch) {
            log::error!("plot update failed: {e}");
            return;
        }
        self.write_snapshot();
    }

    pub fn remove_plots(&mut self, indices: &[usize]) {
        if indices.is_empty() {
            return;
        }
        self.plots.remove(indices);
        self.write_snapshot();
    }

    pub fn plot_selection(&self) -> PlotSelection {
        if self.form.selected_plot == "All" {
            PlotSelection::All
        } else {
            PlotSelection::Named(self.form.selected_plot.clone())
        }
    }

    // ---- Refresh loop ------------------------------------------------

    pub fn refresh_running(&self) -> bool {
        self.refresh.is_some()
    }

    /// Stopped → Running. Persists the new state and interval.
    pub fn start_refresh(&mut self, interval_secs: f64) -> Result<()> {
        let Some(source) = self.source.clone() else {
            anyhow::bail!("no data source loaded");
        };
        self.stop_worker();

        let (tx, rx) = mpsc::channel();
        let handle = refresh::start(
            source,
            self.form.credentials(),
            interval_secs,
            self.last_modified,
            tx,
        )?;
        self.refresh = Some(handle);
        self.refresh_events = Some(rx);
        self.refresh_interval_secs = interval_secs;
        self.auto_refresh = true;
        self.write_snapshot();
        Ok(())
    }

    /// Running → Stopped. Persists the new state.
    pub fn stop_refresh(&mut self) {
        self.stop_worker();
        self.auto_refresh = false;
        self.write_snapshot();
    }

    fn stop_worker(&mut self) {
        if let Some(handle) = self.refresh.take() {
            handle.stop();
        }
        self.refresh_events = None;
    }

    /// Apply everything the worker produced since the last frame. Returns
    /// true when the table changed and the view should repaint.
    pub fn drain_refresh_events(&mut self) -> bool {
        let Some(rx) = &self.refresh_events else {
            return false;
        };
        let events: Vec<RefreshEvent> = rx.try_iter().collect();

        let mut table_changed = false;
        for event in events {
            match event {
                RefreshEvent::SnapshotDue => self.write_snapshot(),
                RefreshEvent::Reloaded { table, modified } => {
                    self.column_names = table.column_names();
                    self.table = Some(table);
                    self.last_modified = modified;
                    self.sync_form_columns();
                    self.write_snapshot();
                    table_changed = true;
                }
                RefreshEvent::Failed(msg) => {
                    self.status_message = Some(format!("Auto-refresh error: {msg}"));
                }
            }
        }
        table_changed
    }

    // ---- Add data ----------------------------------------------------

    /// Commit the add-data form: parse HH:MM, append, write the backing
    /// file, persist. Any failure aborts the single action.
    pub fn add_data_row(&mut self) {
        let (Some(source), Some(table)) = (self.source.clone(), self.table.as_mut()) else {
            return;
        };
        if self.form.filter_column.is_empty() || self.form.add_column.is_empty() {
            self.status_message = Some("Error: select timestamp and value columns".into());
            return;
        }

        let time = match writer::parse_hhmm(&self.form.add_time) {
            Ok(t) => t,
            Err(e) => {
                self.status_message = Some(format!("Error: {e}"));
                return;
            }
        };
        let timestamp = NaiveDateTime::new(self.form.add_date, time);
        let timestamp_col = self.form.filter_column.clone();
        let value_col = self.form.add_column.clone();

        match writer::append_row(
            table,
            &source,
            &timestamp_col,
            &value_col,
            timestamp,
            self.form.add_value,
        ) {
            Ok(()) => {
                self.last_modified = source.modification_marker().or_else(now_millis);
                self.status_message = Some("Data added successfully".into());
                self.write_snapshot();
            }
            Err(e) => {
                log::error!("add data failed: {e}");
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    // ---- Detected ranges ----------------------------------------------

    /// Observed [min, max] of the chosen filter column, used to seed new
    /// plot bounds. Time-valued when any cell coerces to a timestamp,
    /// numeric otherwise.
    pub fn detected_bounds(&self, column: &str) -> Option<RangeBounds> {
        let table = self.table.as_ref()?;
        let col = table.column(column)?;

        let times: Vec<NaiveDateTime> = col.values.iter().filter_map(|v| v.as_time()).collect();
        if !times.is_empty() {
            let min = *times.iter().min()?;
            let max = *times.iter().max()?;
            return Some(RangeBounds::Time(min, max));
        }

        let numbers: Vec<f64> = col.values.iter().filter_map(|v| v.as_f64()).collect();
        if numbers.is_empty() {
            return None;
        }
        let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
        let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(RangeBounds::Number(min, max))
    }
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
    use crate::data::filter::BucketSize;
    use crate::plots::ChartKind;
    use std::io::Write as _;

    fn sample_csv(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("log.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "ts,v").unwrap();
        writeln!(file, "2024-01-01 00:00:00,1").unwrap();
        writeln!(file, "2024-01-01 01:00:00,2").unwrap();
        writeln!(file, "2024-01-01 02:00:00,3").unwrap();
        path
    }

    #[test]
    fn load_then_restore_round_trips_session() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot_path = dir.path().join("session.json");
        let csv = sample_csv(dir.path());

        let mut state = AppState {
            snapshot_path: snapshot_path.clone(),
            ..AppState::default()
        };
        state.load_from_path(csv);
        assert!(state.table.is_some());

        let bounds = state.detected_bounds("ts").unwrap();
        state.add_plot(PlotSpec {
            name: "P1".into(),
            filter_column: "ts".into(),
            value_columns: vec!["v".into()],
            chart_kind: ChartKind::Line,
            bucket: BucketSize::None,
            bounds,
        });

        let restored = AppState::restore(snapshot_path);
        assert_eq!(restored.column_names, vec!["ts".to_string(), "v".into()]);
        assert_eq!(restored.plots.names(), vec!["P1".to_string()]);
        assert_eq!(restored.table, state.table);
    }

    #[test]
    fn detected_bounds_pick_time_over_number() {
        let dir = tempfile::tempdir().unwrap();
        let csv = sample_csv(dir.path());
        let mut state = AppState {
            snapshot_path: dir.path().join("session.json"),
            ..AppState::default()
        };
        state.load_from_path(csv);

        match state.detected_bounds("ts").unwrap() {
            RangeBounds::Time(lo, hi) => {
                assert!(lo < hi);
            }
            other => panic!("expected time bounds, got {other:?}"),
        }
        match state.detected_bounds("v").unwrap() {
            RangeBounds::Number(lo, hi) => {
                assert_eq!(lo, 1.0);
                assert_eq!(hi, 3.0);
            }
            other => panic!("expected numeric bounds, got {other:?}"),
        }
    }

    #[test]
    fn start_refresh_requires_a_source() {
        let mut state = AppState::default();
        assert!(state.start_refresh(5.0).is_err());
        assert!(!state.refresh_running());
    }
}
