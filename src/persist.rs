//! Session snapshot: everything needed to restore the dashboard on startup.
//!
//! Written through on every state mutation and on the refresh loop's ≥10 s
//! save cadence; read once at startup. Concurrent external writers of the
//! snapshot file are not guarded against (single-user application).

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::loader::DataSource;
use crate::data::model::Table;
use crate::plots::PlotStore;

/// Default snapshot location, next to the executable's working directory.
pub const SNAPSHOT_FILE: &str = "session_state.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub source: Option<DataSource>,
    pub table: Option<Table>,
    pub column_names: Vec<String>,
    pub auto_refresh: bool,
    /// Source modification marker, unix milliseconds.
    pub last_modified: Option<i64>,
    pub plots: PlotStore,
    pub refresh_interval_secs: f64,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        SessionSnapshot {
            source: None,
            table: None,
            column_names: Vec::new(),
            auto_refresh: false,
            last_modified: None,
            plots: PlotStore::default(),
            refresh_interval_secs: 10.0,
        }
    }
}

/// Overwrite the snapshot file with the current session.
pub fn save_snapshot(snapshot: &SessionSnapshot, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating snapshot file {}", path.display()))?;
    serde_json::to_writer(std::io::BufWriter::new(file), snapshot)
        .context("serializing session snapshot")?;
    log::info!("session snapshot saved to {}", path.display());
    Ok(())
}

/// Read the snapshot back, `None` when no snapshot exists yet.
pub fn load_snapshot(path: &Path) -> Result<Option<SessionSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening snapshot file {}", path.display()))?;
    let snapshot = serde_json::from_reader(std::io::BufReader::new(file))
        .context("parsing session snapshot")?;
    log::info!("session snapshot loaded from {}", path.display());
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::{BucketSize, RangeBounds};
    use crate::data::model::{parse_datetime, CellValue, Column};
    use crate::plots::{ChartKind, PlotSpec};

    #[test]
    fn missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_snapshot(&dir.path().join("nope.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILE);

        let table = Table::new(vec![
            Column::new(
                "ts",
                vec![CellValue::Time(parse_datetime("2024-01-01 00:00:00").unwrap())],
            ),
            Column::new("v", vec![CellValue::Number(1.5)]),
            Column::new("label", vec![CellValue::Text("ok".into())]),
        ])
        .unwrap();

        let mut plots = PlotStore::default();
        plots
            .add(PlotSpec {
                name: "P1".into(),
                filter_column: "ts".into(),
                value_columns: vec!["v".into()],
                chart_kind: ChartKind::StackedBar,
                bucket: BucketSize::Week,
                bounds: RangeBounds::Time(
                    parse_datetime("2024-01-01 00:00:00").unwrap(),
                    parse_datetime("2024-02-01 00:00:00").unwrap(),
                ),
            })
            .unwrap();

        let snapshot = SessionSnapshot {
            source: Some(DataSource::Path("/tmp/log.csv".into())),
            column_names: table.column_names(),
            table: Some(table),
            auto_refresh: true,
            last_modified: Some(1_700_000_000_000),
            plots,
            refresh_interval_secs: 2.5,
        };

        save_snapshot(&snapshot, &path).unwrap();
        let restored = load_snapshot(&path).unwrap().unwrap();
        assert_eq!(restored, snapshot);
    }
}
