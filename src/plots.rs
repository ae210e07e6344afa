use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::data::filter::{BucketSize, RangeBounds};

// ---------------------------------------------------------------------------
// PlotSpec – one configured chart
// ---------------------------------------------------------------------------

/// The eight supported chart kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartKind {
    Line,
    Bar,
    StackedBar,
    Box,
    Scatter,
    Pie,
    Count,
    Correlation,
}

impl ChartKind {
    pub const ALL: [ChartKind; 8] = [
        ChartKind::Line,
        ChartKind::Pie,
        ChartKind::Box,
        ChartKind::Bar,
        ChartKind::StackedBar,
        ChartKind::Count,
        ChartKind::Scatter,
        ChartKind::Correlation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ChartKind::Line => "Line",
            ChartKind::Bar => "Bar",
            ChartKind::StackedBar => "Stacked Bar",
            ChartKind::Box => "Box",
            ChartKind::Scatter => "Scatter",
            ChartKind::Pie => "Pie",
            ChartKind::Count => "Count",
            ChartKind::Correlation => "Correlation",
        }
    }
}

/// A named plot configuration: which column filters, which columns plot,
/// how to draw them, and the inclusive range it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSpec {
    pub name: String,
    pub filter_column: String,
    /// Ordered; must be non-empty for rendering (callers guard).
    pub value_columns: Vec<String>,
    pub chart_kind: ChartKind,
    pub bucket: BucketSize,
    pub bounds: RangeBounds,
}

/// In-place edit of the fields the per-plot widgets change.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlotPatch {
    pub chart_kind: Option<ChartKind>,
    pub bucket: Option<BucketSize>,
}

/// Which plots an operation targets.
#[derive(Debug, Clone, PartialEq)]
pub enum PlotSelection {
    All,
    Named(String),
}

// ---------------------------------------------------------------------------
// PlotStore – the ordered list of plot specs
// ---------------------------------------------------------------------------

/// Ordered list of plot specs, created/edited/removed by user action.
/// The owner (AppState) writes the session snapshot after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotStore {
    specs: Vec<PlotSpec>,
}

impl PlotStore {
    /// Append a new spec. Display names must be non-empty; duplicates are
    /// allowed, matching operations then hit every spec with that name.
    pub fn add(&mut self, spec: PlotSpec) -> Result<()> {
        if spec.name.trim().is_empty() {
            bail!("plot name must not be empty");
        }
        log::info!("added plot '{}' ({:?})", spec.name, spec.chart_kind);
        self.specs.push(spec);
        Ok(())
    }

    /// Replace chart kind and/or bucket size of the spec at `index`.
    pub fn update(&mut self, index: usize, patch: PlotPatch) -> Result<()> {
        let spec = self
            .specs
            .get_mut(index)
            .ok_or_else(|| anyhow::anyhow!("no plot at index {index}"))?;
        if let Some(kind) = patch.chart_kind {
            spec.chart_kind = kind;
        }
        if let Some(bucket) = patch.bucket {
            spec.bucket = bucket;
        }
        Ok(())
    }

    /// Remove the specs at `indices`. Applied in descending position order
    /// internally so earlier removals cannot invalidate later indices.
    pub fn remove(&mut self, indices: &[usize]) {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        for index in sorted.into_iter().rev() {
            if index < self.specs.len() {
                let removed = self.specs.remove(index);
                log::info!("removed plot '{}'", removed.name);
            }
        }
    }

    /// Specs matching the selection, paired with their positions.
    pub fn list(&self, selection: &PlotSelection) -> Vec<(usize, &PlotSpec)> {
        self.specs
            .iter()
            .enumerate()
            .filter(|(_, spec)| match selection {
                PlotSelection::All => true,
                PlotSelection::Named(name) => spec.name == *name,
            })
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PlotSpec> {
        self.specs.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::parse_datetime;

    fn spec(name: &str) -> PlotSpec {
        PlotSpec {
            name: name.to_string(),
            filter_column: "ts".into(),
            value_columns: vec!["v".into()],
            chart_kind: ChartKind::Line,
            bucket: BucketSize::None,
            bounds: RangeBounds::Time(
                parse_datetime("2024-01-01 00:00:00").unwrap(),
                parse_datetime("2024-01-02 00:00:00").unwrap(),
            ),
        }
    }

    #[test]
    fn empty_name_rejected() {
        let mut store = PlotStore::default();
        assert!(store.add(spec("  ")).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn removed_name_never_listed_again() {
        let mut store = PlotStore::default();
        store.add(spec("P1")).unwrap();
        store.add(spec("P2")).unwrap();
        store.add(spec("P3")).unwrap();

        store.remove(&[1]);

        let names: Vec<&str> = store
            .list(&PlotSelection::All)
            .into_iter()
            .map(|(_, s)| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["P1", "P3"]);
    }

    #[test]
    fn multi_remove_applies_in_descending_order() {
        let mut store = PlotStore::default();
        for name in ["a", "b", "c", "d"] {
            store.add(spec(name)).unwrap();
        }
        // Ascending input must not shift later indices onto wrong specs.
        store.remove(&[0, 2]);
        assert_eq!(store.names(), vec!["b".to_string(), "d".into()]);
    }

    #[test]
    fn update_patches_in_place() {
        let mut store = PlotStore::default();
        store.add(spec("P1")).unwrap();
        store
            .update(
                0,
                PlotPatch {
                    chart_kind: Some(ChartKind::Pie),
                    bucket: Some(BucketSize::Hour),
                },
            )
            .unwrap();
        let spec = store.get(0).unwrap();
        assert_eq!(spec.chart_kind, ChartKind::Pie);
        assert_eq!(spec.bucket, BucketSize::Hour);
        assert!(store.update(5, PlotPatch::default()).is_err());
    }

    #[test]
    fn named_selection_matches_duplicates() {
        let mut store = PlotStore::default();
        store.add(spec("dup")).unwrap();
        store.add(spec("other")).unwrap();
        store.add(spec("dup")).unwrap();
        let hits = store.list(&PlotSelection::Named("dup".into()));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 0);
        assert_eq!(hits[1].0, 2);
    }
}
