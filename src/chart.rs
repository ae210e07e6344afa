//! Chart data preparation, independent of the drawing layer.
//!
//! `ui::plot` turns these into egui_plot items; everything here is plain
//! numbers so the per-kind contracts stay testable without a window.

use crate::data::model::{CellValue, Table};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Map a filter-column cell onto the x axis: timestamps become unix seconds,
/// numbers pass through.
pub fn x_value(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Time(t) => Some(t.and_utc().timestamp() as f64),
        CellValue::Number(v) => Some(*v),
        CellValue::Text(_) => cell
            .as_time()
            .map(|t| t.and_utc().timestamp() as f64)
            .or_else(|| cell.as_f64()),
        CellValue::Null => None,
    }
}

// ---------------------------------------------------------------------------
// XY series (Line / Bar / Stacked Bar / Scatter / Box)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    /// `[x, y]` points, rows with a null on either axis skipped.
    pub points: Vec<[f64; 2]>,
}

/// One series per value column, x drawn from the filter column.
pub fn xy_series(table: &Table, filter_column: &str, value_columns: &[String]) -> Vec<Series> {
    let Some(x_col) = table.column(filter_column) else {
        return Vec::new();
    };
    let xs: Vec<Option<f64>> = x_col.values.iter().map(x_value).collect();

    value_columns
        .iter()
        .filter_map(|name| table.column(name))
        .map(|col| {
            let points = col
                .values
                .iter()
                .zip(&xs)
                .filter_map(|(cell, x)| match (x, cell.as_f64()) {
                    (Some(x), Some(y)) => Some([*x, y]),
                    _ => None,
                })
                .collect();
            Series {
                name: col.name.clone(),
                points,
            }
        })
        .collect()
}

/// Five-number summary used for box plots, one per value column.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSummary {
    pub name: String,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Summarize each series' value distribution over the filtered range.
pub fn box_summaries(table: &Table, value_columns: &[String]) -> Vec<BoxSummary> {
    value_columns
        .iter()
        .filter_map(|name| {
            let col = table.column(name)?;
            let mut values: Vec<f64> = col.values.iter().filter_map(|v| v.as_f64()).collect();
            if values.is_empty() {
                return None;
            }
            values.sort_by(f64::total_cmp);
            Some(BoxSummary {
                name: name.clone(),
                min: values[0],
                q1: quantile(&values, 0.25),
                median: quantile(&values, 0.5),
                q3: quantile(&values, 0.75),
                max: values[values.len() - 1],
            })
        })
        .collect()
}

/// Linear-interpolated quantile over a sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

// ---------------------------------------------------------------------------
// Pie
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PieSlice {
    pub label: String,
    pub value: f64,
}

/// Pie charts use only the first value column as magnitude, the filter
/// column as slice label. Null, non-finite and negative magnitudes are
/// skipped.
pub fn pie_slices(table: &Table, filter_column: &str, value_columns: &[String]) -> Vec<PieSlice> {
    let (Some(labels), Some(first)) = (
        table.column(filter_column),
        value_columns.first().and_then(|name| table.column(name)),
    ) else {
        return Vec::new();
    };

    labels
        .values
        .iter()
        .zip(&first.values)
        .filter_map(|(label, magnitude)| {
            let value = magnitude.as_f64()?;
            if !value.is_finite() || value < 0.0 {
                return None;
            }
            Some(PieSlice {
                label: label.to_string(),
                value,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Count histogram
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `(bin_start, row_count)` per bin; empty bins included.
    pub bins: Vec<(f64, usize)>,
    pub bin_width: f64,
}

/// Row counts bucketed by the filter column over `bin_count` equal bins.
pub fn count_histogram(table: &Table, filter_column: &str, bin_count: usize) -> Option<Histogram> {
    let col = table.column(filter_column)?;
    let xs: Vec<f64> = col.values.iter().filter_map(x_value).collect();
    if xs.is_empty() || bin_count == 0 {
        return None;
    }

    let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return Some(Histogram {
            bins: vec![(min, xs.len())],
            bin_width: 1.0,
        });
    }

    let width = (max - min) / bin_count as f64;
    let mut counts = vec![0usize; bin_count];
    for x in &xs {
        let idx = (((x - min) / width) as usize).min(bin_count - 1);
        counts[idx] += 1;
    }

    Some(Histogram {
        bins: counts
            .into_iter()
            .enumerate()
            .map(|(i, c)| (min + i as f64 * width, c))
            .collect(),
        bin_width: width,
    })
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub labels: Vec<String>,
    /// Row-major, `values[i][j]` = Pearson r of labels i and j. NaN when a
    /// pair has no variance or fewer than two complete observations.
    pub values: Vec<Vec<f64>>,
}

/// Pairwise Pearson correlation over the selected value columns, pairwise
/// complete (rows with a null in either column are skipped per pair).
pub fn correlation_matrix(table: &Table, value_columns: &[String]) -> Option<CorrelationMatrix> {
    let columns: Vec<(&str, Vec<Option<f64>>)> = value_columns
        .iter()
        .filter_map(|name| {
            let col = table.column(name)?;
            Some((
                name.as_str(),
                col.values.iter().map(|v| v.as_f64()).collect(),
            ))
        })
        .collect();
    if columns.is_empty() {
        return None;
    }

    let n = columns.len();
    let mut values = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        for j in i..n {
            let pairs: Vec<(f64, f64)> = columns[i]
                .1
                .iter()
                .zip(&columns[j].1)
                .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
                .collect();
            let r = pearson(&pairs);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    Some(CorrelationMatrix {
        labels: columns.iter().map(|(name, _)| name.to_string()).collect(),
        values,
    })
}

fn pearson(pairs: &[(f64, f64)]) -> f64 {
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{parse_datetime, Column};

    fn table() -> Table {
        Table::new(vec![
            Column::new(
                "ts",
                vec![
                    CellValue::Time(parse_datetime("2024-01-01 00:00:00").unwrap()),
                    CellValue::Time(parse_datetime("2024-01-01 01:00:00").unwrap()),
                    CellValue::Time(parse_datetime("2024-01-01 02:00:00").unwrap()),
                ],
            ),
            Column::new(
                "a",
                vec![
                    CellValue::Number(1.0),
                    CellValue::Number(2.0),
                    CellValue::Number(3.0),
                ],
            ),
            Column::new(
                "b",
                vec![
                    CellValue::Number(6.0),
                    CellValue::Number(4.0),
                    CellValue::Number(2.0),
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn series_per_value_column() {
        let series = xy_series(&table(), "ts", &["a".into(), "b".into()]);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].name, "a");
        assert_eq!(series[0].points.len(), 3);
        assert_eq!(series[0].points[0][1], 1.0);
        // x axis is monotonic unix time
        assert!(series[0].points[0][0] < series[0].points[1][0]);
    }

    #[test]
    fn pie_uses_only_first_value_column() {
        let slices = pie_slices(&table(), "ts", &["a".into(), "b".into()]);
        assert_eq!(slices.len(), 3);
        // Magnitudes come from 'a'; 'b' is ignored without error.
        assert_eq!(
            slices.iter().map(|s| s.value).collect::<Vec<_>>(),
            vec![1.0, 2.0, 3.0]
        );
        assert_eq!(slices[0].label, "2024-01-01 00:00:00");
    }

    #[test]
    fn histogram_counts_rows() {
        let hist = count_histogram(&table(), "ts", 2).unwrap();
        let total: usize = hist.bins.iter().map(|(_, c)| c).sum();
        assert_eq!(total, 3);
        assert_eq!(hist.bins.len(), 2);
    }

    #[test]
    fn correlation_is_symmetric_with_unit_diagonal() {
        let corr = correlation_matrix(&table(), &["a".into(), "b".into()]).unwrap();
        assert_eq!(corr.labels, vec!["a".to_string(), "b".into()]);
        assert!((corr.values[0][0] - 1.0).abs() < 1e-12);
        // a and b are perfectly anti-correlated
        assert!((corr.values[0][1] + 1.0).abs() < 1e-12);
        assert_eq!(corr.values[0][1], corr.values[1][0]);
    }

    #[test]
    fn box_summary_quartiles() {
        let summaries = box_summaries(&table(), &["a".into()]);
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.min, 1.0);
        assert_eq!(s.median, 2.0);
        assert_eq!(s.max, 3.0);
    }
}
