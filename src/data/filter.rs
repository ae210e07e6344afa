use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::model::{CellValue, Column, Table};

// ---------------------------------------------------------------------------
// Filter parameters
// ---------------------------------------------------------------------------

/// Inclusive bounds on the filter column, type-matched to its values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RangeBounds {
    Time(NaiveDateTime, NaiveDateTime),
    Number(f64, f64),
}

/// Resampling bucket width. `None` leaves rows as they are; the rest only
/// apply to time-valued filter columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketSize {
    None,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl BucketSize {
    pub const ALL: [BucketSize; 7] = [
        BucketSize::None,
        BucketSize::Minute,
        BucketSize::Hour,
        BucketSize::Day,
        BucketSize::Week,
        BucketSize::Month,
        BucketSize::Year,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BucketSize::None => "None",
            BucketSize::Minute => "Minute",
            BucketSize::Hour => "Hour",
            BucketSize::Day => "Daily",
            BucketSize::Week => "Weekly",
            BucketSize::Month => "Monthly",
            BucketSize::Year => "Yearly",
        }
    }
}

// ---------------------------------------------------------------------------
// Filtering + resampling
// ---------------------------------------------------------------------------

/// Filter `table` to rows whose `column` value lies within `bounds`,
/// then optionally resample into fixed-width time buckets.
///
/// Rows whose filter cell does not coerce to the bounds' type are dropped.
/// An empty result is valid and means "nothing to plot".
///
/// Resampling replaces every numeric column with its arithmetic mean per
/// bucket, one output row per non-empty bucket, ordered by bucket start.
/// Non-numeric columns other than the filter column are dropped from the
/// resampled output: a mean is undefined for them.
pub fn filter_table(
    table: &Table,
    column: &str,
    bounds: &RangeBounds,
    bucket: BucketSize,
) -> Result<Table> {
    let filter_col = table
        .column(column)
        .ok_or_else(|| anyhow!("filter column '{column}' not found"))?;

    match bounds {
        RangeBounds::Number(lo, hi) => {
            let kept: Vec<(usize, f64)> = filter_col
                .values
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.as_f64().map(|x| (i, x)))
                .filter(|(_, x)| *lo <= *x && *x <= *hi)
                .collect();
            // Buckets only make sense on a time axis.
            Ok(coerced_subset(table, column, &kept, CellValue::Number))
        }
        RangeBounds::Time(lo, hi) => {
            let kept: Vec<(usize, NaiveDateTime)> = filter_col
                .values
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.as_time().map(|t| (i, t)))
                .filter(|(_, t)| *lo <= *t && *t <= *hi)
                .collect();

            if bucket == BucketSize::None {
                Ok(coerced_subset(table, column, &kept, CellValue::Time))
            } else {
                resample(table, column, &kept, bucket)
            }
        }
    }
}

/// Row subset with the filter column rewritten to its coerced values.
fn coerced_subset<T: Copy>(
    table: &Table,
    column: &str,
    kept: &[(usize, T)],
    wrap: fn(T) -> CellValue,
) -> Table {
    let indices: Vec<usize> = kept.iter().map(|(i, _)| *i).collect();
    let mut out = table.take_rows(&indices);

    let columns: Vec<Column> = out
        .columns()
        .iter()
        .map(|col| {
            if col.name == column {
                Column::new(
                    col.name.clone(),
                    kept.iter().map(|(_, v)| wrap(*v)).collect(),
                )
            } else {
                col.clone()
            }
        })
        .collect();
    // Shape unchanged, so this cannot fail.
    if let Ok(rebuilt) = Table::new(columns) {
        out = rebuilt;
    }
    out
}

/// Group kept rows into buckets keyed by the truncated filter value and
/// average the numeric columns per bucket.
fn resample(
    table: &Table,
    column: &str,
    kept: &[(usize, NaiveDateTime)],
    bucket: BucketSize,
) -> Result<Table> {
    let mut buckets: BTreeMap<NaiveDateTime, Vec<usize>> = BTreeMap::new();
    for (row, t) in kept {
        buckets.entry(bucket_start(*t, bucket)).or_default().push(*row);
    }

    // A column takes part when any filtered cell holds a number.
    let numeric_columns: Vec<&Column> = table
        .columns()
        .iter()
        .filter(|col| col.name != column)
        .filter(|col| {
            kept.iter()
                .any(|(row, _)| matches!(col.values[*row], CellValue::Number(_)))
        })
        .collect();

    let starts: Vec<NaiveDateTime> = buckets.keys().copied().collect();
    let mut out = vec![Column::new(
        column,
        starts.iter().map(|t| CellValue::Time(*t)).collect(),
    )];

    for col in numeric_columns {
        let values = buckets
            .values()
            .map(|rows| {
                let nums: Vec<f64> = rows
                    .iter()
                    .filter_map(|&row| match col.values[row] {
                        CellValue::Number(v) => Some(v),
                        _ => None,
                    })
                    .collect();
                if nums.is_empty() {
                    CellValue::Null
                } else {
                    CellValue::Number(nums.iter().sum::<f64>() / nums.len() as f64)
                }
            })
            .collect();
        out.push(Column::new(col.name.clone(), values));
    }

    Table::new(out)
}

/// Truncate a timestamp to the start of its bucket.
fn bucket_start(t: NaiveDateTime, bucket: BucketSize) -> NaiveDateTime {
    let date = t.date();
    let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).unwrap_or(t);
    match bucket {
        BucketSize::None => t,
        BucketSize::Minute => t
            .with_second(0)
            .and_then(|x| x.with_nanosecond(0))
            .unwrap_or(t),
        BucketSize::Hour => t
            .with_minute(0)
            .and_then(|x| x.with_second(0))
            .and_then(|x| x.with_nanosecond(0))
            .unwrap_or(t),
        BucketSize::Day => midnight(date),
        BucketSize::Week => {
            let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
            midnight(monday)
        }
        BucketSize::Month => midnight(date.with_day(1).unwrap_or(date)),
        BucketSize::Year => {
            midnight(NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::parse_datetime;

    fn ts(s: &str) -> NaiveDateTime {
        parse_datetime(s).unwrap()
    }

    fn hourly_table() -> Table {
        Table::new(vec![
            Column::new(
                "ts",
                vec![
                    CellValue::Text("2024-01-01 00:00:00".into()),
                    CellValue::Text("2024-01-01 01:00:00".into()),
                    CellValue::Text("2024-01-01 02:00:00".into()),
                ],
            ),
            Column::new(
                "v",
                vec![
                    CellValue::Number(1.0),
                    CellValue::Number(2.0),
                    CellValue::Number(3.0),
                ],
            ),
        ])
        .unwrap()
    }

    fn full_range() -> RangeBounds {
        RangeBounds::Time(ts("2024-01-01 00:00:00"), ts("2024-01-01 02:00:00"))
    }

    #[test]
    fn full_range_keeps_every_coercible_row_in_order() {
        let out = filter_table(&hourly_table(), "ts", &full_range(), BucketSize::None).unwrap();
        assert_eq!(out.num_rows(), 3);
        let v = out.column("v").unwrap();
        assert_eq!(
            v.values,
            vec![
                CellValue::Number(1.0),
                CellValue::Number(2.0),
                CellValue::Number(3.0)
            ]
        );
        // Filter column comes back coerced to timestamps.
        assert_eq!(
            out.column("ts").unwrap().values[0],
            CellValue::Time(ts("2024-01-01 00:00:00"))
        );
    }

    #[test]
    fn uncoercible_rows_are_dropped() {
        let table = Table::new(vec![
            Column::new(
                "ts",
                vec![
                    CellValue::Text("2024-01-01 00:00:00".into()),
                    CellValue::Text("not a date".into()),
                ],
            ),
            Column::new("v", vec![CellValue::Number(1.0), CellValue::Number(2.0)]),
        ])
        .unwrap();
        let out = filter_table(&table, "ts", &full_range(), BucketSize::None).unwrap();
        assert_eq!(out.num_rows(), 1);
    }

    #[test]
    fn hour_buckets_leave_single_element_means_unchanged() {
        let out = filter_table(&hourly_table(), "ts", &full_range(), BucketSize::Hour).unwrap();
        assert_eq!(out.num_rows(), 3);
        assert_eq!(
            out.column("v").unwrap().values,
            vec![
                CellValue::Number(1.0),
                CellValue::Number(2.0),
                CellValue::Number(3.0)
            ]
        );
    }

    #[test]
    fn day_bucket_averages_the_whole_day() {
        let out = filter_table(&hourly_table(), "ts", &full_range(), BucketSize::Day).unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.column("v").unwrap().values[0], CellValue::Number(2.0));
        assert_eq!(
            out.column("ts").unwrap().values[0],
            CellValue::Time(ts("2024-01-01 00:00:00"))
        );
    }

    #[test]
    fn resampling_is_idempotent_on_one_row_per_bucket() {
        let once = filter_table(&hourly_table(), "ts", &full_range(), BucketSize::Hour).unwrap();
        let twice = filter_table(&once, "ts", &full_range(), BucketSize::Hour).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn non_numeric_columns_are_dropped_during_resampling() {
        let table = Table::new(vec![
            Column::new(
                "ts",
                vec![
                    CellValue::Text("2024-01-01 00:00:00".into()),
                    CellValue::Text("2024-01-01 00:30:00".into()),
                ],
            ),
            Column::new("v", vec![CellValue::Number(1.0), CellValue::Number(3.0)]),
            Column::new(
                "label",
                vec![CellValue::Text("a".into()), CellValue::Text("b".into())],
            ),
        ])
        .unwrap();
        let bounds = RangeBounds::Time(ts("2024-01-01 00:00:00"), ts("2024-01-01 01:00:00"));
        let out = filter_table(&table, "ts", &bounds, BucketSize::Hour).unwrap();
        assert_eq!(out.num_rows(), 1);
        assert_eq!(out.column("v").unwrap().values[0], CellValue::Number(2.0));
        assert!(out.column("label").is_none());
    }

    #[test]
    fn numeric_bounds_filter_inclusively() {
        let table = Table::new(vec![Column::new(
            "idx",
            vec![
                CellValue::Number(1.0),
                CellValue::Number(2.0),
                CellValue::Number(3.0),
            ],
        )])
        .unwrap();
        let out = filter_table(
            &table,
            "idx",
            &RangeBounds::Number(1.0, 2.0),
            BucketSize::None,
        )
        .unwrap();
        assert_eq!(out.num_rows(), 2);
    }

    #[test]
    fn week_bucket_starts_on_monday() {
        // 2024-01-03 is a Wednesday; its week starts Monday 2024-01-01.
        assert_eq!(
            bucket_start(ts("2024-01-03 15:00:00"), BucketSize::Week),
            ts("2024-01-01 00:00:00")
        );
    }

    #[test]
    fn empty_result_is_valid() {
        let bounds = RangeBounds::Time(ts("2030-01-01 00:00:00"), ts("2030-01-02 00:00:00"));
        let out = filter_table(&hourly_table(), "ts", &bounds, BucketSize::None).unwrap();
        assert!(out.is_empty());
    }
}
