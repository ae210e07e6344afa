use std::fmt;

use anyhow::{bail, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CellValue – a single cell in a table column
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value covering the types sensor logs carry.
///
/// CSV/Excel ingestion produces `Number` and `Text` (plus `Null` for blanks);
/// `Time` appears once a column has been coerced for filtering or a row was
/// appended through the add-data form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Number(f64),
    Time(NaiveDateTime),
    Text(String),
}

impl CellValue {
    /// Interpret the cell as an `f64`, coercing text if it parses.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Interpret the cell as a timestamp, coercing text if it parses.
    pub fn as_time(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::Time(t) => Some(*t),
            CellValue::Text(s) => parse_datetime(s.trim()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, ""),
            CellValue::Number(v) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{}", *v as i64)
                } else {
                    write!(f, "{v}")
                }
            }
            CellValue::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Infer the cell type from raw text the way a delimited parser sees it.
/// Numbers win over timestamps so plain integers stay numeric; timestamp
/// coercion proper happens later, at filter time.
pub fn infer_cell(raw: &str) -> CellValue {
    let s = raw.trim();
    if s.is_empty() {
        return CellValue::Null;
    }
    if let Ok(v) = s.parse::<f64>() {
        return CellValue::Number(v);
    }
    if let Some(t) = parse_datetime(s) {
        return CellValue::Time(t);
    }
    CellValue::Text(s.to_string())
}

/// Try the datetime layouts commonly found in exported sensor logs.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    const LAYOUTS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
    ];
    for layout in LAYOUTS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(t);
        }
    }
    // Bare date → midnight.
    if let Ok(d) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    None
}

// ---------------------------------------------------------------------------
// Column / Table
// ---------------------------------------------------------------------------

/// One named column of cell values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Column {
            name: name.into(),
            values,
        }
    }
}

/// An ordered set of named columns, rows aligned by position.
///
/// Invariant: all columns have equal length. Enforced on construction and on
/// every row append.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, rejecting ragged columns.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let n = first.values.len();
            for col in &columns {
                if col.values.len() != n {
                    bail!(
                        "column '{}' has {} rows, expected {}",
                        col.name,
                        col.values.len(),
                        n
                    );
                }
            }
        }
        Ok(Table { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Ordered list of column names.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Append one row. Cells are given as `(column_name, value)` pairs;
    /// columns not named get `Null`, unknown names are rejected.
    pub fn append_row(&mut self, cells: &[(&str, CellValue)]) -> Result<()> {
        for (name, _) in cells {
            if self.column_index(name).is_none() {
                bail!("unknown column '{name}'");
            }
        }
        for col in &mut self.columns {
            let value = cells
                .iter()
                .find(|(name, _)| *name == col.name)
                .map(|(_, v)| v.clone())
                .unwrap_or(CellValue::Null);
            col.values.push(value);
        }
        Ok(())
    }

    /// Keep only the rows at `indices`, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|col| Column {
                name: col.name.clone(),
                values: indices.iter().map(|&i| col.values[i].clone()).collect(),
            })
            .collect();
        Table { columns }
    }

    /// Sort rows ascending by the given timestamp column. Rows whose cell
    /// does not coerce to a timestamp sink to the end, original order kept.
    pub fn sort_by_time(&mut self, column: &str) -> Result<()> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| anyhow::anyhow!("unknown column '{column}'"))?;

        let mut order: Vec<usize> = (0..self.num_rows()).collect();
        let keys: Vec<Option<NaiveDateTime>> = self.columns[idx]
            .values
            .iter()
            .map(|v| v.as_time())
            .collect();
        order.sort_by(|&a, &b| match (&keys[a], &keys[b]) {
            (Some(ta), Some(tb)) => ta.cmp(tb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.cmp(&b),
        });

        *self = self.take_rows(&order);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        parse_datetime(s).unwrap()
    }

    #[test]
    fn infer_cell_types() {
        assert_eq!(infer_cell(""), CellValue::Null);
        assert_eq!(infer_cell("42"), CellValue::Number(42.0));
        assert_eq!(infer_cell("3.25"), CellValue::Number(3.25));
        assert_eq!(
            infer_cell("2024-01-01 12:30:00"),
            CellValue::Time(ts("2024-01-01 12:30:00"))
        );
        assert_eq!(infer_cell("pump-a"), CellValue::Text("pump-a".into()));
    }

    #[test]
    fn ragged_columns_rejected() {
        let cols = vec![
            Column::new("a", vec![CellValue::Number(1.0)]),
            Column::new("b", vec![]),
        ];
        assert!(Table::new(cols).is_err());
    }

    #[test]
    fn append_fills_missing_with_null() {
        let mut table = Table::new(vec![
            Column::new("ts", vec![]),
            Column::new("v", vec![]),
            Column::new("w", vec![]),
        ])
        .unwrap();
        table
            .append_row(&[
                ("ts", CellValue::Time(ts("2024-01-01 00:00:00"))),
                ("v", CellValue::Number(1.0)),
            ])
            .unwrap();
        assert_eq!(table.num_rows(), 1);
        assert_eq!(table.column("w").unwrap().values[0], CellValue::Null);
        assert!(table.append_row(&[("nope", CellValue::Null)]).is_err());
    }

    #[test]
    fn sort_by_time_orders_rows() {
        let mut table = Table::new(vec![
            Column::new(
                "ts",
                vec![
                    CellValue::Text("2024-01-02 00:00:00".into()),
                    CellValue::Text("2024-01-01 00:00:00".into()),
                ],
            ),
            Column::new("v", vec![CellValue::Number(2.0), CellValue::Number(1.0)]),
        ])
        .unwrap();
        table.sort_by_time("ts").unwrap();
        assert_eq!(table.column("v").unwrap().values[0], CellValue::Number(1.0));
    }
}
