use std::path::Path;

use chrono::NaiveTime;
use rust_xlsxwriter::Workbook;
use thiserror::Error;

use super::loader::{DataSource, FileFormat};
use super::model::{CellValue, Table};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Malformed `HH:MM` input on the add-data form. Aborts that single action;
/// prior state stays untouched.
#[derive(Debug, Error)]
#[error("invalid time '{input}', expected HH:MM")]
pub struct TimeParseError {
    pub input: String,
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("cannot write back to '{0}'")]
    UnsupportedTarget(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("spreadsheet error: {0}")]
    Xlsx(String),
    #[error("{0}")]
    Append(String),
}

// ---------------------------------------------------------------------------
// Add-data form parsing
// ---------------------------------------------------------------------------

/// Parse the form's `HH:MM` time field.
pub fn parse_hhmm(input: &str) -> Result<NaiveTime, TimeParseError> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M").map_err(|_| TimeParseError {
        input: input.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Append + write-back
// ---------------------------------------------------------------------------

/// Append one `{timestamp, value}` row, re-sort by the timestamp column and
/// overwrite the backing file in place.
///
/// Works on a copy and commits only after the file write succeeded, so a
/// failed write leaves the in-memory table as it was.
pub fn append_row(
    table: &mut Table,
    source: &DataSource,
    timestamp_col: &str,
    value_col: &str,
    timestamp: chrono::NaiveDateTime,
    value: f64,
) -> Result<(), WriteError> {
    let mut updated = table.clone();
    updated
        .append_row(&[
            (timestamp_col, CellValue::Time(timestamp)),
            (value_col, CellValue::Number(value)),
        ])
        .map_err(|e| WriteError::Append(e.to_string()))?;
    updated
        .sort_by_time(timestamp_col)
        .map_err(|e| WriteError::Append(e.to_string()))?;

    write_table(&updated, source)?;
    *table = updated;
    log::info!("appended row to {} via '{value_col}'", source.describe());
    Ok(())
}

/// Overwrite the source file with the table's current contents.
///
/// URL sources and legacy `.xls` files are refused: the dashboard never
/// writes to remote endpoints, and `.xls` has no writer.
pub fn write_table(table: &Table, source: &DataSource) -> Result<(), WriteError> {
    let path = match source {
        DataSource::Path(p) => p,
        DataSource::Url(u) => return Err(WriteError::UnsupportedTarget(u.clone())),
    };

    match FileFormat::from_extension(path) {
        Some(FileFormat::Csv) => write_csv(table, path),
        Some(FileFormat::Xlsx) => write_xlsx(table, path),
        _ => Err(WriteError::UnsupportedTarget(path.display().to_string())),
    }
}

fn write_csv(table: &Table, path: &Path) -> Result<(), WriteError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.column_names())?;
    for row in 0..table.num_rows() {
        let record: Vec<String> = table
            .columns()
            .iter()
            .map(|col| col.values[row].to_string())
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_xlsx(table: &Table, path: &Path) -> Result<(), WriteError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col_idx, col) in table.columns().iter().enumerate() {
        sheet
            .write_string(0, col_idx as u16, &col.name)
            .map_err(|e| WriteError::Xlsx(e.to_string()))?;
        for (row_idx, value) in col.values.iter().enumerate() {
            let row = (row_idx + 1) as u32;
            let result = match value {
                CellValue::Null => continue,
                CellValue::Number(v) => sheet.write_number(row, col_idx as u16, *v),
                // Timestamps go out as text in the same layout the loader
                // parses, so round-trips stay lossless.
                CellValue::Time(t) => sheet.write_string(
                    row,
                    col_idx as u16,
                    t.format("%Y-%m-%d %H:%M:%S").to_string(),
                ),
                CellValue::Text(s) => sheet.write_string(row, col_idx as u16, s),
            };
            result.map_err(|e| WriteError::Xlsx(e.to_string()))?;
        }
    }

    workbook
        .save(path)
        .map_err(|e| WriteError::Xlsx(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_path;
    use crate::data::model::{parse_datetime, Column};

    #[test]
    fn hhmm_parsing() {
        assert_eq!(
            parse_hhmm("09:30").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert!(parse_hhmm("9:3:1").is_err());
        assert!(parse_hhmm("25:00").is_err());
        assert!(parse_hhmm("half past nine").is_err());
    }

    #[test]
    fn csv_write_back_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let source = DataSource::Path(path.clone());

        let mut table = Table::new(vec![
            Column::new(
                "ts",
                vec![CellValue::Time(parse_datetime("2024-01-01 01:00:00").unwrap())],
            ),
            Column::new("v", vec![CellValue::Number(2.0)]),
        ])
        .unwrap();

        append_row(
            &mut table,
            &source,
            "ts",
            "v",
            parse_datetime("2024-01-01 00:00:00").unwrap(),
            1.0,
        )
        .unwrap();

        // Appended row sorts first.
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column("v").unwrap().values[0], CellValue::Number(1.0));

        let reloaded = load_path(&path).unwrap();
        assert_eq!(reloaded.num_rows(), 2);
        assert_eq!(reloaded.column_names(), vec!["ts".to_string(), "v".into()]);
    }

    #[test]
    fn url_targets_are_refused_and_leave_table_untouched() {
        let source = DataSource::Url("https://host/data.csv".into());
        let mut table = Table::new(vec![
            Column::new("ts", vec![]),
            Column::new("v", vec![]),
        ])
        .unwrap();
        let before = table.clone();
        let err = append_row(
            &mut table,
            &source,
            "ts",
            "v",
            parse_datetime("2024-01-01 00:00:00").unwrap(),
            1.0,
        )
        .unwrap_err();
        assert!(matches!(err, WriteError::UnsupportedTarget(_)));
        assert_eq!(table, before);
    }
}
