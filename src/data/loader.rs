use std::io::Read;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader};
use thiserror::Error;

use super::model::{infer_cell, CellValue, Column, Table};

// ---------------------------------------------------------------------------
// Sources, formats, errors
// ---------------------------------------------------------------------------

/// Where a table comes from: a file on disk or an HTTP(S) URL.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DataSource {
    Path(PathBuf),
    Url(String),
}

impl DataSource {
    /// Interpret user input: anything with an http(s) scheme is a URL,
    /// everything else a local path.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            DataSource::Url(trimmed.to_string())
        } else {
            DataSource::Path(PathBuf::from(trimmed))
        }
    }

    pub fn is_url(&self) -> bool {
        matches!(self, DataSource::Url(_))
    }

    pub fn describe(&self) -> String {
        match self {
            DataSource::Path(p) => p.display().to_string(),
            DataSource::Url(u) => u.clone(),
        }
    }

    /// Modification marker used by the refresh loop: file mtime in unix
    /// milliseconds for paths. URL sources have no cheap marker, so `None`
    /// (which the refresh loop treats as always-changed).
    pub fn modification_marker(&self) -> Option<i64> {
        match self {
            DataSource::Path(p) => {
                let meta = std::fs::metadata(p).ok()?;
                let mtime = meta.modified().ok()?;
                let dur = mtime.duration_since(std::time::UNIX_EPOCH).ok()?;
                Some(dur.as_millis() as i64)
            }
            DataSource::Url(_) => None,
        }
    }
}

/// HTTP Basic credentials for protected URL sources.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
    Xls,
}

impl FileFormat {
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(FileFormat::Csv),
            "xlsx" => Some(FileFormat::Xlsx),
            "xls" => Some(FileFormat::Xls),
            _ => None,
        }
    }

    /// Match an HTTP `Content-Type` the way the dashboard expects servers to
    /// declare tabular payloads.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let ct = content_type.to_ascii_lowercase();
        if ct.contains("csv") {
            Some(FileFormat::Csv)
        } else if ct.contains("excel") || ct.contains("spreadsheet") {
            Some(FileFormat::Xlsx)
        } else {
            None
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to fetch remote data (HTTP status {status})")]
    Fetch { status: u16 },
    #[error("network error: {0}")]
    Transport(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("spreadsheet error: {0}")]
    Excel(String),
    #[error("inconsistent table shape: {0}")]
    Shape(String),
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Load a table from any source, dispatching on path vs URL.
pub fn load_source(
    source: &DataSource,
    credentials: Option<&Credentials>,
) -> Result<Table, LoadError> {
    log::info!("loading data from {}", source.describe());
    match source {
        DataSource::Path(path) => load_path(path),
        DataSource::Url(url) => load_url(url, credentials),
    }
}

/// Load a local CSV or Excel file. Dispatch by extension.
pub fn load_path(path: &Path) -> Result<Table, LoadError> {
    let format = FileFormat::from_extension(path).ok_or_else(|| {
        LoadError::UnsupportedFormat(
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or("<none>")
                .to_string(),
        )
    })?;

    match format {
        FileFormat::Csv => {
            let file = std::fs::File::open(path)?;
            load_csv_reader(file)
        }
        FileFormat::Xlsx | FileFormat::Xls => {
            let mut workbook =
                open_workbook_auto(path).map_err(|e| LoadError::Excel(e.to_string()))?;
            first_worksheet(&mut workbook)
        }
    }
}

/// Load a table from an in-memory byte buffer with a known format,
/// e.g. an uploaded file.
pub fn load_bytes(bytes: &[u8], format: FileFormat) -> Result<Table, LoadError> {
    match format {
        FileFormat::Csv => load_csv_reader(bytes),
        FileFormat::Xlsx | FileFormat::Xls => {
            let cursor = std::io::Cursor::new(bytes.to_vec());
            let mut workbook = open_workbook_auto_from_rs(cursor)
                .map_err(|e| LoadError::Excel(e.to_string()))?;
            first_worksheet(&mut workbook)
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP fetch
// ---------------------------------------------------------------------------

fn load_url(url: &str, credentials: Option<&Credentials>) -> Result<Table, LoadError> {
    let mut request = ureq::get(url);
    if let Some(creds) = credentials {
        let token = BASE64.encode(format!("{}:{}", creds.username, creds.password));
        request = request.set("Authorization", &format!("Basic {token}"));
    }

    let response = match request.call() {
        Ok(resp) => resp,
        Err(ureq::Error::Status(status, _)) => return Err(LoadError::Fetch { status }),
        Err(other) => return Err(LoadError::Transport(other.to_string())),
    };

    let content_type = response.content_type().to_string();
    let mut bytes = Vec::new();
    response.into_reader().read_to_end(&mut bytes)?;

    // Content type first, URL extension as fallback.
    let format = FileFormat::from_content_type(&content_type)
        .or_else(|| FileFormat::from_extension(Path::new(url)))
        .ok_or_else(|| LoadError::UnsupportedFormat(content_type))?;

    load_bytes(&bytes, format)
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Parse delimited text: header row gives column names, cell types are
/// inferred per cell (numbers, timestamps, text).
fn load_csv_reader<R: Read>(reader: R) -> Result<Table, LoadError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut columns: Vec<Vec<CellValue>> = vec![Vec::new(); headers.len()];
    for record in csv_reader.records() {
        let record = record?;
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(infer_cell(record.get(i).unwrap_or("")));
        }
    }

    let columns = headers
        .into_iter()
        .zip(columns)
        .map(|(name, values)| Column::new(name, values))
        .collect();

    // Equal lengths hold by construction above.
    Table::new(columns).map_err(|e| LoadError::Shape(e.to_string()))
}

// ---------------------------------------------------------------------------
// Excel
// ---------------------------------------------------------------------------

/// Read the first worksheet: row 0 is the header, the rest are data rows.
fn first_worksheet<RS>(workbook: &mut calamine::Sheets<RS>) -> Result<Table, LoadError>
where
    RS: std::io::Read + std::io::Seek,
{
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::Excel("workbook has no sheets".into()))?
        .map_err(|e| LoadError::Excel(e.to_string()))?;
    table_from_range(&range)
}

fn table_from_range(range: &calamine::Range<Data>) -> Result<Table, LoadError> {
    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(|c| c.to_string()).collect(),
        None => return Ok(Table::default()),
    };

    let mut columns: Vec<Vec<CellValue>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(excel_cell(row.get(i)));
        }
    }

    let columns = headers
        .into_iter()
        .zip(columns)
        .map(|(name, values)| Column::new(name, values))
        .collect();
    Table::new(columns).map_err(|e| LoadError::Shape(e.to_string()))
}

fn excel_cell(cell: Option<&Data>) -> CellValue {
    match cell {
        None | Some(Data::Empty) | Some(Data::Error(_)) => CellValue::Null,
        Some(Data::Float(v)) => CellValue::Number(*v),
        Some(Data::Int(v)) => CellValue::Number(*v as f64),
        Some(Data::Bool(b)) => CellValue::Number(if *b { 1.0 } else { 0.0 }),
        Some(Data::DateTime(dt)) => match dt.as_datetime() {
            Some(t) => CellValue::Time(t),
            None => CellValue::Null,
        },
        Some(Data::DateTimeIso(s)) | Some(Data::DurationIso(s)) => infer_cell(s),
        Some(Data::String(s)) => infer_cell(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_columns_match_header_row() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "ts,temperature,label").unwrap();
        writeln!(file, "2024-01-01 00:00:00,21.5,ok").unwrap();
        writeln!(file, "2024-01-01 01:00:00,22.0,warn").unwrap();
        file.flush().unwrap();

        let table = load_path(file.path()).unwrap();
        assert_eq!(
            table.column_names(),
            vec!["ts".to_string(), "temperature".into(), "label".into()]
        );
        assert_eq!(table.num_rows(), 2);
        assert_eq!(
            table.column("temperature").unwrap().values[0],
            CellValue::Number(21.5)
        );
        assert_eq!(
            table.column("label").unwrap().values[1],
            CellValue::Text("warn".into())
        );
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = load_path(Path::new("data.parquet")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(_)));
    }

    #[test]
    fn bytes_roundtrip_csv() {
        let table = load_bytes(b"a,b\n1,2\n3,\n", FileFormat::Csv).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column("b").unwrap().values[1], CellValue::Null);
    }

    #[test]
    fn content_type_detection() {
        assert_eq!(
            FileFormat::from_content_type("text/csv; charset=utf-8"),
            Some(FileFormat::Csv)
        );
        assert_eq!(
            FileFormat::from_content_type(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            ),
            Some(FileFormat::Xlsx)
        );
        assert_eq!(FileFormat::from_content_type("application/pdf"), None);
    }

    #[test]
    fn source_parse_dispatch() {
        assert!(DataSource::parse("https://host/data.csv").is_url());
        assert!(!DataSource::parse("/tmp/data.csv").is_url());
    }
}
