use crate::error::ExtractionError;
use bigdecimal::BigDecimal;
use calamine::{Data, Reader, open_workbook_auto};
use csv::Trim;
use jiff::Timestamp;
use jiff::civil::{Date, DateTime, Time, date};
use jiff::tz::TimeZone;
use jiff::{SignedDuration, ToSpan};
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// File extensions read as spreadsheet workbooks rather than delimited text.
const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// One reading taken from a usage export, after its columns have been identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    /// Line in the source file, for error messages.
    pub row: usize,
    pub timestamp: Date,
    pub energy_reading: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRow {
    /// 1-based line of a text file, or row of a worksheet.
    pub line: usize,
    pub fields: Vec<String>,
}

impl UsageRow {
    pub fn get(&self, column: usize) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or("")
    }
}

/// A usage export as read from disk: whatever columns the exporting app chose, and raw cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageTable {
    columns: Vec<String>,
    rows: Vec<UsageRow>,
}

impl UsageTable {
    pub fn new(columns: Vec<String>, rows: Vec<UsageRow>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[UsageRow] {
        &self.rows
    }

    /// Reads a workbook (by extension) or delimited text file.
    pub fn from_path(path: &Path, delimiter: Option<u8>) -> Result<Self, ExtractionError> {
        let is_workbook = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                WORKBOOK_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if is_workbook {
            return Self::from_workbook(path);
        }

        let file = std::fs::File::open(path).map_err(|source| ExtractionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, delimiter).map_err(|e| match e {
            ExtractionError::Io { source, .. } => ExtractionError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Reads the first worksheet. The first non-empty row holds the column names.
    pub fn from_workbook(path: &Path) -> Result<Self, ExtractionError> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(ExtractionError::NoHeader)??;
        let first_row = range.start().map_or(0, |(row, _)| row as usize);

        let mut rows = range
            .rows()
            .enumerate()
            .map(|(index, cells)| UsageRow {
                line: first_row + index + 1,
                fields: cells.iter().map(cell_text).collect(),
            })
            .filter(|row| row.fields.iter().any(|f| !f.is_empty()));
        let header = rows.next().ok_or(ExtractionError::NoHeader)?;
        let table = Self::new(header.fields, rows.collect());
        tracing::debug!(
            sheet = ?workbook.sheet_names().first(),
            columns = ?table.columns,
            rows = table.rows.len(),
            "read usage workbook"
        );
        Ok(table)
    }

    pub fn from_reader(
        mut reader: impl Read,
        delimiter: Option<u8>,
    ) -> Result<Self, ExtractionError> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .map_err(|source| ExtractionError::Io {
                path: Default::default(),
                source,
            })?;
        // Spreadsheet apps like to save CSVs with a byte order mark.
        let content = content.trim_start_matches('\u{feff}');
        let header_line = content
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or(ExtractionError::NoHeader)?;
        let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(header_line));

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(content.as_bytes());
        let columns: Vec<String> = csv_reader.headers()?.iter().map(str::to_owned).collect();
        if columns.iter().all(String::is_empty) {
            return Err(ExtractionError::NoHeader);
        }

        let mut rows = Vec::new();
        for (index, record) in csv_reader.into_records().enumerate() {
            let record = record?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            let line = record
                .position()
                .map(|p| line_number(content.as_bytes(), p.byte() as usize))
                .unwrap_or(index + 2);
            rows.push(UsageRow {
                line,
                fields: record.iter().map(str::to_owned).collect(),
            });
        }
        let table = Self::new(columns, rows);
        tracing::debug!(columns = ?table.columns, rows = table.rows.len(), "read usage table");
        Ok(table)
    }
}

/// Line of the first non-newline byte at or after `offset`. The csv reader counts records, not
/// lines, and a record's offset sits before any blank lines it skipped.
fn line_number(content: &[u8], offset: usize) -> usize {
    let offset = offset.min(content.len());
    let start = content[offset..]
        .iter()
        .position(|b| *b != b'\n' && *b != b'\r')
        .map_or(content.len(), |skipped| offset + skipped);
    content[..start].iter().filter(|b| **b == b'\n').count() + 1
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::DateTime(serial) => excel_serial_to_datetime(serial.as_f64())
            .map(|datetime| datetime.to_string())
            .unwrap_or_else(|| serial.as_f64().to_string()),
        other => other.to_string(),
    }
}

/// Spreadsheet dates are days since 1899-12-30, with the time of day as the fraction.
fn excel_serial_to_datetime(serial: f64) -> Option<DateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let seconds = ((serial - serial.trunc()) * 86_400.0).round() as i64;
    let day = date(1899, 12, 30).checked_add(days.days()).ok()?;
    day.to_datetime(Time::midnight())
        .checked_add(SignedDuration::from_secs(seconds))
        .ok()
}

/// Picks whichever of comma, semicolon or tab appears most in the header line.
fn sniff_delimiter(header_line: &str) -> u8 {
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|d| {
            let count = header_line.bytes().filter(|b| b == d).count();
            // Ties go to the comma, which comes first.
            (count, if *d == b',' { 1 } else { 0 })
        })
        .unwrap_or(b',')
}

/// Reads the calendar date out of the kinds of timestamps usage exports contain. Instants that
/// carry a UTC offset are dated in UTC; wall-clock times keep the date as written.
pub fn parse_timestamp_date(value: &str) -> Option<Date> {
    let value = value.trim();
    if let Ok(timestamp) = Timestamp::from_str(value) {
        return Some(timestamp.to_zoned(TimeZone::UTC).date());
    }
    if let Ok(date) = Date::from_str(value) {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::from_str(value) {
        return Some(datetime.date());
    }
    let first_token = value.split([' ', 'T']).next()?;
    Date::from_str(first_token).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[rstest]
    #[case("2024-01-01", Some(date(2024, 1, 1)))]
    #[case("2024-01-01 13:45", Some(date(2024, 1, 1)))]
    #[case("2024-01-01 13:45:10", Some(date(2024, 1, 1)))]
    #[case("2024-01-01T13:45:10", Some(date(2024, 1, 1)))]
    #[case("2024-01-01T23:30:00Z", Some(date(2024, 1, 1)))]
    #[case("2024-01-01T02:00:00+05:00", Some(date(2023, 12, 31)))]
    #[case("2023-12-31T21:00:00Z", Some(date(2023, 12, 31)))]
    #[case("2024-01-01T22:30:00-03:00", Some(date(2024, 1, 2)))]
    #[case("  2024-02-29  ", Some(date(2024, 2, 29)))]
    #[case("yesterday", None)]
    #[case("2023-02-29", None)]
    #[case("", None)]
    fn parses_export_timestamps(#[case] value: &str, #[case] expected: Option<Date>) {
        assert_eq!(parse_timestamp_date(value), expected);
    }

    #[rstest]
    #[case("Date,Energy(Wh)", b',')]
    #[case("Date;Energy (Wh);Notes", b';')]
    #[case("Date\tEnergy (Wh)", b'\t')]
    #[case("Date", b',')]
    fn sniffs_delimiter_from_header(#[case] header: &str, #[case] expected: u8) {
        assert_eq!(sniff_delimiter(header), expected);
    }

    #[rstest]
    fn reads_table_skipping_blank_rows() {
        let data = "\u{feff}Date,Energy(Wh)\n2024-01-01,1000\n\n,\n2024-01-02, 500 \n";
        let table = UsageTable::from_reader(data.as_bytes(), None).unwrap();
        assert_eq!(table.columns(), &["Date".to_string(), "Energy(Wh)".to_string()]);
        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.rows()[0].get(1), "1000");
        assert_eq!(table.rows()[1].get(1), "500");
        assert_eq!(table.rows()[1].get(7), "");
    }

    #[rstest]
    fn reads_semicolon_table_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"Time;Energy (kWh)\n2024-01-01 00:00;0,5\n")
            .unwrap();
        let table = UsageTable::from_path(temp_file.path(), None).unwrap();
        assert_eq!(table.columns().len(), 2);
        assert_eq!(table.rows()[0].get(0), "2024-01-01 00:00");
        assert_eq!(table.rows()[0].line, 2);
    }

    #[rstest]
    fn empty_input_has_no_header() {
        let err = UsageTable::from_reader("\n\n".as_bytes(), None).unwrap_err();
        assert!(matches!(err, ExtractionError::NoHeader));
    }

    #[rstest]
    fn missing_file_reports_path() {
        let err = UsageTable::from_path(Path::new("/definitely/not/here.csv"), None).unwrap_err();
        match err {
            ExtractionError::Io { path, .. } => {
                assert_eq!(path, Path::new("/definitely/not/here.csv"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    fn line_numbers_count_skipped_blank_lines() {
        let data = "\n\nDate,Energy(Wh)\n\n2024-01-01,1\n\r\n2024-01-02,2\n";
        let table = UsageTable::from_reader(data.as_bytes(), None).unwrap();
        let lines: Vec<usize> = table.rows().iter().map(|row| row.line).collect();
        assert_eq!(lines, vec![5, 7]);
    }

    #[rstest]
    fn reads_first_worksheet_of_a_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plug-usage.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(1, 0, "Date").unwrap();
        sheet.write_string(1, 1, "Energy (Wh)").unwrap();
        sheet.write_string(2, 0, "2024-01-01").unwrap();
        sheet.write_number(2, 1, 1000).unwrap();
        sheet.write_string(3, 0, "2024-01-02").unwrap();
        sheet.write_number(3, 1, 512.5).unwrap();
        workbook.save(&path).unwrap();

        let table = UsageTable::from_path(&path, None).unwrap();
        assert_eq!(
            table.columns(),
            &["Date".to_string(), "Energy (Wh)".to_string()]
        );
        assert_eq!(
            table.rows(),
            &[
                UsageRow {
                    line: 3,
                    fields: vec!["2024-01-01".to_string(), "1000".to_string()],
                },
                UsageRow {
                    line: 4,
                    fields: vec!["2024-01-02".to_string(), "512.5".to_string()],
                },
            ]
        );
    }

    #[rstest]
    fn unreadable_workbook_is_an_error() {
        let mut temp_file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        temp_file.write_all(b"Date,Energy(Wh)\n").unwrap();
        let err = UsageTable::from_path(temp_file.path(), None).unwrap_err();
        assert!(matches!(err, ExtractionError::Workbook(_)));
    }

    #[rstest]
    #[case(45292.0, Some("2024-01-01T00:00:00"))]
    #[case(45292.5, Some("2024-01-01T12:00:00"))]
    #[case(45351.75, Some("2024-02-29T18:00:00"))]
    #[case(-1.0, None)]
    fn converts_spreadsheet_serial_dates(#[case] serial: f64, #[case] expected: Option<&str>) {
        assert_eq!(
            excel_serial_to_datetime(serial).map(|datetime| datetime.to_string()),
            expected.map(str::to_string)
        );
    }
}
