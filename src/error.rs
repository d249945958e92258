use bigdecimal::BigDecimal;
use jiff::civil::Date;
use std::path::PathBuf;
use thiserror::Error;

/// A value typed by the operator that could not be read as the expected kind of number or date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not read {field} from {value:?}: expected {expected}")]
pub struct InputParseError {
    pub field: &'static str,
    pub value: String,
    pub expected: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Device usage ({device} kWh) is greater than the household total ({total} kWh)")]
    DeviceUsageExceedsTotal {
        device: BigDecimal,
        total: BigDecimal,
    },
    #[error("{field} must not be negative, got {value}")]
    Negative {
        field: &'static str,
        value: BigDecimal,
    },
    #[error("The billing period must be at least one day long")]
    ZeroBillDays,
    #[error("The billing period ends ({end}) before it starts ({start})")]
    PeriodEndsBeforeStart { start: Date, end: Date },
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(
        "Could not find a {missing} column in the usage data. Columns found: {}",
        columns.join(", ")
    )]
    SchemaNotRecognized {
        missing: ColumnKind,
        columns: Vec<String>,
    },
    #[error("Column {column:?} names neither kWh nor Wh; pass the energy unit explicitly")]
    UnitNotRecognized { column: String },
    #[error("No usage rows fall between {start} and {end}")]
    EmptyRange { start: Date, end: Date },
    #[error("Row {row}: {value:?} in column {column:?} is not a recognised date or time")]
    InvalidTimestamp {
        row: usize,
        column: String,
        value: String,
    },
    #[error("Row {row}: {value:?} in column {column:?} is not a number")]
    InvalidReading {
        row: usize,
        column: String,
        value: String,
    },
    #[error("Usage data is empty: no header row found")]
    NoHeader,
    #[error("Failed to read usage file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Usage file could not be parsed as delimited text")]
    Csv(#[from] csv::Error),
    #[error("Usage file could not be read as a spreadsheet workbook")]
    Workbook(#[from] calamine::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Timestamp,
    Energy,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnKind::Timestamp => f.write_str("timestamp"),
            ColumnKind::Energy => f.write_str("energy"),
        }
    }
}
