use crate::billing::DateRange;
use crate::error::{ColumnKind, ExtractionError};
use crate::usage_data::{UsageRecord, UsageTable, parse_timestamp_date};
use bigdecimal::BigDecimal;
use clap::ValueEnum;
use std::str::FromStr;

/// Substrings that mark a column as holding timestamps or energy readings. Matching is
/// case-insensitive, and the first column (left to right) that contains any candidate wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRules {
    pub timestamp: Vec<String>,
    pub energy: Vec<String>,
}

impl Default for ColumnRules {
    fn default() -> Self {
        Self {
            timestamp: vec!["date".to_string(), "time".to_string()],
            energy: vec!["energy".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMatch {
    pub index: usize,
    pub name: String,
    /// Other columns that also matched and were passed over.
    pub alternatives: Vec<String>,
}

#[derive(ValueEnum, Copy, Clone, PartialEq, Eq, Debug)]
pub enum EnergyUnit {
    #[value(name = "kwh")]
    KilowattHours,
    #[value(name = "wh")]
    WattHours,
}

impl EnergyUnit {
    /// Guesses the unit from a header such as `Energy (Wh)` or `energy(kwh)`.
    pub fn from_column_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name.contains("kwh") {
            Some(EnergyUnit::KilowattHours)
        } else if name.contains("wh") {
            Some(EnergyUnit::WattHours)
        } else {
            None
        }
    }

    pub fn to_kwh(self, amount: BigDecimal) -> BigDecimal {
        match self {
            EnergyUnit::KilowattHours => amount,
            EnergyUnit::WattHours => amount / BigDecimal::from(1000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyRangePolicy {
    /// Nothing in range means the device used nothing.
    #[default]
    Zero,
    Error,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub rules: ColumnRules,
    pub timestamp_column: Option<String>,
    pub energy_column: Option<String>,
    pub unit: Option<EnergyUnit>,
    pub empty_range: EmptyRangePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceUsage {
    pub kwh: BigDecimal,
    pub timestamp_column: ColumnMatch,
    pub energy_column: ColumnMatch,
    pub unit: EnergyUnit,
    pub rows_included: usize,
}

pub fn extract(
    table: &UsageTable,
    range: &DateRange,
    options: &ExtractOptions,
) -> Result<DeviceUsage, ExtractionError> {
    let timestamp_column = locate_column(
        table,
        ColumnKind::Timestamp,
        options.timestamp_column.as_deref(),
        &options.rules.timestamp,
    )?;
    let energy_column = locate_column(
        table,
        ColumnKind::Energy,
        options.energy_column.as_deref(),
        &options.rules.energy,
    )?;
    let unit = match options.unit {
        Some(unit) => unit,
        None => EnergyUnit::from_column_name(&energy_column.name).ok_or_else(|| {
            ExtractionError::UnitNotRecognized {
                column: energy_column.name.clone(),
            }
        })?,
    };

    let records = usage_records(table, &timestamp_column, &energy_column, range)?;
    if records.is_empty() {
        match options.empty_range {
            EmptyRangePolicy::Zero => tracing::warn!(
                start = %range.start(),
                end = %range.end(),
                "no usage rows in the billing period, counting device usage as zero"
            ),
            EmptyRangePolicy::Error => {
                return Err(ExtractionError::EmptyRange {
                    start: range.start(),
                    end: range.end(),
                });
            }
        }
    }

    for record in &records {
        tracing::trace!(
            row = record.row,
            date = %record.timestamp,
            reading = %record.energy_reading,
            "including reading"
        );
    }
    let total: BigDecimal = records.iter().map(|r| &r.energy_reading).sum();
    let kwh = unit.to_kwh(total);
    tracing::info!(
        rows = records.len(),
        column = %energy_column.name,
        unit = ?unit,
        kwh = %kwh,
        "extracted device usage"
    );
    Ok(DeviceUsage {
        kwh,
        rows_included: records.len(),
        timestamp_column,
        energy_column,
        unit,
    })
}

/// Finds the column for `kind`, either by its exact (case-insensitive) name or by the rules.
pub fn locate_column(
    table: &UsageTable,
    kind: ColumnKind,
    explicit: Option<&str>,
    candidates: &[String],
) -> Result<ColumnMatch, ExtractionError> {
    let not_recognized = || ExtractionError::SchemaNotRecognized {
        missing: kind,
        columns: table.columns().to_vec(),
    };

    if let Some(wanted) = explicit {
        let index = table
            .columns()
            .iter()
            .position(|c| c.eq_ignore_ascii_case(wanted.trim()))
            .ok_or_else(not_recognized)?;
        return Ok(ColumnMatch {
            index,
            name: table.columns()[index].clone(),
            alternatives: Vec::new(),
        });
    }

    let candidates: Vec<String> = candidates.iter().map(|c| c.to_lowercase()).collect();
    let mut matching = table.columns().iter().enumerate().filter(|(_, name)| {
        let name = name.to_lowercase();
        candidates.iter().any(|c| name.contains(c.as_str()))
    });
    let (index, name) = matching.next().ok_or_else(not_recognized)?;
    let alternatives: Vec<String> = matching.map(|(_, name)| name.clone()).collect();
    if !alternatives.is_empty() {
        tracing::warn!(
            kind = %kind,
            chosen = %name,
            others = ?alternatives,
            "several columns look usable, using the first"
        );
    }
    Ok(ColumnMatch {
        index,
        name: name.clone(),
        alternatives,
    })
}

/// Readings from rows dated inside `range`. Rows with a blank timestamp or reading are skipped.
pub fn usage_records(
    table: &UsageTable,
    timestamp_column: &ColumnMatch,
    energy_column: &ColumnMatch,
    range: &DateRange,
) -> Result<Vec<UsageRecord>, ExtractionError> {
    let mut records = Vec::new();
    for row in table.rows() {
        let raw_timestamp = row.get(timestamp_column.index);
        if raw_timestamp.is_empty() {
            continue;
        }
        let timestamp =
            parse_timestamp_date(raw_timestamp).ok_or_else(|| ExtractionError::InvalidTimestamp {
                row: row.line,
                column: timestamp_column.name.clone(),
                value: raw_timestamp.to_string(),
            })?;
        if !range.contains(timestamp) {
            continue;
        }
        let raw_reading = row.get(energy_column.index);
        if raw_reading.is_empty() {
            tracing::debug!(row = row.line, "skipping row without a reading");
            continue;
        }
        let energy_reading =
            parse_reading(raw_reading).ok_or_else(|| ExtractionError::InvalidReading {
                row: row.line,
                column: energy_column.name.clone(),
                value: raw_reading.to_string(),
            })?;
        records.push(UsageRecord {
            row: row.line,
            timestamp,
            energy_reading,
        });
    }
    Ok(records)
}

fn parse_reading(value: &str) -> Option<BigDecimal> {
    if let Ok(reading) = BigDecimal::from_str(value) {
        return Some(reading);
    }
    // Semicolon-separated exports often use a decimal comma.
    if value.matches(',').count() == 1 && !value.contains('.') {
        return BigDecimal::from_str(&value.replace(',', ".")).ok();
    }
    None
}
