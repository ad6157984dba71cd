use std::sync::OnceLock;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use regex::Regex;
use tracing::debug;

use crate::errors::AppError;
use crate::models::{Feature, RawRow};

/// Column names assigned positionally, whatever the uploaded header says.
pub const EXPECTED_COLUMNS: [&str; 6] = ["Date", "Close/Last", "Volume", "Open", "High", "Low"];

const DATE_FORMATS: [&str; 2] = ["%m/%d/%Y", "%Y-%m-%d"];

fn currency_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\$,]").expect("static regex"))
}

/// Parse uploaded price history into rows sorted by ascending date.
///
/// The first line is treated as a header and discarded. Every data line must
/// carry exactly six cells.
pub fn parse_price_table(text: &str) -> Result<Vec<RawRow>, AppError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        // header is line 1
        let line = idx + 2;
        let record =
            record.map_err(|e| AppError::Schema(format!("line {}: unreadable row: {}", line, e)))?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        rows.push(parse_record(&record, line)?);
    }

    if rows.is_empty() {
        return Err(AppError::Schema("no data rows after the header".to_string()));
    }

    rows.sort_by_key(|row| row.date);
    debug!("Ingested {} price rows", rows.len());
    Ok(rows)
}

fn parse_record(record: &StringRecord, line: usize) -> Result<RawRow, AppError> {
    if record.len() != EXPECTED_COLUMNS.len() {
        return Err(AppError::Schema(format!(
            "line {}: expected {} columns ({}), found {}",
            line,
            EXPECTED_COLUMNS.len(),
            EXPECTED_COLUMNS.join(", "),
            record.len()
        )));
    }

    let date = parse_date(&record[0])
        .ok_or_else(|| AppError::Schema(format!("line {}: invalid date '{}'", line, &record[0])))?;

    Ok(RawRow {
        date,
        close: parse_price(&record[1], Feature::Close, line)?,
        volume: parse_volume(&record[2], line)?,
        open: parse_price(&record[3], Feature::Open, line)?,
        high: parse_price(&record[4], Feature::High, line)?,
        low: parse_price(&record[5], Feature::Low, line)?,
    })
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Strips `$` and thousands separators, then parses a finite decimal.
pub fn parse_money(raw: &str) -> Option<f64> {
    let cleaned = currency_chars().replace_all(raw.trim(), "");
    let value = cleaned.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

fn parse_price(raw: &str, feature: Feature, line: usize) -> Result<f64, AppError> {
    parse_money(raw).ok_or_else(|| {
        AppError::Schema(format!(
            "line {}: non-numeric {} value '{}'",
            line, feature, raw
        ))
    })
}

fn parse_volume(raw: &str, line: usize) -> Result<u64, AppError> {
    let value = parse_money(raw).ok_or_else(|| {
        AppError::Schema(format!("line {}: non-numeric Volume value '{}'", line, raw))
    })?;
    // "1000.0" is what a float round-trip produces, so only whole numbers are refused
    if value < 0.0 || value.fract() != 0.0 || value > u64::MAX as f64 {
        return Err(AppError::Schema(format!(
            "line {}: Volume must be a non-negative whole number, got '{}'",
            line, raw
        )));
    }
    Ok(value as u64)
}
