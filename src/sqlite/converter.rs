// ABOUTME: SQLite to PostgreSQL value conversion driven by the target column type
// ABOUTME: Handles SQLite's dynamic typing, including its text, Unix and Julian date forms

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::Value;

use crate::schema::ColumnType;
use crate::target::CellValue;

/// Julian day number of the Unix epoch (1970-01-01T00:00:00Z)
const UNIX_EPOCH_JULIAN_DAY: f64 = 2_440_587.5;
const SECONDS_PER_DAY: f64 = 86_400.0;

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Convert a single SQLite value into the representation of `column_type`
///
/// SQLite stores any value in any column, so the conversion follows the
/// target type:
/// - INTEGER/SERIAL → i32 (integers, integral reals, numeric text)
/// - DOUBLE PRECISION → f64 (integers, reals, numeric text)
/// - TEXT → string (numbers are rendered as text)
/// - TIMESTAMP → text dates, Unix seconds, or Julian day numbers
/// - NULL stays NULL; BLOB is rejected
///
/// # Examples
///
/// ```
/// # use postgres_bulk_loader::sqlite::converter::sqlite_value_to_cell;
/// # use postgres_bulk_loader::schema::ColumnType;
/// # use postgres_bulk_loader::target::CellValue;
/// # use rusqlite::types::Value;
/// let cell = sqlite_value_to_cell(&Value::Integer(42), ColumnType::Integer).unwrap();
/// assert_eq!(cell, CellValue::Integer(42));
/// ```
pub fn sqlite_value_to_cell(value: &Value, column_type: ColumnType) -> Result<CellValue> {
    if let Value::Null = value {
        return Ok(CellValue::Null);
    }
    if let Value::Blob(b) = value {
        bail!("BLOB values ({} bytes) are not supported", b.len());
    }

    match column_type {
        ColumnType::Serial | ColumnType::Integer => to_integer(value).map(CellValue::Integer),
        ColumnType::Real => to_real(value).map(CellValue::Real),
        ColumnType::Text => Ok(CellValue::Text(to_text(value))),
        ColumnType::Timestamp => to_timestamp(value).map(CellValue::Timestamp),
    }
}

fn to_integer(value: &Value) -> Result<i32> {
    let wide = match value {
        Value::Integer(i) => *i,
        Value::Real(f) => {
            if f.fract() != 0.0 || !f.is_finite() {
                bail!("real {} has a fractional part", f);
            }
            *f as i64
        }
        Value::Text(s) => s
            .trim()
            .parse::<i64>()
            .with_context(|| format!("text '{}' is not an integer", s))?,
        _ => bail!("unsupported value for INTEGER column"),
    };

    i32::try_from(wide).map_err(|_| anyhow!("integer {} is out of range for INTEGER", wide))
}

fn to_real(value: &Value) -> Result<f64> {
    match value {
        Value::Integer(i) => Ok(*i as f64),
        Value::Real(f) => Ok(*f),
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .with_context(|| format!("text '{}' is not a number", s)),
        _ => bail!("unsupported value for DOUBLE PRECISION column"),
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Null | Value::Blob(_) => String::new(),
    }
}

fn to_timestamp(value: &Value) -> Result<NaiveDateTime> {
    match value {
        Value::Text(s) => parse_timestamp(s),
        Value::Integer(secs) => DateTime::from_timestamp(*secs, 0)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| anyhow!("Unix time {} is out of range", secs)),
        Value::Real(julian_day) => {
            let unix = (julian_day - UNIX_EPOCH_JULIAN_DAY) * SECONDS_PER_DAY;
            let secs = unix.floor();
            let nanos = ((unix - secs) * 1e9).round().min(999_999_999.0) as u32;
            DateTime::from_timestamp(secs as i64, nanos)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| anyhow!("Julian day {} is out of range", julian_day))
        }
        _ => bail!("unsupported value for TIMESTAMP column"),
    }
}

/// Parse the text date forms SQLite's date functions produce
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();

    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(ts);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts);
        }
    }

    bail!("unrecognized timestamp '{}'", raw)
}
