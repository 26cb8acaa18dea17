//! Lenient timestamp coercion for the date columns of an export.

use once_cell::sync::Lazy;
use regex::Regex;
use time::format_description::well_known::Rfc3339;
use time::macros::{date, format_description};
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use unify_core::Cell;

static ORDINAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").expect("valid ordinal regex"));

// Serial 0 is 1899-12-30 in the 1900 date system.
const EXCEL_EPOCH: Date = date!(1899 - 12 - 30);
const MAX_SERIAL: f64 = 2_958_466.0;

/// Convert an Excel serial day number into a timestamp, to the nearest second.
pub fn from_excel_serial(serial: f64) -> Option<PrimitiveDateTime> {
    if !serial.is_finite() || !(0.0..MAX_SERIAL).contains(&serial) {
        return None;
    }
    let secs = (serial * 86_400.0).round() as i64;
    PrimitiveDateTime::new(EXCEL_EPOCH, Time::MIDNIGHT).checked_add(Duration::seconds(secs))
}

/// Parse the textual timestamp forms seen in console exports. Offsets are converted to
/// UTC and dropped.
pub fn parse_timestamp(text: &str) -> Option<PrimitiveDateTime> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(odt) = OffsetDateTime::parse(t, &Rfc3339) {
        let utc = odt.to_offset(UtcOffset::UTC);
        return Some(PrimitiveDateTime::new(utc.date(), utc.time()));
    }

    let datetime_formats = [
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
        format_description!("[year]-[month]-[day] [hour]:[minute]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]"),
        format_description!("[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]:[second]"),
        format_description!("[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]"),
        format_description!("[month repr:short] [day padding:none] [year] [hour padding:none]:[minute]:[second]"),
        format_description!("[month repr:short] [day padding:none], [year] [hour padding:none]:[minute]:[second]"),
        format_description!("[month repr:short] [day padding:none] [year] [hour padding:none]:[minute]"),
        format_description!("[month repr:short] [day padding:none], [year] [hour padding:none]:[minute]"),
    ];
    let date_formats = [
        format_description!("[year]-[month]-[day]"),
        format_description!("[month padding:none]/[day padding:none]/[year]"),
        format_description!("[month repr:short] [day padding:none] [year]"),
        format_description!("[month repr:short] [day padding:none], [year]"),
    ];

    // "Aug 5th 2024" -> "Aug 5 2024"
    let cleaned = ORDINAL_RE.replace_all(t, "$1");
    let cleaned = cleaned.as_ref();

    for fmt in datetime_formats {
        if let Ok(dt) = PrimitiveDateTime::parse(cleaned, fmt) {
            return Some(dt);
        }
    }
    for fmt in date_formats {
        if let Ok(d) = Date::parse(cleaned, fmt) {
            return Some(PrimitiveDateTime::new(d, Time::MIDNIGHT));
        }
    }
    None
}

/// Coerce one cell of a date column. Anything that does not read as a timestamp becomes
/// absent.
pub fn coerce_timestamp(cell: Cell) -> Cell {
    match cell {
        Cell::DateTime(_) => cell,
        Cell::Text(s) => parse_timestamp(&s).map(Cell::DateTime).unwrap_or(Cell::Empty),
        Cell::Int(i) => from_excel_serial(i as f64).map(Cell::DateTime).unwrap_or(Cell::Empty),
        Cell::Float(f) => from_excel_serial(f).map(Cell::DateTime).unwrap_or(Cell::Empty),
        Cell::Empty | Cell::Bool(_) => Cell::Empty,
    }
}
