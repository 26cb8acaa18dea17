//! Raw grid + header row -> normalized endpoint records.

use crate::dates::coerce_timestamp;
use crate::{IngestError, RawTable};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use unify_core::columns::{ENDPOINT_STATUS, IPV4, IPV6, IPV6_ADDRESS, IP_ADDRESS, RECENCY};
use unify_core::{normalize_header, Cell, Table};

static IPV4_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3}(?:\.\d{1,3}){3})\b").expect("valid ipv4 regex"));

/// Slice the header off `raw` at `header_row` and clean the body: drop empty columns and
/// rows, normalize names, coerce timestamps, status text and address fields.
///
/// Values that fail to coerce become absent; only fully empty rows are ever dropped.
pub fn parse_records(raw: &RawTable, header_row: usize) -> Result<Table, IngestError> {
    let header = raw.row(header_row).ok_or(IngestError::HeaderOutOfRange {
        index: header_row,
        height: raw.height(),
    })?;
    let body = &raw.rows()[header_row + 1..];

    let keep_cols: Vec<usize> = (0..raw.width())
        .filter(|&c| body.iter().any(|row| !row[c].is_empty()))
        .collect();
    let rows: Vec<Vec<Cell>> = body
        .iter()
        .filter(|row| keep_cols.iter().any(|&c| !row[c].is_empty()))
        .map(|row| keep_cols.iter().map(|&c| row[c].clone()).collect())
        .collect();
    let names: Vec<String> = keep_cols.iter().map(|&c| normalize_header(&header[c])).collect();
    debug!(
        header_row,
        columns = names.len(),
        rows = rows.len(),
        dropped_rows = body.len() - rows.len(),
        "sliced record body"
    );

    let mut table = Table::from_rows(names, rows)?;
    for col in RECENCY {
        table = table.map_column(col, coerce_timestamp);
    }
    table = table.map_column(ENDPOINT_STATUS, |c| match c {
        Cell::Empty => Cell::Empty,
        other => Cell::Text(title_case(other.to_string().trim())),
    });

    let ipv4: Option<Vec<Cell>> = table.column(IP_ADDRESS).map(|it| it.map(first_ipv4).collect());
    if let Some(values) = ipv4 {
        table = table.with_column(IPV4, values)?;
    }
    let ipv6: Option<Vec<Cell>> = table.column(IPV6_ADDRESS).map(|it| it.map(first_ipv6).collect());
    if let Some(values) = ipv6 {
        table = table.with_column(IPV6, values)?;
    }
    Ok(table)
}

/// First dotted-quad token of a cell that may list several addresses.
pub fn first_ipv4(cell: &Cell) -> Cell {
    if cell.is_empty() {
        return Cell::Empty;
    }
    let text = cell.to_string();
    IPV4_RE
        .captures(&text)
        .map(|caps| Cell::Text(caps[1].to_string()))
        .unwrap_or(Cell::Empty)
}

/// First comma-separated segment containing a colon.
pub fn first_ipv6(cell: &Cell) -> Cell {
    if cell.is_empty() {
        return Cell::Empty;
    }
    cell.to_string()
        .split(',')
        .map(str::trim)
        .find(|part| !part.is_empty() && part.contains(':'))
        .map(Cell::from)
        .unwrap_or(Cell::Empty)
}

/// Uppercase the first letter of every word and lowercase the rest; a word starts after
/// any character that is not a letter.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn cell(v: &str) -> Cell {
        if v.is_empty() {
            Cell::Empty
        } else {
            Cell::from(v)
        }
    }

    fn raw(rows: &[&[&str]]) -> RawTable {
        RawTable::new(rows.iter().map(|r| r.iter().map(|v| cell(v)).collect()).collect())
    }

    #[test]
    fn slices_header_and_drops_empty_rows_and_columns() {
        let raw = raw(&[
            &["Cortex export", "", "", ""],
            &["Endpoint Name", "Unused", "Endpoint Status", "Last Seen"],
            &["host1", "", " connected ", "2024-06-01 10:00:00"],
            &["", "", "", ""],
            &["host2", "", "", ""],
        ]);
        let t = parse_records(&raw, 1).unwrap();
        assert_eq!(t.column_names(), vec!["endpoint_name", "endpoint_status", "last_seen"]);
        assert_eq!(t.height(), 2);
        assert_eq!(t.rows()[0][1], Cell::from("Connected"));
        assert_eq!(t.rows()[0][2], Cell::DateTime(datetime!(2024-06-01 10:00:00)));
        assert_eq!(t.rows()[1], vec![Cell::from("host2"), Cell::Empty, Cell::Empty]);
    }

    #[test]
    fn unparsable_dates_keep_the_row() {
        let raw = raw(&[
            &["Endpoint Name", "Last Upgrade Status Time"],
            &["host1", "not a date"],
        ]);
        let t = parse_records(&raw, 0).unwrap();
        assert_eq!(t.height(), 1);
        assert_eq!(t.rows()[0][1], Cell::Empty);
    }

    #[test]
    fn extracts_addresses_into_new_columns() {
        let raw = raw(&[
            &["Endpoint Name", "IP Address", "IPv6 Address"],
            &["host1", "10.0.0.5, 10.0.0.6", "fe80::1, 2001:db8::2"],
            &["host2", "unknown", "n/a-address"],
        ]);
        let t = parse_records(&raw, 0).unwrap();
        assert_eq!(
            t.column_names(),
            vec!["endpoint_name", "ip_address", "ipv6_address", "ipv4", "ipv6"]
        );
        assert_eq!(t.rows()[0][3], Cell::from("10.0.0.5"));
        assert_eq!(t.rows()[0][4], Cell::from("fe80::1"));
        assert_eq!(t.rows()[1][3], Cell::Empty);
        assert_eq!(t.rows()[1][4], Cell::Empty);
    }

    #[test]
    fn header_outside_sheet() {
        let raw = raw(&[&["only row"]]);
        assert!(matches!(
            parse_records(&raw, 1),
            Err(IngestError::HeaderOutOfRange { index: 1, height: 1 })
        ));
    }

    #[test]
    fn ipv4_needs_a_dotted_quad() {
        assert_eq!(first_ipv4(&Cell::from("10.0.0.5, 10.0.0.6")), Cell::from("10.0.0.5"));
        assert_eq!(first_ipv4(&Cell::from("host 192.168.1.20/24")), Cell::from("192.168.1.20"));
        assert_eq!(first_ipv4(&Cell::from("10.0.5")), Cell::Empty);
        assert_eq!(first_ipv4(&Cell::Empty), Cell::Empty);
    }

    #[test]
    fn ipv6_takes_first_segment_with_colon() {
        assert_eq!(first_ipv6(&Cell::from("fe80::1, 2001:db8::2")), Cell::from("fe80::1"));
        assert_eq!(first_ipv6(&Cell::from(" , 10.0.0.1, ::1")), Cell::from("::1"));
        assert_eq!(first_ipv6(&Cell::from("10.0.0.1")), Cell::Empty);
    }

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("DISCONNECTED"), "Disconnected");
        assert_eq!(title_case("connection lost"), "Connection Lost");
        assert_eq!(title_case("pending_upgrade"), "Pending_Upgrade");
    }
}
