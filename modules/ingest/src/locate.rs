use crate::RawTable;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Header names that identify the real header row of an endpoint export.
pub const MARKER_COLUMNS: [&str; 4] = [
    "Endpoint Name",
    "Endpoint Type",
    "Operating System",
    "Agent Version",
];

/// Row used when no row carries the marker columns: the usual layout has a title in row 0.
pub const FALLBACK_HEADER_ROW: usize = 1;

/// First row whose trimmed, non-empty values include every marker column.
pub fn find_header(raw: &RawTable) -> Option<usize> {
    raw.rows().iter().position(|row| {
        let values: HashSet<String> = row
            .iter()
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string().trim().to_string())
            .collect();
        MARKER_COLUMNS.iter().all(|m| values.contains(*m))
    })
}

/// Header row of `raw`, falling back to [`FALLBACK_HEADER_ROW`].
///
/// The fallback is not derived from the data; callers get a warning in the log whenever
/// it is used so a wrong guess can be traced back to its file.
pub fn locate_header(raw: &RawTable) -> usize {
    match find_header(raw) {
        Some(idx) => {
            debug!(row = idx, "header row located by marker columns");
            idx
        }
        None => {
            warn!(
                row = FALLBACK_HEADER_ROW,
                "no row carries the marker columns; assuming the default header row"
            );
            FALLBACK_HEADER_ROW
        }
    }
}
