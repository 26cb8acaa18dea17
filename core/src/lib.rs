//! Core types shared by the ingest, dedup and report crates: the cell/table model and
//! the column-name normalizer.

pub mod cell;
pub mod normalize;
pub mod table;

pub use cell::Cell;
pub use normalize::{normalize_column, normalize_header};
pub use table::{ColumnKey, ColumnKind, RowIndex, Table, TableError};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Canonical column identifiers the pipeline knows about.
pub mod columns {
    pub const ENDPOINT_NAME: &str = "endpoint_name";
    pub const ENDPOINT_ALIAS: &str = "endpoint_alias";
    pub const ENDPOINT_STATUS: &str = "endpoint_status";
    pub const OPERATING_SYSTEM: &str = "operating_system";
    pub const LAST_SEEN: &str = "last_seen";
    pub const LAST_UPGRADE_STATUS_TIME: &str = "last_upgrade_status_time";
    pub const LAST_UPGRADE_STATUS: &str = "last_upgrade_status";
    pub const LAST_UPGRADE_FAILURE_REASON: &str = "last_upgrade_failure_reason";
    pub const IP_ADDRESS: &str = "ip_address";
    pub const IPV6_ADDRESS: &str = "ipv6_address";
    pub const IPV4: &str = "ipv4";
    pub const IPV6: &str = "ipv6";

    /// Timestamp columns in recency order: the first one decides, the second breaks ties.
    pub const RECENCY: [&str; 2] = [LAST_SEEN, LAST_UPGRADE_STATUS_TIME];
}
