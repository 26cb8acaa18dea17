use thiserror::Error;
use unify_core::TableError;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{file}: IO error: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}: not a spreadsheet workbook (detected {detected})")]
    UnsupportedContent { file: String, detected: String },

    #[error("{file}: failed to open workbook: {source}")]
    Open {
        file: String,
        #[source]
        source: calamine::Error,
    },

    #[error("{0}: workbook has no worksheets")]
    NoWorksheet(String),

    #[error("header row {index} is outside a sheet of {height} rows")]
    HeaderOutOfRange { index: usize, height: usize },

    #[error(transparent)]
    Table(#[from] TableError),
}
