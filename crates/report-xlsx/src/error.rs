use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("export backend {0} is not available in this build")]
    Unavailable(&'static str),

    #[error("{backend} failed: {message}")]
    Backend { backend: &'static str, message: String },

    #[error("all export backends failed (primary: {primary}; fallback: {fallback})")]
    AllBackendsFailed {
        primary: Box<ExportError>,
        fallback: Box<ExportError>,
    },
}

impl ExportError {
    pub(crate) fn backend(backend: &'static str, err: impl std::fmt::Display) -> Self {
        ExportError::Backend { backend, message: err.to_string() }
    }
}
