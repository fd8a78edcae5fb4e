use thiserror::Error;

/// Errors surfaced at the crate's I/O boundary.
///
/// The aggregation pipeline itself never returns an error: malformed values
/// are normalised while decoding and zero denominators finalise to sentinels.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected input shape in {path}: {message}")]
    InvalidShape { path: String, message: String },

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ReportError {
    pub fn io(path: &str, source: std::io::Error) -> Self {
        ReportError::Io {
            path: path.to_string(),
            source,
        }
    }

    pub fn json(path: &str, source: serde_json::Error) -> Self {
        ReportError::Json {
            path: path.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
