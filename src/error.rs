use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Every failure that aborts an embedding run.
///
/// Split failures and evaluation shortfalls are not errors: they are reported
/// through `SplitOutcome` and `EvaluationOutcome` and the run continues.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("csv error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    #[error("json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("image error: {source}")]
    Image {
        #[from]
        source: image::ImageError,
    },

    #[error("thread pool error: {source}")]
    ThreadPool {
        #[from]
        source: rayon::ThreadPoolBuildError,
    },

    #[error("malformed input row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("invalid embedding specification: {0}")]
    InvalidSpecification(String),

    #[error("output directory {0:?} already exists")]
    OutputDirectoryExists(PathBuf),

    #[error("local scale needs {required} other points per point, found only {found}")]
    NotEnoughPoints { required: usize, found: usize },

    #[error(
        "unstable floating point calculation at iteration {iteration}: \
         point {point} projection {projection} is no longer finite"
    )]
    NumericalInstability {
        iteration: u32,
        point: usize,
        projection: usize,
    },
}

pub type Result<T> = std::result::Result<T, EmbedError>;

impl EmbedError {
    pub(crate) fn spec(message: impl Into<String>) -> Self {
        EmbedError::InvalidSpecification(message.into())
    }
}
