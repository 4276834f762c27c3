use crate::types::Field;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A mandatory value (zone, open date) is absent or unparseable.
    #[error("line {line}: invalid {field}: {reason}")]
    DataFormat {
        line: usize,
        field: Field,
        reason: String,
    },

    #[error("required column {0} not found in the source file")]
    MissingColumn(&'static str),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("no file matching '{0}' found")]
    SourceNotFound(String),

    #[error("workbook contains no sheets")]
    EmptyWorkbook,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
