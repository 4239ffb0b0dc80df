use crate::schema::CanonicalField;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TipPoolError {
    #[error("No rows could be parsed from the input")]
    EmptyInput,

    #[error("No date columns found: expected headers like '05/08' after the name column")]
    NoDateColumns,

    #[error("Column mapping is incomplete, missing: {}", format_fields(.0))]
    IncompleteMapping(Vec<CanonicalField>),

    #[error("Header '{header}' mapped to {field} does not exist in the file")]
    UnknownHeader {
        field: CanonicalField,
        header: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_fields(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, TipPoolError>;
