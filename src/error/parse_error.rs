//! Errors from parsing model output.

use super::SchemaError;

/// Text produced under a grammar could not be turned into a conforming value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// The text was not valid JSON.
    #[error("output is not valid JSON: {0}")]
    InvalidJson(String),

    /// The text was JSON but did not conform to the schema.
    #[error("output does not match the schema: {0}")]
    Schema(#[from] SchemaError),
}
