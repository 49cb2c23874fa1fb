//! Error types.
//!
//! - [`CompileError`]: the schema itself is malformed or unsupported.
//! - [`SchemaError`] / [`SchemaErrors`]: a value does not conform to a schema.
//! - [`ParseError`]: model output is not JSON, or does not conform.
//! - [`InvariantViolation`]: the compiler broke one of its own rules.

mod compile_error;
mod parse_error;
mod schema_error;

pub use compile_error::{CompileError, InvariantViolation};
pub use parse_error::ParseError;
pub use schema_error::{SchemaError, SchemaErrors};
