//! # gbnf-json
//!
//! Compiles a subset of JSON Schema into a GBNF grammar that constrains a
//! language model's sampler to conforming JSON, and validates parsed output
//! against the same schema.
//!
//! ## Overview
//!
//! A grammar guarantees the syntax of what a model emits. Everything a
//! grammar cannot express cheaply, such as numeric `enum` equality or date
//! formats, is checked afterwards by the validator. Both walk the same loaded
//! [`JsonSchema`], so they agree on what a schema means.
//!
//! ## Core Types
//!
//! - [`JsonSchema`]: a loaded schema; `$defs` references are resolved to ids
//! - [`compile`]: schema to GBNF text, shaped by [`GrammarOptions`]
//! - [`validate`] / [`validate_all`]: value against schema
//! - [`JsonSchemaGrammar`]: a compiled grammar paired with its schema
//! - [`GrammarCatalog`]: named, thread-safe storage for compiled grammars
//! - [`describe_schema`]: a TypeScript-like summary for prompts
//!
//! ## Example
//!
//! ```rust
//! use gbnf_json::{compile, validate, GrammarOptions, JsonSchema};
//! use serde_json::json;
//!
//! let schema = JsonSchema::from_value(&json!({
//!     "type": "object",
//!     "properties": {
//!         "name": {"type": "string"},
//!         "age": {"type": "integer"}
//!     }
//! }))
//! .unwrap();
//!
//! let grammar = compile(&schema, &GrammarOptions::default()).unwrap();
//! assert!(grammar.starts_with("root ::= "));
//!
//! assert!(validate(&json!({"name": "Ada", "age": 36}), &schema).is_ok());
//! assert!(validate(&json!({"name": "Ada"}), &schema).is_err());
//! ```

pub mod catalog;
pub mod describe;
pub mod error;
pub mod grammar;
pub mod json_grammar;
pub mod path;
pub mod schema;
pub mod validation;

pub use catalog::{CatalogError, GrammarCatalog};
pub use describe::describe_schema;
pub use error::{CompileError, InvariantViolation, ParseError, SchemaError, SchemaErrors};
pub use grammar::{compile, GrammarOptions, STOP_SEQUENCE};
pub use json_grammar::JsonSchemaGrammar;
pub use path::{JsonPath, PathSegment};
pub use schema::{
    AdditionalProperties, ArrayShape, BasicType, JsonSchema, Literal, ObjectShape, SchemaId,
    SchemaKind, SchemaNode, StringFormat,
};
pub use validation::{validate, validate_all, ValidationContext};

/// Type alias for validation results using SchemaErrors
pub type ValidationResult<T> = stillwater::Validation<T, SchemaErrors>;
