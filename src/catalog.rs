//! Named storage for compiled grammars.
//!
//! This module provides the [`GrammarCatalog`] type, which compiles schemas
//! once and shares the results between threads.

use parking_lot::RwLock;
use rayon::prelude::*;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{CompileError, ParseError, SchemaError};
use crate::grammar::GrammarOptions;
use crate::json_grammar::JsonSchemaGrammar;
use crate::schema::JsonSchema;
use crate::validation::ValidationContext;

type GrammarMap = Arc<RwLock<HashMap<String, Arc<JsonSchemaGrammar>>>>;

/// A thread-safe catalog of compiled grammars keyed by name.
///
/// # Thread Safety
///
/// The catalog uses `Arc<RwLock<...>>`:
/// - lookups, parsing and validation only take the read lock
/// - registration takes the write lock
///
/// Cloning a catalog yields a handle to the same storage. Every schema is
/// compiled with its own rule registry, outside the lock.
///
/// # Example
///
/// ```rust
/// use gbnf_json::{GrammarCatalog, JsonSchema};
/// use serde_json::json;
///
/// let catalog = GrammarCatalog::new();
/// let schema: JsonSchema = r#"{"type": "array", "items": {"type": "string"}}"#.parse().unwrap();
/// catalog.register("tags", schema).unwrap();
///
/// assert!(catalog.get("tags").is_some());
/// assert_eq!(catalog.parse("tags", r#"["a", "b"]"#).unwrap(), json!(["a", "b"]));
/// ```
#[derive(Clone)]
pub struct GrammarCatalog {
    grammars: GrammarMap,
    options: GrammarOptions,
    max_depth: usize,
}

impl GrammarCatalog {
    /// Creates an empty catalog with default grammar options and max depth 100.
    pub fn new() -> Self {
        Self {
            grammars: Arc::new(RwLock::new(HashMap::new())),
            options: GrammarOptions::default(),
            max_depth: 100,
        }
    }

    /// Sets the formatting used for grammars registered from now on.
    pub fn with_options(mut self, options: GrammarOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the reference depth limit used by [`parse`](Self::parse) and
    /// [`validate_batch`](Self::validate_batch).
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Compiles `schema` and stores it under `name`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateName` if the name is taken and
    /// `CatalogError::Compile` if the schema does not compile.
    pub fn register(
        &self,
        name: impl Into<String>,
        schema: JsonSchema,
    ) -> Result<Arc<JsonSchemaGrammar>, CatalogError> {
        let name = name.into();
        if self.grammars.read().contains_key(&name) {
            return Err(CatalogError::DuplicateName(name));
        }

        let grammar = Arc::new(JsonSchemaGrammar::with_options(schema, self.options)?);

        let mut grammars = self.grammars.write();
        if grammars.contains_key(&name) {
            return Err(CatalogError::DuplicateName(name));
        }
        debug!(name = %name, "registered grammar");
        grammars.insert(name, Arc::clone(&grammar));
        Ok(grammar)
    }

    /// Retrieves a grammar by name.
    pub fn get(&self, name: &str) -> Option<Arc<JsonSchemaGrammar>> {
        self.grammars.read().get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.grammars.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.grammars.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.grammars.read().is_empty()
    }

    fn context(&self) -> ValidationContext {
        ValidationContext::new(self.max_depth)
    }

    fn require(&self, name: &str) -> Result<Arc<JsonSchemaGrammar>, CatalogError> {
        self.get(name)
            .ok_or_else(|| CatalogError::GrammarNotFound(name.to_string()))
    }

    /// Parses model output with the named grammar.
    pub fn parse(&self, name: &str, text: &str) -> Result<Value, CatalogError> {
        Ok(self.require(name)?.parse_with(text, &self.context())?)
    }

    /// Validates many values against the named grammar's schema in parallel.
    ///
    /// Results are returned in input order.
    pub fn validate_batch(
        &self,
        name: &str,
        values: &[Value],
    ) -> Result<Vec<Result<(), SchemaError>>, CatalogError> {
        let grammar = self.require(name)?;
        let context = self.context();
        let schema = grammar.schema();
        Ok(values
            .par_iter()
            .map(|value| context.validate(value, schema))
            .collect())
    }
}

impl Default for GrammarCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Attempted to register a grammar with a name that already exists.
    #[error("grammar '{0}' already registered")]
    DuplicateName(String),

    /// No grammar is registered under the name.
    #[error("grammar '{0}' not found")]
    GrammarNotFound(String),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(value: Value) -> JsonSchema {
        JsonSchema::from_value(&value).unwrap()
    }

    #[test]
    fn test_register_twice_fails() {
        let catalog = GrammarCatalog::new();
        catalog.register("a", schema(json!({"type": "null"}))).unwrap();
        let err = catalog.register("a", schema(json!({"type": "null"}))).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName(name) if name == "a"));
    }

    #[test]
    fn test_compile_failure_is_not_stored() {
        let catalog = GrammarCatalog::new();
        let looping = schema(json!({
            "$defs": {"Loop": {"$ref": "#/$defs/Loop"}},
            "$ref": "#/$defs/Loop"
        }));
        assert!(matches!(
            catalog.register("loop", looping),
            Err(CatalogError::Compile(CompileError::SelfReferentialDef { .. }))
        ));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_clones_share_storage() {
        let catalog = GrammarCatalog::new();
        let handle = catalog.clone();
        handle.register("x", schema(json!({"type": "integer"}))).unwrap();
        assert_eq!(catalog.names(), vec!["x".to_string()]);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_unknown_name() {
        let catalog = GrammarCatalog::new();
        assert!(matches!(
            catalog.parse("missing", "1"),
            Err(CatalogError::GrammarNotFound(_))
        ));
        assert!(catalog.validate_batch("missing", &[]).is_err());
    }
}
