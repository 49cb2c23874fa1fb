//! A compiled grammar bundled with the schema it came from.

use std::str::FromStr;

use serde_json::Value;

use crate::error::{CompileError, ParseError};
use crate::grammar::{compile, GrammarOptions, STOP_SEQUENCE};
use crate::schema::JsonSchema;
use crate::validation::ValidationContext;

/// A schema compiled for structured output.
///
/// The grammar ends every value with [`STOP_SEQUENCE`], so a sampler can stop
/// as soon as the model emits it. [`parse`](JsonSchemaGrammar::parse) then
/// turns the generated text back into a conforming value.
///
/// # Example
///
/// ```rust
/// use gbnf_json::JsonSchemaGrammar;
/// use serde_json::json;
///
/// let grammar: JsonSchemaGrammar = r#"{
///     "type": "object",
///     "properties": {"answer": {"type": "integer"}}
/// }"#
/// .parse()
/// .unwrap();
///
/// assert!(grammar.grammar().starts_with("root ::= "));
/// assert_eq!(grammar.stop_sequence(), "\n\n\n\n");
///
/// let value = grammar.parse("{\"answer\": 42}\n\n\n\n").unwrap();
/// assert_eq!(value, json!({"answer": 42}));
/// assert!(grammar.parse("{\"answer\": \"42\"}").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct JsonSchemaGrammar {
    schema: JsonSchema,
    grammar: String,
}

impl JsonSchemaGrammar {
    /// Compiles `schema` with default formatting.
    pub fn new(schema: JsonSchema) -> Result<Self, CompileError> {
        Self::with_options(schema, GrammarOptions::default())
    }

    /// Compiles `schema` with `options`. Trailing newlines are always enabled.
    pub fn with_options(schema: JsonSchema, options: GrammarOptions) -> Result<Self, CompileError> {
        let grammar = compile(&schema, &options.trailing_newlines(true))?;
        Ok(Self { schema, grammar })
    }

    pub fn grammar(&self) -> &str {
        &self.grammar
    }

    pub fn schema(&self) -> &JsonSchema {
        &self.schema
    }

    /// Text after which generation should stop.
    pub fn stop_sequence(&self) -> &'static str {
        STOP_SEQUENCE
    }

    /// Parses generated text and checks it against the schema.
    ///
    /// Trailing whitespace, the stop sequence included, is ignored.
    pub fn parse(&self, text: &str) -> Result<Value, ParseError> {
        self.parse_with(text, &ValidationContext::default())
    }

    /// Like [`parse`](Self::parse), validating under `context`.
    pub fn parse_with(&self, text: &str, context: &ValidationContext) -> Result<Value, ParseError> {
        let value: Value = serde_json::from_str(text.trim_end())
            .map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        context.validate(&value, &self.schema)?;
        Ok(value)
    }
}

impl FromStr for JsonSchemaGrammar {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grammar(schema: Value) -> JsonSchemaGrammar {
        JsonSchemaGrammar::new(JsonSchema::from_value(&schema).unwrap()).unwrap()
    }

    #[test]
    fn test_root_ends_with_stop_sequence() {
        let g = grammar(json!({"type": "string"}));
        let root = g.grammar().lines().next().unwrap();
        assert_eq!(root, r#"root ::= string-rule "\n\n\n\n" [\n]*"#);
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        let g = grammar(json!({"type": "boolean"}));
        assert!(matches!(g.parse("tru"), Err(ParseError::InvalidJson(_))));
        assert_eq!(g.parse("true\n\n\n\n\n").unwrap(), json!(true));
    }

    #[test]
    fn test_parse_reports_schema_errors() {
        let g = grammar(json!({"type": "array", "items": {"type": "string"}}));
        match g.parse("[1]") {
            Err(ParseError::Schema(err)) => assert_eq!(err.path.to_string(), "[0]"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_accepts_deeply_nested_output() {
        let g = grammar(json!({
            "$defs": {"Node": {"type": "array", "items": {"$ref": "#/$defs/Node"}}},
            "$ref": "#/$defs/Node"
        }));
        let text = format!("{}{}\n\n\n\n", "[".repeat(110), "]".repeat(110));
        assert!(g.parse(&text).is_ok());
    }

    #[test]
    fn test_parse_with_context_limits_reference_chains() {
        let g = grammar(json!({
            "$defs": {"A": {"$ref": "#/$defs/B"}, "B": {"type": "null"}},
            "$ref": "#/$defs/A"
        }));
        assert!(g.parse("null").is_ok());
        match g.parse_with("null", &ValidationContext::new(1)) {
            Err(ParseError::Schema(err)) => assert_eq!(err.code, "max_depth_exceeded"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_options_keep_formatting_settings() {
        let schema = JsonSchema::from_value(&json!({"type": "object", "properties": {}})).unwrap();
        let g = JsonSchemaGrammar::with_options(schema, GrammarOptions::new().allow_new_lines(false))
            .unwrap();
        assert!(g.grammar().contains("whitespace-no-new-lines-rule"));
        assert!(g.grammar().lines().next().unwrap().ends_with(r#""\n\n\n\n" [\n]*"#));
    }
}
