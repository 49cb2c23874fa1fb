//! Compiles a [`JsonSchema`] into a GBNF grammar document.
//!
//! The document is a newline-separated list of `name ::= body` rules whose
//! first rule is `root`. Any text derivable from `root` is JSON that conforms
//! to the schema, with object keys in declaration order.
//!
//! Compilation is a pure function of the schema and the options: each call
//! builds its own rule registry, and the same input always yields the same
//! document byte for byte.
//!
//! # Example
//!
//! ```rust
//! use gbnf_json::{compile, GrammarOptions, JsonSchema};
//!
//! let schema: JsonSchema = r#"{"type": "object", "properties": {"ok": {"type": "boolean"}}}"#
//!     .parse()
//!     .unwrap();
//! let grammar = compile(&schema, &GrammarOptions::default()).unwrap();
//!
//! assert!(grammar.starts_with("root ::= "));
//! assert!(grammar.contains("boolean-rule ::= (\"true\" | \"false\")"));
//! ```

mod compiler;
mod gbnf;
mod rules;
mod scope;
mod terminal;

use serde::Deserialize;
use tracing::debug;

use crate::error::CompileError;
use crate::schema::JsonSchema;
use compiler::Compiler;
use scope::ScopeTracker;

/// The text a model emits after a complete value when trailing newlines are enabled.
pub const STOP_SEQUENCE: &str = "\n\n\n\n";

/// Formatting settings for the generated grammar.
///
/// Deserializes from camelCase keys, so it can be read straight out of host
/// configuration:
///
/// ```rust
/// use gbnf_json::GrammarOptions;
///
/// let options: GrammarOptions = serde_json::from_str(r#"{"allowNewLines": false}"#).unwrap();
/// assert!(!options.allow_new_lines);
/// assert_eq!(options.pad_spaces, 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GrammarOptions {
    /// Allow a newline plus indentation between structural tokens.
    pub allow_new_lines: bool,
    /// Spaces of indentation per nesting level.
    pub pad_spaces: usize,
    /// Follow the value with [`STOP_SEQUENCE`] and any number of further newlines.
    pub trailing_newlines: bool,
}

impl Default for GrammarOptions {
    fn default() -> Self {
        Self {
            allow_new_lines: true,
            pad_spaces: 4,
            trailing_newlines: false,
        }
    }
}

impl GrammarOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_new_lines(mut self, allow: bool) -> Self {
        self.allow_new_lines = allow;
        self
    }

    pub fn pad_spaces(mut self, spaces: usize) -> Self {
        self.pad_spaces = spaces;
        self
    }

    pub fn trailing_newlines(mut self, enabled: bool) -> Self {
        self.trailing_newlines = enabled;
        self
    }
}

/// Compiles `schema` into a GBNF document.
///
/// # Errors
///
/// Returns [`CompileError::SelfReferentialDef`] for a def that only leads
/// back to itself through references, and [`CompileError::Internal`] if the rule
/// registry detects a broken invariant.
pub fn compile(schema: &JsonSchema, options: &GrammarOptions) -> Result<String, CompileError> {
    debug!(
        nodes = schema.len(),
        allow_new_lines = options.allow_new_lines,
        pad_spaces = options.pad_spaces,
        "compiling schema to grammar"
    );

    let mut compiler = Compiler::new(schema);
    let mut scopes = ScopeTracker::new(options);
    let root = compiler.lower(schema.root(), &mut scopes)?;
    let mut root_text = root.resolve(&mut compiler)?;
    if options.trailing_newlines {
        root_text = gbnf::seq([root_text.as_str(), gbnf::TRAILING_NEWLINES]);
    }

    let document = compiler.rules.serialize(&root_text)?;
    debug!(rules = compiler.rules.len() + 1, "compiled grammar");
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grammar(schema: serde_json::Value, options: GrammarOptions) -> String {
        let schema = JsonSchema::from_value(&schema).unwrap();
        compile(&schema, &options).unwrap()
    }

    fn rule<'a>(document: &'a str, name: &str) -> Option<&'a str> {
        let prefix = format!("{} ::= ", name);
        document.lines().find_map(|line| line.strip_prefix(prefix.as_str()))
    }

    #[test]
    fn test_options_builder() {
        let options = GrammarOptions::new()
            .allow_new_lines(false)
            .pad_spaces(2)
            .trailing_newlines(true);
        assert!(!options.allow_new_lines);
        assert_eq!(options.pad_spaces, 2);
        assert!(options.trailing_newlines);
    }

    #[test]
    fn test_options_deserialize_defaults() {
        let options: GrammarOptions = serde_json::from_value(json!({})).unwrap();
        assert_eq!(options, GrammarOptions::default());

        let options: GrammarOptions =
            serde_json::from_value(json!({"padSpaces": 2, "trailingNewlines": true})).unwrap();
        assert_eq!(options.pad_spaces, 2);
        assert!(options.trailing_newlines);
    }

    #[test]
    fn test_primitive_roots() {
        let doc = grammar(json!({"type": "string"}), GrammarOptions::default());
        assert_eq!(rule(&doc, "root"), Some("string-rule"));
        assert!(rule(&doc, "string-char-rule").is_some());

        let doc = grammar(json!({"type": "null"}), GrammarOptions::default());
        assert_eq!(doc, "root ::= \"null\"");

        let doc = grammar(json!({"const": 7}), GrammarOptions::default());
        assert_eq!(doc, "root ::= \"7\"");
    }

    #[test]
    fn test_long_literals_get_named_rules() {
        let doc = grammar(json!({"const": "hello"}), GrammarOptions::default());
        assert_eq!(rule(&doc, "root"), Some("val1"));
        assert_eq!(rule(&doc, "val1"), Some(r#""\"hello\"""#));
    }

    #[test]
    fn test_trailing_newlines() {
        let doc = grammar(
            json!({"type": "boolean"}),
            GrammarOptions::new().trailing_newlines(true),
        );
        assert_eq!(rule(&doc, "root"), Some(r#"boolean-rule "\n\n\n\n" [\n]*"#));
    }

    #[test]
    fn test_no_new_lines_uses_flat_whitespace() {
        let doc = grammar(
            json!({"type": "object", "properties": {"a": {"type": "integer"}}}),
            GrammarOptions::new().allow_new_lines(false),
        );
        assert!(doc.contains("whitespace-no-new-lines-rule ::= [ ]?"));
        assert!(!doc.contains("[\\n]"));
    }

    #[test]
    fn test_object_fields_in_declaration_order() {
        let doc = grammar(
            json!({
                "type": "object",
                "properties": {"b": {"type": "string"}, "a": {"type": "integer"}}
            }),
            GrammarOptions::default(),
        );
        let body = rule(&doc, "rule1").unwrap();
        let b = body.find(r#""\"b\":""#).unwrap();
        let a = body.find(r#""\"a\":""#).unwrap();
        assert!(b < a);
    }

    #[test]
    fn test_self_referential_def_fails() {
        let schema = JsonSchema::from_value(&json!({
            "$defs": {"Loop": {"oneOf": [{"$ref": "#/$defs/Loop"}]}},
            "$ref": "#/$defs/Loop"
        }))
        .unwrap();
        assert_eq!(
            compile(&schema, &GrammarOptions::default()),
            Err(CompileError::SelfReferentialDef {
                name: "Loop".to_string()
            })
        );
    }
}
