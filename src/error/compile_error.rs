//! Schema compile errors.

/// A schema could not be loaded or compiled into a grammar.
///
/// These are raised synchronously and indicate that the schema itself is
/// invalid or uses something outside the supported subset. Retrying with the
/// same schema always fails the same way.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// Schema text was not valid JSON.
    #[error("schema is not valid JSON: {0}")]
    InvalidJson(String),

    /// The schema (or a nested schema) is not a JSON object.
    #[error("schema at '{at}' must be an object")]
    NotAnObject { at: String },

    /// A keyword had a value of the wrong JSON type.
    #[error("keyword '{keyword}' at '{at}' must be {expected}")]
    InvalidKeyword {
        at: String,
        keyword: &'static str,
        expected: &'static str,
    },

    /// `enum` listed no values.
    #[error("enum at '{at}' has no values")]
    EmptyEnum { at: String },

    /// `oneOf` listed no alternatives.
    #[error("oneOf at '{at}' has no alternatives")]
    EmptyOneOf { at: String },

    /// A `const` or `enum` member was an array or an object.
    #[error("literal at '{at}' must be a string, number, boolean or null")]
    InvalidLiteral { at: String },

    /// `$ref` did not have the `#/$defs/<name>` shape.
    #[error("unsupported $ref '{reference}' at '{at}'")]
    MalformedRef { at: String, reference: String },

    /// `$ref` named a def that no enclosing `$defs` declares.
    #[error("$ref at '{at}' points to unknown def '{name}'")]
    UnknownDef { at: String, name: String },

    /// `type` was missing, or named something outside the supported subset.
    #[error("unsupported type {found} at '{at}'")]
    UnsupportedType { at: String, found: String },

    /// A def's body reduces to a reference to itself and derives no text.
    #[error("def '{name}' only refers to itself")]
    SelfReferentialDef { name: String },

    /// The compiler broke one of its own invariants.
    #[error(transparent)]
    Internal(#[from] InvariantViolation),
}

/// An internal invariant of the rule registry was broken.
///
/// These are programming errors: correct keying logic never produces them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// A rule name was given a second body.
    #[error("rule '{0}' was defined twice")]
    RuleRedefined(String),

    /// A rule body was registered under a name that was never reserved.
    #[error("rule '{0}' was filled without being reserved")]
    RuleNotReserved(String),

    /// A reserved rule slot was never filled in before serialization.
    #[error("rule '{0}' was reserved but never defined")]
    RuleNeverDefined(String),

    /// The schema loader reserved a node id and never filled it.
    #[error("schema node {0} was reserved but never loaded")]
    SchemaNodeNeverLoaded(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_location() {
        let err = CompileError::UnknownDef {
            at: "properties.child".to_string(),
            name: "Node".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "$ref at 'properties.child' points to unknown def 'Node'"
        );
    }

    #[test]
    fn test_invariant_violation_is_wrapped_transparently() {
        let err: CompileError = InvariantViolation::RuleRedefined("rule3".to_string()).into();
        assert!(matches!(err, CompileError::Internal(_)));
        assert_eq!(err.to_string(), "rule 'rule3' was defined twice");
    }
}
