//! Validation error types.
//!
//! [`SchemaError`] describes one place where a value does not conform to a
//! schema. [`SchemaErrors`] is the non-empty list produced when validation
//! is asked to collect every violation instead of stopping at the first.

use std::fmt::{self, Display};

use stillwater::prelude::*;

use crate::path::JsonPath;

/// A value did not conform to its schema.
///
/// - **path**: where in the value the mismatch was found
/// - **message**: human-readable description
/// - **expected**: what the schema asked for
/// - **actual**: what the value contained
/// - **code**: machine-readable kind, e.g. `enum_mismatch`
///
/// # Example
///
/// ```rust
/// use gbnf_json::{JsonPath, SchemaError};
///
/// let error = SchemaError::new(JsonPath::root().key("n"), "value is not in the enum")
///     .with_code("enum_mismatch")
///     .with_expected("one of [1, 2, 3]")
///     .with_actual("4");
///
/// assert_eq!(error.code, "enum_mismatch");
/// assert_eq!(
///     error.to_string(),
///     "n: value is not in the enum (expected: one of [1, 2, 3]) (actual: 4)"
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    /// Path from the root value to the offending element or key.
    pub path: JsonPath,
    /// Human-readable error message.
    pub message: String,
    /// Description of what the schema expected.
    pub expected: Option<String>,
    /// Description of what was found instead.
    pub actual: Option<String>,
    /// Machine-readable error code.
    pub code: String,
}

impl SchemaError {
    /// Creates an error with the default `validation_error` code.
    pub fn new(path: JsonPath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
            expected: None,
            actual: None,
            code: "validation_error".to_string(),
        }
    }

    /// Sets the error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Sets the description of what was expected.
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Sets the description of what was found.
    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "(root): {}", self.message)?;
        } else {
            write!(f, "{}: {}", self.path, self.message)?;
        }

        if let Some(ref expected) = self.expected {
            write!(f, " (expected: {})", expected)?;
        }
        if let Some(ref actual) = self.actual {
            write!(f, " (actual: {})", actual)?;
        }

        Ok(())
    }
}

impl std::error::Error for SchemaError {}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    assert_send::<SchemaError>();
    assert_sync::<SchemaError>();
};

/// A non-empty collection of validation errors.
///
/// Backed by stillwater's `NonEmptyVec`, so a `Validation::Failure` always
/// carries at least one error. `SchemaErrors` is a `Semigroup`: results of
/// independent checks can be combined.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaErrors(NonEmptyVec<SchemaError>);

impl SchemaErrors {
    /// A collection holding one error.
    pub fn single(error: SchemaError) -> Self {
        Self(NonEmptyVec::singleton(error))
    }

    /// Builds a collection from a vec the caller knows is non-empty.
    ///
    /// # Panics
    ///
    /// Panics if `errors` is empty.
    pub fn from_vec(errors: Vec<SchemaError>) -> Self {
        Self(NonEmptyVec::from_vec(errors).expect("SchemaErrors requires at least one error"))
    }

    /// Number of errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates over the errors in the order they were found.
    pub fn iter(&self) -> impl Iterator<Item = &SchemaError> {
        self.0.iter()
    }

    /// The first error found.
    pub fn first(&self) -> &SchemaError {
        self.0.head()
    }

    /// All errors located at `path`.
    pub fn at_path(&self, path: &JsonPath) -> Vec<&SchemaError> {
        self.0.iter().filter(|e| &e.path == path).collect()
    }

    /// All errors carrying `code`.
    pub fn with_code(&self, code: &str) -> Vec<&SchemaError> {
        self.0.iter().filter(|e| e.code == code).collect()
    }

    /// Converts into a plain vec.
    pub fn into_vec(self) -> Vec<SchemaError> {
        self.0.into_vec()
    }
}

impl Semigroup for SchemaErrors {
    fn combine(self, other: Self) -> Self {
        SchemaErrors(self.0.combine(other.0))
    }
}

impl Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation failed with {} error(s):", self.len())?;
        for (i, error) in self.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaErrors {}

impl IntoIterator for SchemaErrors {
    type Item = SchemaError;
    type IntoIter = std::vec::IntoIter<SchemaError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_vec().into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_error_defaults() {
        let error = SchemaError::new(JsonPath::root().key("name"), "missing");
        assert_eq!(error.code, "validation_error");
        assert!(error.expected.is_none());
        assert!(error.actual.is_none());
    }

    #[test]
    fn test_display_at_root() {
        let error = SchemaError::new(JsonPath::root(), "expected an array")
            .with_actual("object");
        assert_eq!(error.to_string(), "(root): expected an array (actual: object)");
    }

    #[test]
    fn test_display_nested() {
        let error = SchemaError::new(JsonPath::root().index(0), "wrong type")
            .with_expected("string")
            .with_actual("number");
        assert_eq!(
            error.to_string(),
            "[0]: wrong type (expected: string) (actual: number)"
        );
    }

    #[test]
    fn test_combine_keeps_order() {
        let first = SchemaErrors::single(SchemaError::new(JsonPath::root().key("a"), "1"));
        let second = SchemaErrors::single(SchemaError::new(JsonPath::root().key("b"), "2"));

        let combined = first.combine(second);
        assert_eq!(combined.len(), 2);
        let messages: Vec<_> = combined.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["1", "2"]);
    }

    #[test]
    fn test_filters() {
        let a = JsonPath::root().key("a");
        let errors = SchemaErrors::from_vec(vec![
            SchemaError::new(a.clone(), "x").with_code("required"),
            SchemaError::new(a.clone(), "y").with_code("invalid_type"),
            SchemaError::new(JsonPath::root().key("b"), "z").with_code("required"),
        ]);

        assert_eq!(errors.at_path(&a).len(), 2);
        assert_eq!(errors.with_code("required").len(), 2);
        assert_eq!(errors.first().message, "x");
    }

    #[test]
    fn test_display_lists_every_error() {
        let errors = SchemaErrors::from_vec(vec![
            SchemaError::new(JsonPath::root().key("a"), "first"),
            SchemaError::new(JsonPath::root().key("b"), "second"),
        ]);
        let text = errors.to_string();
        assert!(text.contains("2 error(s)"));
        assert!(text.contains("1. a: first"));
        assert!(text.contains("2. b: second"));
    }
}
