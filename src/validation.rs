//! Checks parsed values against a schema.
//!
//! The validator walks a value the same way the grammar compiler walks the
//! schema. It is the safety net behind grammar-constrained generation: the
//! grammar fixes syntax, the validator confirms everything else.
//!
//! Two entry points are provided:
//! - [`validate`] stops at the first violation and returns it.
//! - [`validate_all`] keeps going and returns every violation as
//!   [`SchemaErrors`].
//!
//! # Example
//!
//! ```rust
//! use gbnf_json::{validate, validate_all, JsonPath, JsonSchema};
//! use serde_json::json;
//!
//! let schema = JsonSchema::from_value(&json!({
//!     "type": "object",
//!     "properties": {"n": {"enum": [1, 2, 3]}, "tag": {"type": "string"}}
//! }))
//! .unwrap();
//!
//! assert!(validate(&json!({"n": 2, "tag": "x"}), &schema).is_ok());
//!
//! let err = validate(&json!({"n": 4, "tag": "x"}), &schema).unwrap_err();
//! assert_eq!(err.path, JsonPath::root().key("n"));
//! assert_eq!(err.code, "enum_mismatch");
//!
//! let all = validate_all(&json!({"n": 4, "tag": 5}), &schema);
//! assert_eq!(all.into_result().unwrap_err().len(), 2);
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use stillwater::Validation;

use crate::error::{SchemaError, SchemaErrors};
use crate::path::JsonPath;
use crate::schema::{
    AdditionalProperties, ArrayShape, BasicType, JsonSchema, ObjectShape, SchemaId, SchemaKind,
    StringFormat,
};
use crate::ValidationResult;

const DATE: &str = r"[0-9]{4}-(0[1-9]|1[012])-(0[1-9]|[12][0-9]|3[01])";
const TIME: &str = r"([01][0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9](\.[0-9]{3})?(Z|[+-]([01][0-9]|2[0-3]):[0-5][0-9])";

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}$", DATE)).expect("date pattern is valid"));
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}$", TIME)).expect("time pattern is valid"));
static DATE_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}T{}$", DATE, TIME)).expect("date-time pattern is valid"));

/// Settings for one validation run.
///
/// `depth` counts the references followed since the walk last stepped into
/// a child value. A chain longer than `max_depth` fails with
/// `max_depth_exceeded` instead of recursing without bound. Nesting in the
/// value itself is never limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationContext {
    depth: usize,
    max_depth: usize,
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ValidationContext {
    pub fn new(max_depth: usize) -> Self {
        Self {
            depth: 0,
            max_depth,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// A context one reference deeper.
    pub fn increment_depth(&self) -> Self {
        Self {
            depth: self.depth + 1,
            max_depth: self.max_depth,
        }
    }

    /// A context for a child value: the reference count starts over.
    pub fn descend(&self) -> Self {
        Self::new(self.max_depth)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Fail-fast validation under this context.
    pub fn validate(&self, value: &Value, schema: &JsonSchema) -> Result<(), SchemaError> {
        let mut validator = Validator::new(schema, true);
        let _ = validator.check(value, schema.root(), &JsonPath::root(), *self);
        match validator.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Accumulating validation under this context.
    pub fn validate_all(&self, value: &Value, schema: &JsonSchema) -> ValidationResult<()> {
        let mut validator = Validator::new(schema, false);
        let _ = validator.check(value, schema.root(), &JsonPath::root(), *self);
        if validator.errors.is_empty() {
            Validation::Success(())
        } else {
            Validation::Failure(SchemaErrors::from_vec(validator.errors))
        }
    }
}

/// Checks `value` against `schema`, stopping at the first violation.
///
/// Violations are found depth-first, with object properties visited in
/// declaration order.
pub fn validate(value: &Value, schema: &JsonSchema) -> Result<(), SchemaError> {
    ValidationContext::default().validate(value, schema)
}

/// Checks `value` against `schema`, collecting every violation.
pub fn validate_all(value: &Value, schema: &JsonSchema) -> ValidationResult<()> {
    ValidationContext::default().validate_all(value, schema)
}

/// Returned by a check to stop the walk in fail-fast mode.
struct Halt;

type Flow = Result<(), Halt>;

struct Validator<'s> {
    schema: &'s JsonSchema,
    fail_fast: bool,
    errors: Vec<SchemaError>,
}

impl<'s> Validator<'s> {
    fn new(schema: &'s JsonSchema, fail_fast: bool) -> Self {
        Self {
            schema,
            fail_fast,
            errors: Vec::new(),
        }
    }

    fn report(&mut self, error: SchemaError) -> Flow {
        self.errors.push(error);
        if self.fail_fast {
            Err(Halt)
        } else {
            Ok(())
        }
    }

    fn check(&mut self, value: &Value, id: SchemaId, path: &JsonPath, ctx: ValidationContext) -> Flow {
        let schema = self.schema;
        match schema.kind(id) {
            SchemaKind::Basic(types) => {
                if types.iter().any(|ty| is_type(value, *ty)) {
                    return Ok(());
                }
                let expected = types.iter().map(|t| t.name()).collect::<Vec<_>>().join(" | ");
                self.report(type_error(path, &expected, value))
            }
            SchemaKind::String {
                min_length,
                max_length,
            } => {
                let Some(text) = value.as_str() else {
                    return self.report(type_error(path, "string", value));
                };
                let length = text.chars().count();
                if length < *min_length {
                    return self.report(
                        SchemaError::new(path.clone(), format!("string is shorter than {} characters", min_length))
                            .with_code("min_length")
                            .with_expected(format!("at least {} characters", min_length))
                            .with_actual(length.to_string()),
                    );
                }
                match max_length {
                    Some(max) if length > *max => self.report(
                        SchemaError::new(path.clone(), format!("string is longer than {} characters", max))
                            .with_code("max_length")
                            .with_expected(format!("at most {} characters", max))
                            .with_actual(length.to_string()),
                    ),
                    _ => Ok(()),
                }
            }
            SchemaKind::FormatString(format) => {
                let Some(text) = value.as_str() else {
                    return self.report(type_error(path, "string", value));
                };
                if matches_format(format, text) {
                    return Ok(());
                }
                self.report(
                    SchemaError::new(path.clone(), format!("string is not a valid {}", format.name()))
                        .with_code("invalid_format")
                        .with_expected(format.name().to_string())
                        .with_actual(value.to_string()),
                )
            }
            SchemaKind::Const(literal) => {
                if literal.matches(value) {
                    return Ok(());
                }
                self.report(
                    SchemaError::new(path.clone(), "value does not equal the constant")
                        .with_code("const_mismatch")
                        .with_expected(literal.to_json())
                        .with_actual(value.to_string()),
                )
            }
            SchemaKind::Enum(values) => {
                if values.iter().any(|literal| literal.matches(value)) {
                    return Ok(());
                }
                let listed = values.iter().map(|v| v.to_json()).collect::<Vec<_>>().join(", ");
                self.report(
                    SchemaError::new(path.clone(), "value is not in the enum")
                        .with_code("enum_mismatch")
                        .with_expected(format!("one of [{}]", listed))
                        .with_actual(value.to_string()),
                )
            }
            SchemaKind::OneOf(alternatives) => self.check_one_of(value, alternatives, path, ctx),
            SchemaKind::Object(shape) => self.check_object(value, shape, path, ctx),
            SchemaKind::Array(shape) => self.check_array(value, shape, path, ctx),
            SchemaKind::Ref { def_name, target } => {
                if ctx.depth() >= ctx.max_depth() {
                    return self.report(
                        SchemaError::new(
                            path.clone(),
                            format!("reference depth exceeded at '{}'", def_name),
                        )
                        .with_code("max_depth_exceeded")
                        .with_expected(format!("at most {} nested references", ctx.max_depth())),
                    );
                }
                self.check(value, *target, path, ctx.increment_depth())
            }
        }
    }

    /// Succeeds if any alternative accepts the value. Otherwise reports the
    /// failure that got furthest into the value.
    fn check_one_of(&mut self, value: &Value, alternatives: &[SchemaId], path: &JsonPath, ctx: ValidationContext) -> Flow {
        let mut best: Option<SchemaError> = None;
        for alternative in alternatives {
            let mut probe = Validator::new(self.schema, true);
            let _ = probe.check(value, *alternative, path, ctx);
            let Some(error) = probe.errors.into_iter().next() else {
                return Ok(());
            };
            let deeper = match &best {
                Some(current) => error.path.len() > current.path.len(),
                None => true,
            };
            if deeper {
                best = Some(error);
            }
        }

        match best {
            Some(error) if error.path.len() > path.len() => self.report(error),
            _ => self.report(
                SchemaError::new(path.clone(), "value matches none of the alternatives")
                    .with_code("one_of_none_matched")
                    .with_expected(format!("one of {} schemas", alternatives.len()))
                    .with_actual(value.to_string()),
            ),
        }
    }

    fn check_object(&mut self, value: &Value, shape: &ObjectShape, path: &JsonPath, ctx: ValidationContext) -> Flow {
        let Some(object) = value.as_object() else {
            return self.report(type_error(path, "object", value));
        };

        for (key, id) in &shape.properties {
            let field_path = path.key(key.as_str());
            match object.get(key) {
                Some(field) => self.check(field, *id, &field_path, ctx.descend())?,
                None => self.report(
                    SchemaError::new(field_path, format!("required property '{}' is missing", key))
                        .with_code("required")
                        .with_expected("value"),
                )?,
            }
        }

        for (key, field) in object {
            if shape.properties.contains_key(key) {
                continue;
            }
            let field_path = path.key(key.as_str());
            match shape.additional {
                AdditionalProperties::Deny => self.report(
                    SchemaError::new(field_path, format!("unknown property '{}'", key))
                        .with_code("additional_property"),
                )?,
                AdditionalProperties::Allow => {}
                AdditionalProperties::Schema(id) => self.check(field, id, &field_path, ctx.descend())?,
            }
        }

        if shape.additional == AdditionalProperties::Deny {
            return Ok(());
        }
        let count = object.len();
        if count < shape.min_properties {
            return self.report(
                SchemaError::new(path.clone(), format!("object has fewer than {} properties", shape.min_properties))
                    .with_code("min_properties")
                    .with_expected(format!("at least {} properties", shape.min_properties))
                    .with_actual(count.to_string()),
            );
        }
        match shape.max_properties {
            Some(max) if count > max => self.report(
                SchemaError::new(path.clone(), format!("object has more than {} properties", max))
                    .with_code("max_properties")
                    .with_expected(format!("at most {} properties", max))
                    .with_actual(count.to_string()),
            ),
            _ => Ok(()),
        }
    }

    fn check_array(&mut self, value: &Value, shape: &ArrayShape, path: &JsonPath, ctx: ValidationContext) -> Flow {
        let Some(items) = value.as_array() else {
            return self.report(type_error(path, "array", value));
        };

        let length = items.len();
        if length < shape.min_items {
            self.report(
                SchemaError::new(path.clone(), format!("array has fewer than {} items", shape.min_items))
                    .with_code("min_items")
                    .with_expected(format!("at least {} items", shape.min_items))
                    .with_actual(length.to_string()),
            )?;
        }
        if let Some(max) = shape.max_items {
            if length > max {
                self.report(
                    SchemaError::new(path.clone(), format!("array has more than {} items", max))
                        .with_code("max_items")
                        .with_expected(format!("at most {} items", max))
                        .with_actual(length.to_string()),
                )?;
            }
        }

        for (index, item) in items.iter().enumerate() {
            let schema = match shape.prefix_items.get(index) {
                Some(id) => Some(*id),
                None => shape.items,
            };
            if let Some(id) = schema {
                self.check(item, id, &path.index(index), ctx.descend())?;
            }
        }
        Ok(())
    }
}

fn is_type(value: &Value, ty: BasicType) -> bool {
    match ty {
        BasicType::String => value.is_string(),
        BasicType::Number => value.is_number(),
        BasicType::Integer => match value {
            Value::Number(n) => {
                n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0)
            }
            _ => false,
        },
        BasicType::Boolean => value.is_boolean(),
        BasicType::Null => value.is_null(),
    }
}

fn matches_format(format: &StringFormat, text: &str) -> bool {
    match format {
        StringFormat::Date => DATE_RE.is_match(text),
        StringFormat::Time => TIME_RE.is_match(text),
        StringFormat::DateTime => DATE_TIME_RE.is_match(text),
        StringFormat::Unsupported(_) => text.is_empty(),
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(path: &JsonPath, expected: &str, value: &Value) -> SchemaError {
    SchemaError::new(path.clone(), format!("expected {}", expected))
        .with_code("invalid_type")
        .with_expected(expected.to_string())
        .with_actual(value_type_name(value))
}
