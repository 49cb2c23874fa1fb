//! Renders a schema as a compact TypeScript-like type.
//!
//! The text is meant for prompts: it tells a model what shape of value is
//! expected far more compactly than the schema JSON does.

use serde_json::Value;

use crate::schema::{AdditionalProperties, BasicType, JsonSchema, SchemaId, SchemaKind, StringFormat};

/// Longest run of repeated element types written out in a tuple.
const MAX_TYPE_REPETITION: usize = 10;

/// Describes `schema` as a TypeScript-like type.
///
/// Defs referenced anywhere in the schema are listed first as
/// `type Name = ...;` lines, and references use the def name.
///
/// # Example
///
/// ```rust
/// use gbnf_json::{describe_schema, JsonSchema};
/// use serde_json::json;
///
/// let schema = JsonSchema::from_value(&json!({
///     "type": "object",
///     "properties": {
///         "name": {"type": "string"},
///         "tags": {"type": "array", "items": {"enum": ["a", "b"]}}
///     }
/// }))
/// .unwrap();
///
/// assert_eq!(describe_schema(&schema), r#"{name: string, tags: ("a" | "b")[]}"#);
/// ```
pub fn describe_schema(schema: &JsonSchema) -> String {
    let mut out = String::new();
    for (name, target) in schema.defs() {
        out.push_str(&format!("type {} = {};\n", name, describe(schema, target)));
    }
    out.push_str(&describe(schema, schema.root()));
    out
}

fn describe(schema: &JsonSchema, id: SchemaId) -> String {
    match schema.kind(id) {
        SchemaKind::Basic(types) => types
            .iter()
            .map(|ty| match ty {
                BasicType::String => "string",
                BasicType::Number => "number",
                BasicType::Integer => "bigint",
                BasicType::Boolean => "boolean",
                BasicType::Null => "null",
            })
            .collect::<Vec<_>>()
            .join(" | "),
        SchemaKind::String { .. } | SchemaKind::FormatString(_) => "string".to_string(),
        SchemaKind::Const(literal) => literal.to_json(),
        SchemaKind::Enum(values) => values.iter().map(|v| v.to_json()).collect::<Vec<_>>().join(" | "),
        SchemaKind::OneOf(alternatives) => alternatives
            .iter()
            .map(|alt| describe(schema, *alt))
            .collect::<Vec<_>>()
            .join(" | "),
        SchemaKind::Ref { def_name, .. } => def_name.clone(),
        SchemaKind::Object(shape) => {
            let mut multiline = false;
            let mut entries = Vec::with_capacity(shape.properties.len());
            for (key, value) in &shape.properties {
                let mapping = format!("{}: {}", key_text(key), describe(schema, *value));
                let mut notes = Vec::new();
                if let Some(description) = schema.node(*value).description.as_deref() {
                    if !description.is_empty() {
                        notes.push(description.to_string());
                    }
                }
                let info = property_info(schema, *value);
                if !info.is_empty() {
                    notes.push(info.join(", "));
                }

                if notes.is_empty() {
                    entries.push(mapping);
                } else {
                    multiline = true;
                    let comment = notes.join("\n").replace('\n', "\n// ");
                    entries.push(format!("// {}\n{}", comment, mapping));
                }
            }

            let known = if multiline {
                let body = entries
                    .iter()
                    .map(|entry| entry.replace('\n', "\n    "))
                    .collect::<Vec<_>>()
                    .join(",\n    ");
                format!("{{\n    {}\n}}", body)
            } else {
                format!("{{{}}}", entries.join(", "))
            };

            let extra = match shape.additional {
                AdditionalProperties::Deny => None,
                AdditionalProperties::Allow => Some("{[key: string]: any}".to_string()),
                AdditionalProperties::Schema(value) => {
                    Some(format!("{{[key: string]: {}}}", describe(schema, value)))
                }
            };

            match extra {
                None => known,
                Some(extra) if entries.is_empty() => extra,
                Some(extra) => format!("{} & {}", known, extra),
            }
        }
        SchemaKind::Array(shape) => {
            if shape.max_items == Some(0) {
                return "[]".to_string();
            }
            let rest = match shape.items {
                Some(items) => describe(schema, items),
                None => "any".to_string(),
            };

            if !shape.prefix_items.is_empty() {
                let mut types: Vec<String> =
                    shape.prefix_items.iter().map(|item| describe(schema, *item)).collect();
                let limit = shape.min_items.min(shape.prefix_items.len() + MAX_TYPE_REPETITION);
                while types.len() < limit {
                    types.push(rest.clone());
                }
                if shape.max_items.map_or(true, |max| max > types.len()) {
                    types.push(format!("...{}[]", parenthesize(&rest)));
                }
                return format!("[{}]", types.join(", "));
            }

            if shape.items.is_none() {
                return "any[]".to_string();
            }

            let min = shape.min_items;
            if Some(min) == shape.max_items {
                if min < MAX_TYPE_REPETITION {
                    return format!("[{}]", vec![rest; min].join(", "));
                }
                let repeated = vec![rest.clone(); MAX_TYPE_REPETITION].join(", ");
                return format!("[{}, ...{}[]]", repeated, parenthesize(&rest));
            }
            if min > 0 && min < MAX_TYPE_REPETITION {
                let repeated = vec![rest.clone(); min].join(", ");
                return format!("[{}, ...{}[]]", repeated, parenthesize(&rest));
            }
            format!("{}[]", parenthesize(&rest))
        }
    }
}

/// Extra constraints worth mentioning next to a property.
fn property_info(schema: &JsonSchema, id: SchemaId) -> Vec<String> {
    let mut info = Vec::new();
    match schema.kind(id) {
        SchemaKind::String {
            min_length,
            max_length,
        } => {
            if *min_length > 0 {
                info.push(format!("minimum length: {}", min_length));
            }
            if let Some(max) = max_length {
                info.push(format!("maximum length: {}", max));
            }
        }
        SchemaKind::FormatString(StringFormat::DateTime) => {
            info.push("format: ISO 8601 date-time".to_string());
        }
        SchemaKind::FormatString(format) => info.push(format!("format: {}", format.name())),
        SchemaKind::Array(shape) => {
            if shape.min_items > MAX_TYPE_REPETITION {
                info.push(format!("minimum items: {}", shape.min_items));
            }
            if let Some(max) = shape.max_items {
                info.push(format!("maximum items: {}", max));
            }
        }
        SchemaKind::Object(shape) if shape.additional != AdditionalProperties::Deny => {
            if shape.min_properties > shape.properties.len() {
                info.push(format!("minimum number of properties: {}", shape.min_properties));
            }
            if let Some(max) = shape.max_properties {
                info.push(format!("maximum number of properties: {}", max));
            }
        }
        _ => {}
    }
    info
}

fn key_text(key: &str) -> String {
    let mut chars = key.chars();
    let plain = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    };
    if plain {
        key.to_string()
    } else {
        Value::String(key.to_string()).to_string()
    }
}

fn parenthesize(text: &str) -> String {
    if text.contains(|c: char| matches!(c, ' ' | '|' | '&' | '\n' | '\t')) {
        format!("({})", text)
    } else {
        text.to_string()
    }
}
