//! Turns a JSON schema document into the node arena.
//!
//! Def bodies get their ids reserved before any body is parsed, so a `$ref`
//! can point at a def that is still being loaded (including itself).

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

use super::{
    AdditionalProperties, ArrayShape, BasicType, Literal, ObjectShape, SchemaId, SchemaKind,
    SchemaNode, StringFormat,
};
use crate::error::{CompileError, InvariantViolation};
use crate::path::JsonPath;

const REF_PREFIX: &str = "#/$defs/";

pub(super) fn load(value: &Value) -> Result<(Vec<SchemaNode>, SchemaId), CompileError> {
    let mut loader = Loader::default();
    let root = loader.reserve();
    loader.load_into(root, value, &JsonPath::root())?;

    let nodes = loader
        .nodes
        .into_iter()
        .enumerate()
        .map(|(i, node)| node.ok_or(InvariantViolation::SchemaNodeNeverLoaded(i)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((nodes, root))
}

#[derive(Default)]
struct Loader {
    nodes: Vec<Option<SchemaNode>>,
    /// Innermost scope last.
    scopes: Vec<HashMap<String, SchemaId>>,
}

fn location(path: &JsonPath) -> String {
    if path.is_root() {
        "(root)".to_string()
    } else {
        path.to_string()
    }
}

impl Loader {
    fn reserve(&mut self) -> SchemaId {
        self.nodes.push(None);
        SchemaId((self.nodes.len() - 1) as u32)
    }

    fn load_node(&mut self, value: &Value, path: &JsonPath) -> Result<SchemaId, CompileError> {
        let id = self.reserve();
        self.load_into(id, value, path)?;
        Ok(id)
    }

    fn load_into(&mut self, id: SchemaId, value: &Value, path: &JsonPath) -> Result<(), CompileError> {
        let obj = value.as_object().ok_or_else(|| CompileError::NotAnObject {
            at: location(path),
        })?;

        let pushed = self.push_defs(obj, path)?;
        let result = self.parse_kind(obj, path);
        if pushed {
            self.scopes.pop();
        }

        let description = match obj.get("description") {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(CompileError::InvalidKeyword {
                    at: location(path),
                    keyword: "description",
                    expected: "a string",
                })
            }
        };

        self.nodes[id.index()] = Some(SchemaNode {
            kind: result?,
            description,
        });
        Ok(())
    }

    fn push_defs(&mut self, obj: &Map<String, Value>, path: &JsonPath) -> Result<bool, CompileError> {
        let defs = match obj.get("$defs") {
            None => return Ok(false),
            Some(Value::Object(defs)) => defs,
            Some(_) => {
                return Err(CompileError::InvalidKeyword {
                    at: location(path),
                    keyword: "$defs",
                    expected: "an object",
                })
            }
        };

        let scope: HashMap<String, SchemaId> =
            defs.keys().map(|name| (name.clone(), self.reserve())).collect();
        let ids: Vec<(SchemaId, &Value, JsonPath)> = defs
            .iter()
            .map(|(name, body)| (scope[name], body, path.key("$defs").key(name.as_str())))
            .collect();

        self.scopes.push(scope);
        for (id, body, def_path) in ids {
            if let Err(err) = self.load_into(id, body, &def_path) {
                self.scopes.pop();
                return Err(err);
            }
        }
        Ok(true)
    }

    fn lookup(&self, name: &str) -> Option<SchemaId> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).copied())
    }

    fn parse_kind(&mut self, obj: &Map<String, Value>, path: &JsonPath) -> Result<SchemaKind, CompileError> {
        if let Some(reference) = obj.get("$ref") {
            return self.parse_ref(reference, path);
        }

        if let Some(alternatives) = obj.get("oneOf") {
            let alternatives = alternatives.as_array().ok_or_else(|| CompileError::InvalidKeyword {
                at: location(path),
                keyword: "oneOf",
                expected: "an array of schemas",
            })?;
            if alternatives.is_empty() {
                return Err(CompileError::EmptyOneOf { at: location(path) });
            }
            let base = path.key("oneOf");
            let ids = alternatives
                .iter()
                .enumerate()
                .map(|(i, alt)| self.load_node(alt, &base.index(i)))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(SchemaKind::OneOf(ids));
        }

        if let Some(value) = obj.get("const") {
            let literal = Literal::from_value(value).ok_or_else(|| CompileError::InvalidLiteral {
                at: location(&path.key("const")),
            })?;
            return Ok(SchemaKind::Const(literal));
        }

        if let Some(values) = obj.get("enum") {
            let values = values.as_array().ok_or_else(|| CompileError::InvalidKeyword {
                at: location(path),
                keyword: "enum",
                expected: "an array of literals",
            })?;
            if values.is_empty() {
                return Err(CompileError::EmptyEnum { at: location(path) });
            }
            let base = path.key("enum");
            let literals = values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    Literal::from_value(v).ok_or_else(|| CompileError::InvalidLiteral {
                        at: location(&base.index(i)),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(SchemaKind::Enum(literals));
        }

        match obj.get("type") {
            None => Err(CompileError::UnsupportedType {
                at: location(path),
                found: "(missing)".to_string(),
            }),
            Some(Value::String(name)) if name == "object" => self.parse_object(obj, path),
            Some(Value::String(name)) if name == "array" => self.parse_array(obj, path),
            Some(Value::String(name)) if name == "string" => parse_string(obj, path),
            Some(Value::String(name)) => match BasicType::from_name(name) {
                Some(ty) => Ok(SchemaKind::Basic(vec![ty])),
                None => Err(CompileError::UnsupportedType {
                    at: location(path),
                    found: Value::String(name.clone()).to_string(),
                }),
            },
            Some(Value::Array(names)) => parse_type_list(names, path),
            Some(_) => Err(CompileError::InvalidKeyword {
                at: location(path),
                keyword: "type",
                expected: "a type name or an array of type names",
            }),
        }
    }

    fn parse_ref(&self, reference: &Value, path: &JsonPath) -> Result<SchemaKind, CompileError> {
        let reference = reference.as_str().ok_or_else(|| CompileError::InvalidKeyword {
            at: location(path),
            keyword: "$ref",
            expected: "a string",
        })?;
        let name = reference
            .strip_prefix(REF_PREFIX)
            .filter(|name| !name.is_empty() && !name.contains('/'))
            .ok_or_else(|| CompileError::MalformedRef {
                at: location(path),
                reference: reference.to_string(),
            })?;
        let target = self.lookup(name).ok_or_else(|| CompileError::UnknownDef {
            at: location(path),
            name: name.to_string(),
        })?;

        Ok(SchemaKind::Ref {
            def_name: name.to_string(),
            target,
        })
    }

    fn parse_object(&mut self, obj: &Map<String, Value>, path: &JsonPath) -> Result<SchemaKind, CompileError> {
        let mut properties = indexmap::IndexMap::new();
        match obj.get("properties") {
            None => {}
            Some(Value::Object(props)) => {
                let base = path.key("properties");
                for (name, schema) in props {
                    let id = self.load_node(schema, &base.key(name.as_str()))?;
                    properties.insert(name.clone(), id);
                }
            }
            Some(_) => {
                return Err(CompileError::InvalidKeyword {
                    at: location(path),
                    keyword: "properties",
                    expected: "an object",
                })
            }
        }

        let additional = match obj.get("additionalProperties") {
            None | Some(Value::Bool(false)) => AdditionalProperties::Deny,
            Some(Value::Bool(true)) => AdditionalProperties::Allow,
            Some(schema @ Value::Object(_)) => {
                AdditionalProperties::Schema(self.load_node(schema, &path.key("additionalProperties"))?)
            }
            Some(_) => {
                return Err(CompileError::InvalidKeyword {
                    at: location(path),
                    keyword: "additionalProperties",
                    expected: "a boolean or a schema",
                })
            }
        };

        let declared = properties.len();
        let min_properties = count(obj, "minProperties", path)?.unwrap_or(0).max(declared);
        let max_properties = clamp_max(
            count(obj, "maxProperties", path)?,
            min_properties,
            "maxProperties",
            path,
        );

        Ok(SchemaKind::Object(ObjectShape {
            properties,
            additional,
            min_properties,
            max_properties,
        }))
    }

    fn parse_array(&mut self, obj: &Map<String, Value>, path: &JsonPath) -> Result<SchemaKind, CompileError> {
        let prefix_items = match obj.get("prefixItems") {
            None => Vec::new(),
            Some(Value::Array(items)) => {
                let base = path.key("prefixItems");
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.load_node(item, &base.index(i)))
                    .collect::<Result<Vec<_>, _>>()?
            }
            Some(_) => {
                return Err(CompileError::InvalidKeyword {
                    at: location(path),
                    keyword: "prefixItems",
                    expected: "an array of schemas",
                })
            }
        };

        let items = match obj.get("items") {
            None => None,
            Some(schema) => Some(self.load_node(schema, &path.key("items"))?),
        };

        let min_items = count(obj, "minItems", path)?.unwrap_or(0).max(prefix_items.len());
        let max_items = clamp_max(count(obj, "maxItems", path)?, min_items, "maxItems", path);

        Ok(SchemaKind::Array(ArrayShape {
            prefix_items,
            items,
            min_items,
            max_items,
        }))
    }
}

fn parse_string(obj: &Map<String, Value>, path: &JsonPath) -> Result<SchemaKind, CompileError> {
    if let Some(format) = obj.get("format") {
        let format = format.as_str().ok_or_else(|| CompileError::InvalidKeyword {
            at: location(path),
            keyword: "format",
            expected: "a string",
        })?;
        return Ok(SchemaKind::FormatString(StringFormat::from_name(format)));
    }

    let min_length = count(obj, "minLength", path)?;
    let max_length = count(obj, "maxLength", path)?;
    if min_length.is_none() && max_length.is_none() {
        return Ok(SchemaKind::Basic(vec![BasicType::String]));
    }

    let min_length = min_length.unwrap_or(0);
    Ok(SchemaKind::String {
        min_length,
        max_length: clamp_max(max_length, min_length, "maxLength", path),
    })
}

fn parse_type_list(names: &[Value], path: &JsonPath) -> Result<SchemaKind, CompileError> {
    let mut types = Vec::with_capacity(names.len());
    for name in names {
        let ty = name
            .as_str()
            .and_then(BasicType::from_name)
            .ok_or_else(|| CompileError::UnsupportedType {
                at: location(path),
                found: name.to_string(),
            })?;
        types.push(ty);
    }
    if types.is_empty() {
        return Err(CompileError::UnsupportedType {
            at: location(path),
            found: "[]".to_string(),
        });
    }
    types.sort();
    types.dedup();
    Ok(SchemaKind::Basic(types))
}

fn count(obj: &Map<String, Value>, keyword: &'static str, path: &JsonPath) -> Result<Option<usize>, CompileError> {
    match obj.get(keyword) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| CompileError::InvalidKeyword {
                at: location(path),
                keyword,
                expected: "a non-negative integer",
            }),
    }
}

fn clamp_max(max: Option<usize>, min: usize, keyword: &'static str, path: &JsonPath) -> Option<usize> {
    match max {
        Some(max) if max < min => {
            warn!(
                at = %location(path),
                keyword,
                max,
                min,
                "upper bound is below the lower bound, raising it"
            );
            Some(min)
        }
        other => other,
    }
}
