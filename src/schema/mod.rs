//! The schema model.
//!
//! A [`JsonSchema`] is an immutable arena of [`SchemaNode`]s. Every node gets a
//! stable [`SchemaId`] when the schema is loaded, and `$ref` nodes point at the
//! id of their def body. Recursive definitions are therefore ordinary index
//! cycles, and "the same def" can be recognised by `(name, id)` without relying
//! on reference identity.
//!
//! # Example
//!
//! ```rust
//! use gbnf_json::{JsonSchema, SchemaKind};
//! use serde_json::json;
//!
//! let schema = JsonSchema::from_value(&json!({
//!     "$defs": {
//!         "Node": {
//!             "type": "object",
//!             "properties": {
//!                 "children": {"type": "array", "items": {"$ref": "#/$defs/Node"}}
//!             }
//!         }
//!     },
//!     "$ref": "#/$defs/Node"
//! }))
//! .unwrap();
//!
//! match schema.kind(schema.root()) {
//!     SchemaKind::Ref { def_name, .. } => assert_eq!(def_name, "Node"),
//!     other => panic!("unexpected root {:?}", other),
//! }
//! ```

mod literal;
mod load;

use std::fmt::{self, Display};
use std::str::FromStr;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::CompileError;

pub use literal::Literal;

/// Index of a node inside a [`JsonSchema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub(crate) u32);

impl SchemaId {
    /// Position of the node in load order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The primitive JSON kinds a basic `type` can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BasicType {
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl BasicType {
    /// Parses a `type` keyword entry.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(BasicType::String),
            "number" => Some(BasicType::Number),
            "integer" => Some(BasicType::Integer),
            "boolean" => Some(BasicType::Boolean),
            "null" => Some(BasicType::Null),
            _ => None,
        }
    }

    /// The keyword spelling of this type.
    pub fn name(self) -> &'static str {
        match self {
            BasicType::String => "string",
            BasicType::Number => "number",
            BasicType::Integer => "integer",
            BasicType::Boolean => "boolean",
            BasicType::Null => "null",
        }
    }
}

impl Display for BasicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// String formats with a dedicated grammar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StringFormat {
    /// `YYYY-MM-DD`
    Date,
    /// `hh:mm:ss[.fff](Z|±hh:mm)`
    Time,
    /// A date, `T`, then a time.
    DateTime,
    /// Any other format name. Only the empty string conforms.
    Unsupported(String),
}

impl StringFormat {
    /// Parses a `format` keyword value.
    pub fn from_name(name: &str) -> Self {
        match name {
            "date" => StringFormat::Date,
            "time" => StringFormat::Time,
            "date-time" => StringFormat::DateTime,
            other => StringFormat::Unsupported(other.to_string()),
        }
    }

    /// The keyword spelling of this format.
    pub fn name(&self) -> &str {
        match self {
            StringFormat::Date => "date",
            StringFormat::Time => "time",
            StringFormat::DateTime => "date-time",
            StringFormat::Unsupported(name) => name,
        }
    }
}

/// What an object accepts beyond its declared properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdditionalProperties {
    /// No undeclared keys. This is the default when the keyword is absent.
    #[default]
    Deny,
    /// Undeclared keys with any JSON value.
    Allow,
    /// Undeclared keys whose values conform to the given schema.
    Schema(SchemaId),
}

/// The object construct.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectShape {
    /// Declared properties in declaration order. All of them are required.
    pub properties: IndexMap<String, SchemaId>,
    pub additional: AdditionalProperties,
    /// Lower bound on the total key count; only enforced when undeclared keys are allowed.
    pub min_properties: usize,
    /// Upper bound on the total key count; only enforced when undeclared keys are allowed.
    pub max_properties: Option<usize>,
}

/// The array construct.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayShape {
    /// Schemas for the leading positions.
    pub prefix_items: Vec<SchemaId>,
    /// Schema for every position after the prefix. `None` accepts any value.
    pub items: Option<SchemaId>,
    pub min_items: usize,
    pub max_items: Option<usize>,
}

/// The shape a schema node describes.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    /// One of a set of primitive types. Never empty, sorted, without duplicates.
    Basic(Vec<BasicType>),
    /// A string with length bounds, counted in characters.
    String {
        min_length: usize,
        max_length: Option<usize>,
    },
    FormatString(StringFormat),
    Const(Literal),
    /// Non-empty, in declaration order.
    Enum(Vec<Literal>),
    /// Non-empty, in declaration order.
    OneOf(Vec<SchemaId>),
    Object(ObjectShape),
    Array(ArrayShape),
    /// A named def. `target` is the def body.
    Ref { def_name: String, target: SchemaId },
}

/// One node of a loaded schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub description: Option<String>,
}

/// A loaded, immutable schema.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonSchema {
    nodes: Vec<SchemaNode>,
    root: SchemaId,
}

impl JsonSchema {
    /// Loads a schema from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] if the schema is malformed or uses anything
    /// outside the supported subset.
    pub fn from_value(value: &Value) -> Result<Self, CompileError> {
        let (nodes, root) = load::load(value)?;
        Ok(Self { nodes, root })
    }

    /// The top-level node.
    pub fn root(&self) -> SchemaId {
        self.root
    }

    /// The node behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` belongs to a different schema.
    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.index()]
    }

    /// Shorthand for `self.node(id).kind`.
    pub fn kind(&self, id: SchemaId) -> &SchemaKind {
        &self.node(id).kind
    }

    /// Number of nodes, defs included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a loaded schema has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every `(name, body)` pair referenced by some `$ref`, in load order.
    pub fn defs(&self) -> Vec<(&str, SchemaId)> {
        let mut seen: IndexMap<(&str, SchemaId), ()> = IndexMap::new();
        for node in &self.nodes {
            if let SchemaKind::Ref { def_name, target } = &node.kind {
                seen.insert((def_name.as_str(), *target), ());
            }
        }
        seen.into_keys().collect()
    }
}

impl FromStr for JsonSchema {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: Value =
            serde_json::from_str(s).map_err(|e| CompileError::InvalidJson(e.to_string()))?;
        Self::from_value(&value)
    }
}
