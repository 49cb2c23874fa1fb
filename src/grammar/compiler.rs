//! Lowers schema nodes into terminal nodes.

use tracing::trace;

use super::rules::RuleRegistry;
use super::scope::{Scope, ScopeTracker};
use super::terminal::{Terminal, TerminalKind, TerminalRef};
use crate::error::CompileError;
use crate::schema::{AdditionalProperties, BasicType, JsonSchema, SchemaId, SchemaKind};

/// Per-compilation context: the schema being compiled and the rule registry.
pub(crate) struct Compiler<'s> {
    schema: &'s JsonSchema,
    pub(crate) rules: RuleRegistry,
}

impl<'s> Compiler<'s> {
    pub(crate) fn new(schema: &'s JsonSchema) -> Self {
        Self {
            schema,
            rules: RuleRegistry::new(),
        }
    }

    /// Builds the terminal for `id` at the tracker's current scope.
    pub(crate) fn lower(&mut self, id: SchemaId, scopes: &mut ScopeTracker) -> Result<TerminalRef, CompileError> {
        let schema = self.schema;
        let terminal = match schema.kind(id) {
            SchemaKind::Basic(types) => {
                let options = types.iter().map(|ty| basic(*ty)).collect();
                Terminal::new(TerminalKind::OneOf(options))
            }
            SchemaKind::String {
                min_length,
                max_length,
            } => Terminal::new(TerminalKind::BoundedString {
                min: *min_length,
                max: *max_length,
            }),
            SchemaKind::FormatString(format) => Terminal::new(TerminalKind::Format(format.clone())),
            SchemaKind::Const(literal) => Terminal::new(TerminalKind::Literal(literal.clone())),
            SchemaKind::Enum(values) => Terminal::new(TerminalKind::OneOf(
                values
                    .iter()
                    .map(|v| Terminal::new(TerminalKind::Literal(v.clone())))
                    .collect(),
            )),
            SchemaKind::OneOf(alternatives) => {
                let options = alternatives
                    .iter()
                    .map(|alt| self.lower(*alt, scopes))
                    .collect::<Result<Vec<_>, _>>()?;
                Terminal::new(TerminalKind::OneOf(options))
            }
            SchemaKind::Object(shape) => {
                let scope = scopes.current();
                let (fields, additional) = scopes.nested(|scopes| {
                    let fields = shape
                        .properties
                        .iter()
                        .map(|(key, value)| Ok((key.clone(), self.lower(*value, scopes)?)))
                        .collect::<Result<Vec<_>, CompileError>>()?;
                    let additional = match shape.additional {
                        AdditionalProperties::Deny => None,
                        AdditionalProperties::Allow => Some(Terminal::new(TerminalKind::AnyJson {
                            scope: scopes.current(),
                        })),
                        AdditionalProperties::Schema(extra) => Some(self.lower(extra, scopes)?),
                    };
                    Ok::<_, CompileError>((fields, additional))
                })?;

                let declared = fields.len();
                Terminal::new(TerminalKind::Object {
                    fields,
                    additional,
                    min_extra: shape.min_properties.saturating_sub(declared),
                    max_extra: shape.max_properties.map(|m| m.saturating_sub(declared)),
                    scope,
                })
            }
            SchemaKind::Array(shape) => {
                let scope = scopes.current();
                let (prefix, items) = scopes.nested(|scopes| {
                    let prefix = shape
                        .prefix_items
                        .iter()
                        .map(|item| self.lower(*item, scopes))
                        .collect::<Result<Vec<_>, _>>()?;
                    let items = match shape.items {
                        Some(items) => self.lower(items, scopes)?,
                        None => Terminal::new(TerminalKind::AnyJson {
                            scope: scopes.current(),
                        }),
                    };
                    Ok::<_, CompileError>((prefix, items))
                })?;

                Terminal::new(TerminalKind::Array {
                    prefix,
                    items,
                    min_items: shape.min_items,
                    max_items: shape.max_items,
                    scope,
                })
            }
            SchemaKind::Ref { def_name, target } => Terminal::new(TerminalKind::DefRef {
                def_name: def_name.clone(),
                target: *target,
                scope: scopes.current(),
            }),
        };
        Ok(terminal)
    }

    /// The rule name of a def, compiling its body on first use.
    ///
    /// The name is reserved before the body is lowered, so references met
    /// inside the body resolve to it instead of recursing.
    pub(crate) fn def_rule(&mut self, def_name: &str, target: SchemaId, scope: Scope) -> Result<String, CompileError> {
        let (fresh, name) = self.rules.rule_name_for_def(def_name, target)?;
        if !fresh {
            return Ok(name);
        }
        if self.is_reference_cycle(target) {
            return Err(CompileError::SelfReferentialDef {
                name: def_name.to_string(),
            });
        }

        let mut scopes = ScopeTracker::starting_at(scope);
        let body = self.lower(target, &mut scopes)?;
        let body = body.fragment(self)?;
        if body == name {
            return Err(CompileError::SelfReferentialDef {
                name: def_name.to_string(),
            });
        }
        trace!(def = def_name, rule = %name, "compiled def body");
        self.rules.register_rule_body(&name, body)?;
        Ok(name)
    }
}

impl Compiler<'_> {
    /// Whether following `start` through references and single-branch
    /// `oneOf`s leads back to a node already visited. Such a def never
    /// reaches a terminal, so its rule derives nothing.
    fn is_reference_cycle(&self, start: SchemaId) -> bool {
        let mut seen = Vec::new();
        let mut current = start;
        loop {
            if seen.contains(&current) {
                return true;
            }
            seen.push(current);
            current = match self.schema.kind(current) {
                SchemaKind::Ref { target, .. } => *target,
                SchemaKind::OneOf(alternatives) if alternatives.len() == 1 => alternatives[0],
                _ => return false,
            };
        }
    }
}

fn basic(ty: BasicType) -> TerminalRef {
    let kind = match ty {
        BasicType::String => TerminalKind::String,
        BasicType::Number => TerminalKind::Number { fractional: true },
        BasicType::Integer => TerminalKind::Number { fractional: false },
        BasicType::Boolean => TerminalKind::Boolean,
        BasicType::Null => TerminalKind::Null,
    };
    Terminal::new(kind)
}
