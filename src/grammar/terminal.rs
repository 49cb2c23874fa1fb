//! Terminal nodes: one grammar-producing unit per schema construct.
//!
//! Every node can produce its own fragment and can resolve itself into the
//! registry. Resolution is memoized per node, so a node shared by several
//! parents registers its rule exactly once.

use std::rc::Rc;

use once_cell::unsync::OnceCell;
use serde_json::Value;

use super::compiler::Compiler;
use super::gbnf::{self, alt, quote, repeated_literal, seq, NO_VALUE};
use super::scope::Scope;
use crate::error::CompileError;
use crate::schema::{Literal, SchemaId, StringFormat};

pub(crate) type TerminalRef = Rc<Terminal>;

#[derive(Debug)]
pub(crate) enum TerminalKind {
    /// Any JSON string.
    String,
    /// One character inside a JSON string.
    StringChar,
    /// A JSON string whose length is bounded.
    BoundedString { min: usize, max: Option<usize> },
    Literal(Literal),
    Number { fractional: bool },
    Boolean,
    Null,
    Format(StringFormat),
    Array {
        prefix: Vec<TerminalRef>,
        items: TerminalRef,
        min_items: usize,
        max_items: Option<usize>,
        scope: Scope,
    },
    Object {
        fields: Vec<(String, TerminalRef)>,
        additional: Option<TerminalRef>,
        min_extra: usize,
        max_extra: Option<usize>,
        scope: Scope,
    },
    OneOf(Vec<TerminalRef>),
    Repetition {
        value: TerminalRef,
        separator: Option<TerminalRef>,
        min: usize,
        max: Option<usize>,
    },
    /// Raw grammar text, emitted verbatim.
    Grammar(String),
    /// Several terminals one after another.
    Sequence(Vec<TerminalRef>),
    DefRef {
        def_name: String,
        target: SchemaId,
        scope: Scope,
    },
    AnyJson { scope: Scope },
    Whitespace { scope: Scope },
    CommaWhitespace { scope: Scope },
}

#[derive(Debug)]
pub(crate) struct Terminal {
    kind: TerminalKind,
    resolved: OnceCell<String>,
}

impl Terminal {
    pub(crate) fn new(kind: TerminalKind) -> TerminalRef {
        Rc::new(Self {
            kind,
            resolved: OnceCell::new(),
        })
    }

    #[cfg(test)]
    pub(crate) fn kind(&self) -> &TerminalKind {
        &self.kind
    }

    /// Text that stands for this node inside another rule.
    ///
    /// Either the inlined fragment or the name of a rule that is registered
    /// by the time this returns. Calling it again returns the same text and
    /// registers nothing new.
    pub(crate) fn resolve(&self, c: &mut Compiler<'_>) -> Result<String, CompileError> {
        if let Some(done) = self.resolved.get() {
            return Ok(done.clone());
        }
        let text = self.resolve_uncached(c)?;
        let _ = self.resolved.set(text.clone());
        Ok(text)
    }

    fn resolve_uncached(&self, c: &mut Compiler<'_>) -> Result<String, CompileError> {
        match &self.kind {
            TerminalKind::Literal(literal) => resolve_literal(literal, c),
            TerminalKind::Null
            | TerminalKind::Grammar(_)
            | TerminalKind::Repetition { .. }
            | TerminalKind::DefRef { .. }
            | TerminalKind::Format(StringFormat::Unsupported(_)) => self.fragment(c),
            TerminalKind::OneOf(options) => {
                let branches = branches(options, c)?;
                if branches.len() <= 1 {
                    return Ok(alt(&branches));
                }
                Ok(c.rules.intern_body(alt(&branches))?)
            }
            _ => match self.reserved_name() {
                Some(name) => {
                    if !c.rules.contains(&name) {
                        c.rules.reserve(&name)?;
                        let body = self.rule_body(c)?;
                        c.rules.register_rule_body(&name, body)?;
                    }
                    Ok(name)
                }
                None => {
                    let body = self.fragment(c)?;
                    Ok(c.rules.intern_body(body)?)
                }
            },
        }
    }

    /// The fixed rule name for kinds whose grammar depends only on their settings.
    fn reserved_name(&self) -> Option<String> {
        let name = match &self.kind {
            TerminalKind::String => "string-rule".to_string(),
            TerminalKind::StringChar => "string-char-rule".to_string(),
            TerminalKind::Number { fractional: true } => "fractional-number-rule".to_string(),
            TerminalKind::Number { fractional: false } => "integer-number-rule".to_string(),
            TerminalKind::Boolean => "boolean-rule".to_string(),
            TerminalKind::Format(StringFormat::Date) => "date-rule".to_string(),
            TerminalKind::Format(StringFormat::Time) => "time-rule".to_string(),
            TerminalKind::Format(StringFormat::DateTime) => "date-time-rule".to_string(),
            TerminalKind::Whitespace { scope } => whitespace_name("whitespace", *scope),
            TerminalKind::CommaWhitespace { scope } => whitespace_name("comma-whitespace", *scope),
            TerminalKind::AnyJson { scope } => {
                let (mode, depth) = if scope.allow_new_lines {
                    ('n', scope.depth)
                } else {
                    ('s', 0)
                };
                format!("any-json-{}-{}-{}-rule", mode, depth, scope.pad_spaces)
            }
            _ => return None,
        };
        Some(name)
    }

    /// Right-hand side used when this node owns a rule.
    fn rule_body(&self, c: &mut Compiler<'_>) -> Result<String, CompileError> {
        match &self.kind {
            TerminalKind::StringChar => Ok(gbnf::STRING_CHAR.to_string()),
            TerminalKind::Whitespace { scope } => Ok(whitespace(*scope, false)),
            _ => self.fragment(c),
        }
    }

    /// This node's own grammar, in terms of its children's resolved text.
    pub(crate) fn fragment(&self, c: &mut Compiler<'_>) -> Result<String, CompileError> {
        match &self.kind {
            TerminalKind::String => {
                let ch = Terminal::new(TerminalKind::StringChar).resolve(c)?;
                Ok(seq([quote("\""), format!("{}*", ch), quote("\"")]))
            }
            TerminalKind::StringChar => Ok(format!("( {} )", gbnf::STRING_CHAR)),
            TerminalKind::BoundedString { min, max } => {
                let chars = Terminal::new(TerminalKind::Repetition {
                    value: Terminal::new(TerminalKind::StringChar),
                    separator: None,
                    min: *min,
                    max: *max,
                })
                .resolve(c)?;
                Ok(seq([quote("\""), chars, quote("\"")]))
            }
            TerminalKind::Literal(literal) => Ok(quote(&literal.to_json())),
            TerminalKind::Number { fractional } => Ok(if *fractional {
                seq([gbnf::INTEGER, gbnf::FRACTION_AND_EXPONENT])
            } else {
                gbnf::INTEGER.to_string()
            }),
            TerminalKind::Boolean => Ok(gbnf::BOOLEAN.to_string()),
            TerminalKind::Null => Ok(quote("null")),
            TerminalKind::Format(format) => Ok(format_grammar(format)),
            TerminalKind::Array {
                prefix,
                items,
                min_items,
                max_items,
                scope,
            } => array(c, prefix, items, *min_items, *max_items, *scope),
            TerminalKind::Object {
                fields,
                additional,
                min_extra,
                max_extra,
                scope,
            } => object(c, fields, additional.as_ref(), *min_extra, *max_extra, *scope),
            TerminalKind::OneOf(options) => Ok(alt(&branches(options, c)?)),
            TerminalKind::Repetition {
                value,
                separator,
                min,
                max,
            } => {
                let value = value.resolve(c)?;
                let separator = match separator {
                    Some(s) => Some(s.resolve(c)?),
                    None => None,
                };
                Ok(repetition(&value, separator.as_deref(), *min, *max))
            }
            TerminalKind::Grammar(text) => Ok(text.clone()),
            TerminalKind::Sequence(parts) => {
                let parts = parts
                    .iter()
                    .map(|part| part.resolve(c))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(seq(parts))
            }
            TerminalKind::DefRef {
                def_name,
                target,
                scope,
            } => c.def_rule(def_name, *target, *scope),
            TerminalKind::AnyJson { scope } => any_json(c, *scope),
            TerminalKind::Whitespace { scope } => Ok(whitespace(*scope, true)),
            TerminalKind::CommaWhitespace { scope } => {
                Ok(seq([quote(","), whitespace(*scope, true)]))
            }
        }
    }
}

fn resolve_literal(literal: &Literal, c: &mut Compiler<'_>) -> Result<String, CompileError> {
    let json = literal.to_json();
    let text = quote(&json);
    if text.len() <= c.rules.peek_literal_name(&json).len() {
        return Ok(text);
    }
    let (fresh, name) = c.rules.rule_name_for_literal(&json);
    if fresh {
        c.rules.reserve(&name)?;
        c.rules.register_rule_body(&name, text)?;
    }
    Ok(name)
}

/// Resolved alternatives with empty ones and repeats dropped.
fn branches(options: &[TerminalRef], c: &mut Compiler<'_>) -> Result<Vec<String>, CompileError> {
    let mut out: Vec<String> = Vec::with_capacity(options.len());
    for option in options {
        let text = option.resolve(c)?;
        if text != NO_VALUE && !out.contains(&text) {
            out.push(text);
        }
    }
    Ok(out)
}

fn whitespace_name(prefix: &str, scope: Scope) -> String {
    if scope.allow_new_lines {
        format!("{}-b-{}-{}-rule", prefix, scope.depth, scope.pad_spaces)
    } else {
        format!("{}-no-new-lines-rule", prefix)
    }
}

/// Optional whitespace before a value at `scope`: a newline plus indentation, or at most one space.
fn whitespace(scope: Scope, wrap: bool) -> String {
    if !scope.allow_new_lines {
        return "[ ]?".to_string();
    }

    let mut indents = Vec::new();
    if scope.depth > 0 {
        let spaces = scope.depth * scope.pad_spaces;
        if spaces > 0 {
            indents.push(repeated_literal(" ", spaces));
        }
        indents.push(repeated_literal("\t", scope.depth));
    }

    let newline = if indents.is_empty() {
        "[\\n]".to_string()
    } else {
        format!("[\\n] {}", alt(&indents))
    };
    let body = format!("{} | [ ]?", newline);
    if wrap {
        format!("( {} )", body)
    } else {
        body
    }
}

fn format_grammar(format: &StringFormat) -> String {
    let inner = match format {
        StringFormat::Date => seq([gbnf::DATE]),
        StringFormat::Time => seq([gbnf::TIME]),
        StringFormat::DateTime => seq([gbnf::DATE, "\"T\"", gbnf::TIME]),
        StringFormat::Unsupported(_) => return quote("\"\""),
    };
    seq([quote("\""), inner, quote("\"")])
}

/// `value` repeated between `min` and `max` times, with `separator` between copies.
pub(crate) fn repetition(value: &str, separator: Option<&str>, min: usize, max: Option<usize>) -> String {
    let max = max.map(|m| m.max(min));
    if max == Some(0) {
        return NO_VALUE.to_string();
    }
    let v = value;

    match (separator, min, max) {
        (_, 0, Some(1)) => format!("( {} )?", v),
        (_, 1, Some(1)) => v.to_string(),
        (None, m, Some(n)) if m == n => format!("( {} ){{{}}}", v, m),
        (Some(s), 2, Some(2)) => seq([v, s, v]),
        (Some(s), m, Some(n)) if m == n => format!("{} ( {} {} ){{{}}}", v, s, v, m - 1),
        (None, 0, None) => format!("( {} )*", v),
        (Some(s), 0, None) => format!("( {} ( {} {} )* )?", v, s, v),
        (None, 1, None) => format!("( {} )+", v),
        (Some(s), 1, None) => format!("{} ( {} {} )*", v, s, v),
        (None, m, None) => format!("( {} ){{{},}}", v, m),
        (Some(s), m, None) => format!("{} ( {} {} ){{{},}}", v, s, v, m - 1),
        (None, m, Some(n)) => format!("( {} ){{{},{}}}", v, m, n),
        (Some(s), 0, Some(2)) => format!("( {} ( {} {} )? )?", v, s, v),
        (Some(s), 0, Some(n)) => format!("( {} ( {} {} ){{0,{}}} )?", v, s, v, n - 1),
        (Some(s), 1, Some(2)) => format!("{} ( {} {} )?", v, s, v),
        (Some(s), 1, Some(n)) => format!("{} ( {} {} ){{0,{}}}", v, s, v, n - 1),
        (Some(s), m, Some(n)) => format!("{} ( {} {} ){{{},{}}}", v, s, v, m - 1, n - 1),
    }
}

/// Fixed leading elements followed by a bounded run of `tail`, all separated by `comma`.
fn separated_with_tail(
    c: &mut Compiler<'_>,
    heads: Vec<String>,
    tail: &TerminalRef,
    tail_min: usize,
    tail_max: Option<usize>,
    comma: &TerminalRef,
) -> Result<String, CompileError> {
    if heads.is_empty() {
        return Terminal::new(TerminalKind::Repetition {
            value: Rc::clone(tail),
            separator: Some(Rc::clone(comma)),
            min: tail_min,
            max: tail_max,
        })
        .resolve(c);
    }

    let comma_text = comma.resolve(c)?;
    let mut parts = Vec::with_capacity(heads.len() * 2);
    for (i, head) in heads.into_iter().enumerate() {
        if i > 0 {
            parts.push(comma_text.clone());
        }
        parts.push(head);
    }

    if tail_max != Some(0) {
        let rest = Terminal::new(TerminalKind::Repetition {
            value: Terminal::new(TerminalKind::Sequence(vec![Rc::clone(comma), Rc::clone(tail)])),
            separator: None,
            min: tail_min,
            max: tail_max,
        })
        .resolve(c)?;
        parts.push(rest);
    }
    Ok(seq(parts))
}

fn array(
    c: &mut Compiler<'_>,
    prefix: &[TerminalRef],
    items: &TerminalRef,
    min_items: usize,
    max_items: Option<usize>,
    scope: Scope,
) -> Result<String, CompileError> {
    let inner = scope.nested();
    let open_ws = Terminal::new(TerminalKind::Whitespace { scope: inner }).resolve(c)?;
    let comma = Terminal::new(TerminalKind::CommaWhitespace { scope: inner });

    let content = if prefix.is_empty() && min_items == 0 && max_items.is_none() {
        let item = items.resolve(c)?;
        let comma = comma.resolve(c)?;
        alt(&[
            format!("{} ( {} {} )*", item, comma, item),
            format!("( {} )?", item),
        ])
    } else {
        let heads = prefix
            .iter()
            .map(|p| p.resolve(c))
            .collect::<Result<Vec<_>, _>>()?;
        let taken = heads.len();
        separated_with_tail(
            c,
            heads,
            items,
            min_items.saturating_sub(taken),
            max_items.map(|m| m.saturating_sub(taken)),
            &comma,
        )?
    };

    let close_ws = Terminal::new(TerminalKind::Whitespace { scope }).resolve(c)?;
    Ok(seq([quote("["), open_ws, content, close_ws, quote("]")]))
}

fn object(
    c: &mut Compiler<'_>,
    fields: &[(String, TerminalRef)],
    additional: Option<&TerminalRef>,
    min_extra: usize,
    max_extra: Option<usize>,
    scope: Scope,
) -> Result<String, CompileError> {
    let inner = scope.nested();
    let open_ws = Terminal::new(TerminalKind::Whitespace { scope: inner }).resolve(c)?;
    let comma = Terminal::new(TerminalKind::CommaWhitespace { scope: inner });

    let mut heads = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        let key = format!("{}:", Value::String(key.clone()));
        heads.push(seq([quote(&key), "[ ]?".to_string(), value.resolve(c)?]));
    }

    let content = match additional {
        Some(value) => {
            let entry = Terminal::new(TerminalKind::Sequence(vec![
                Terminal::new(TerminalKind::String),
                Terminal::new(TerminalKind::Grammar(seq([quote(":"), "[ ]?".to_string()]))),
                Rc::clone(value),
            ]));
            separated_with_tail(c, heads, &entry, min_extra, max_extra, &comma)?
        }
        None => {
            let comma = comma.resolve(c)?;
            heads.join(&format!(" {} ", comma))
        }
    };

    let close_ws = Terminal::new(TerminalKind::Whitespace { scope }).resolve(c)?;
    Ok(seq([quote("{"), open_ws, content, close_ws, quote("}")]))
}

/// Any JSON value. Nested values drop newlines, which keeps the rule set finite.
fn any_json(c: &mut Compiler<'_>, scope: Scope) -> Result<String, CompileError> {
    let sub_scope = if scope.allow_new_lines { scope.flat() } else { scope };
    let sub = Terminal::new(TerminalKind::AnyJson { scope: sub_scope });

    let options = vec![
        Terminal::new(TerminalKind::String),
        Terminal::new(TerminalKind::Number { fractional: true }),
        Terminal::new(TerminalKind::Boolean),
        Terminal::new(TerminalKind::Null),
        Terminal::new(TerminalKind::Array {
            prefix: Vec::new(),
            items: Rc::clone(&sub),
            min_items: 0,
            max_items: None,
            scope,
        }),
        Terminal::new(TerminalKind::Object {
            fields: Vec::new(),
            additional: Some(sub),
            min_extra: 0,
            max_extra: None,
            scope,
        }),
    ];
    Ok(alt(&branches(&options, c)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(allow_new_lines: bool, depth: usize) -> Scope {
        Scope {
            allow_new_lines,
            pad_spaces: 4,
            depth,
        }
    }

    #[test]
    fn test_repetition_shapes() {
        assert_eq!(repetition("x", None, 0, Some(0)), NO_VALUE);
        assert_eq!(repetition("x", None, 0, Some(1)), "( x )?");
        assert_eq!(repetition("x", Some("s"), 1, Some(1)), "x");
        assert_eq!(repetition("x", None, 3, Some(3)), "( x ){3}");
        assert_eq!(repetition("x", Some("s"), 2, Some(2)), "x s x");
        assert_eq!(repetition("x", Some("s"), 4, Some(4)), "x ( s x ){3}");
        assert_eq!(repetition("x", None, 0, None), "( x )*");
        assert_eq!(repetition("x", Some("s"), 0, None), "( x ( s x )* )?");
        assert_eq!(repetition("x", Some("s"), 1, None), "x ( s x )*");
        assert_eq!(repetition("x", Some("s"), 3, None), "x ( s x ){2,}");
        assert_eq!(repetition("x", None, 2, Some(5)), "( x ){2,5}");
        assert_eq!(repetition("x", Some("s"), 0, Some(4)), "( x ( s x ){0,3} )?");
        assert_eq!(repetition("x", Some("s"), 1, Some(2)), "x ( s x )?");
        assert_eq!(repetition("x", Some("s"), 2, Some(6)), "x ( s x ){1,5}");
    }

    #[test]
    fn test_repetition_raises_max_below_min() {
        assert_eq!(repetition("x", None, 2, Some(1)), "( x ){2}");
    }

    #[test]
    fn test_whitespace_bodies() {
        assert_eq!(whitespace(scope(false, 3), true), "[ ]?");
        assert_eq!(whitespace(scope(true, 0), false), "[\\n] | [ ]?");
        assert_eq!(
            whitespace(scope(true, 1), true),
            "( [\\n] ( \"    \" | \"\\t\" ) | [ ]? )"
        );
    }

    #[test]
    fn test_whitespace_names() {
        assert_eq!(whitespace_name("whitespace", scope(true, 2)), "whitespace-b-2-4-rule");
        assert_eq!(
            whitespace_name("comma-whitespace", scope(false, 2)),
            "comma-whitespace-no-new-lines-rule"
        );
    }

    #[test]
    fn test_unsupported_format_is_the_empty_string() {
        assert_eq!(
            format_grammar(&StringFormat::Unsupported("email".to_string())),
            r#""\"\"""#
        );
    }
}
