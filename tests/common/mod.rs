//! A small backtracking GBNF recognizer used to check what compiled grammars derive.
//!
//! It understands the subset the compiler emits: string literals, character
//! classes, groups, alternation, `*`, `+`, `?`, `{m}`, `{m,}`, `{m,n}` and rule
//! references. Malformed documents panic, which fails the calling test.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

use gbnf_json::{compile, GrammarOptions, JsonSchema};
use serde_json::Value;

#[derive(Debug, Clone)]
enum Expr {
    Literal(Vec<char>),
    Class { negated: bool, ranges: Vec<(char, char)> },
    Ref(String),
    Seq(Vec<Expr>),
    Alt(Vec<Expr>),
    Repeat { expr: Box<Expr>, min: usize, max: Option<usize> },
}

/// A parsed grammar document.
pub struct Grammar {
    order: Vec<String>,
    rules: HashMap<String, Expr>,
}

impl Grammar {
    pub fn parse(document: &str) -> Self {
        let mut order = Vec::new();
        let mut rules = HashMap::new();
        for line in document.lines() {
            let (name, body) = line
                .split_once(" ::= ")
                .unwrap_or_else(|| panic!("not a rule line: {:?}", line));
            let chars: Vec<char> = body.chars().collect();
            let mut pos = 0;
            let expr = parse_alt(&chars, &mut pos);
            skip_spaces(&chars, &mut pos);
            assert_eq!(pos, chars.len(), "trailing input in rule {}: {:?}", name, body);
            assert!(
                rules.insert(name.to_string(), expr).is_none(),
                "rule {} defined twice",
                name
            );
            order.push(name.to_string());
        }
        assert_eq!(order.first().map(String::as_str), Some("root"), "first rule must be root");

        let grammar = Self { order, rules };
        for expr in grammar.rules.values() {
            grammar.check_refs(expr);
        }
        grammar
    }

    fn check_refs(&self, expr: &Expr) {
        match expr {
            Expr::Ref(name) => assert!(self.rules.contains_key(name), "undefined rule {}", name),
            Expr::Seq(parts) | Expr::Alt(parts) => parts.iter().for_each(|p| self.check_refs(p)),
            Expr::Repeat { expr, .. } => self.check_refs(expr),
            _ => {}
        }
    }

    /// Rule names in document order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Whether `root` derives exactly `text`.
    pub fn accepts(&self, text: &str) -> bool {
        let input: Vec<char> = text.chars().collect();
        let matcher = Matcher {
            grammar: self,
            input: &input,
            memo: RefCell::new(HashMap::new()),
        };
        matcher.rule("root", 0).contains(&input.len())
    }
}

struct Matcher<'a> {
    grammar: &'a Grammar,
    input: &'a [char],
    memo: RefCell<HashMap<(String, usize), BTreeSet<usize>>>,
}

impl Matcher<'_> {
    fn rule(&self, name: &str, pos: usize) -> BTreeSet<usize> {
        let key = (name.to_string(), pos);
        if let Some(found) = self.memo.borrow().get(&key) {
            return found.clone();
        }
        self.memo.borrow_mut().insert(key.clone(), BTreeSet::new());
        let ends = self.ends(&self.grammar.rules[name], pos);
        self.memo.borrow_mut().insert(key, ends.clone());
        ends
    }

    fn ends(&self, expr: &Expr, pos: usize) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        match expr {
            Expr::Literal(text) => {
                if self.input[pos..].starts_with(text) {
                    out.insert(pos + text.len());
                }
            }
            Expr::Class { negated, ranges } => {
                if let Some(&c) = self.input.get(pos) {
                    let inside = ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi);
                    if inside != *negated {
                        out.insert(pos + 1);
                    }
                }
            }
            Expr::Ref(name) => return self.rule(name, pos),
            Expr::Seq(parts) => {
                let mut frontier = BTreeSet::from([pos]);
                for part in parts {
                    frontier = frontier.iter().flat_map(|&p| self.ends(part, p)).collect();
                    if frontier.is_empty() {
                        break;
                    }
                }
                return frontier;
            }
            Expr::Alt(options) => {
                for option in options {
                    out.extend(self.ends(option, pos));
                }
            }
            Expr::Repeat { expr, min, max } => {
                let mut frontier = BTreeSet::from([pos]);
                let mut count = 0;
                loop {
                    if count >= *min {
                        out.extend(frontier.iter().copied());
                    }
                    if Some(count) == *max {
                        break;
                    }
                    let mut next: BTreeSet<usize> =
                        frontier.iter().flat_map(|&p| self.ends(expr, p)).collect();
                    if count >= *min {
                        next.retain(|p| !out.contains(p));
                    }
                    if next.is_empty() {
                        break;
                    }
                    frontier = next;
                    count += 1;
                }
            }
        }
        out
    }
}

fn skip_spaces(chars: &[char], pos: &mut usize) {
    while chars.get(*pos) == Some(&' ') {
        *pos += 1;
    }
}

fn parse_alt(chars: &[char], pos: &mut usize) -> Expr {
    let mut options = vec![parse_seq(chars, pos)];
    loop {
        skip_spaces(chars, pos);
        if chars.get(*pos) != Some(&'|') {
            break;
        }
        *pos += 1;
        options.push(parse_seq(chars, pos));
    }
    if options.len() == 1 {
        options.remove(0)
    } else {
        Expr::Alt(options)
    }
}

fn parse_seq(chars: &[char], pos: &mut usize) -> Expr {
    let mut parts = Vec::new();
    loop {
        skip_spaces(chars, pos);
        match chars.get(*pos) {
            None | Some('|') | Some(')') => break,
            _ => {}
        }
        let mut atom = parse_atom(chars, pos);
        while let Some(&c) = chars.get(*pos) {
            let (min, max) = match c {
                '*' => (0, None),
                '+' => (1, None),
                '?' => (0, Some(1)),
                '{' => {
                    *pos += 1;
                    let close = chars[*pos..]
                        .iter()
                        .position(|&c| c == '}')
                        .unwrap_or_else(|| panic!("unclosed repetition"));
                    let bounds: String = chars[*pos..*pos + close].iter().collect();
                    *pos += close;
                    match bounds.split_once(',') {
                        None => {
                            let n = bounds.parse().unwrap();
                            (n, Some(n))
                        }
                        Some((m, "")) => (m.parse().unwrap(), None),
                        Some((m, n)) => (m.parse().unwrap(), Some(n.parse().unwrap())),
                    }
                }
                _ => break,
            };
            *pos += 1;
            atom = Expr::Repeat {
                expr: Box::new(atom),
                min,
                max,
            };
        }
        parts.push(atom);
    }
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        Expr::Seq(parts)
    }
}

fn parse_atom(chars: &[char], pos: &mut usize) -> Expr {
    match chars[*pos] {
        '"' => {
            *pos += 1;
            let mut text = Vec::new();
            loop {
                match chars[*pos] {
                    '"' => break,
                    '\\' => text.push(parse_escape(chars, pos)),
                    c => {
                        text.push(c);
                        *pos += 1;
                    }
                }
            }
            *pos += 1;
            Expr::Literal(text)
        }
        '[' => {
            *pos += 1;
            let negated = chars[*pos] == '^';
            if negated {
                *pos += 1;
            }
            let mut ranges = Vec::new();
            while chars[*pos] != ']' {
                let lo = class_char(chars, pos);
                let hi = if chars[*pos] == '-' && chars[*pos + 1] != ']' {
                    *pos += 1;
                    class_char(chars, pos)
                } else {
                    lo
                };
                ranges.push((lo, hi));
            }
            *pos += 1;
            Expr::Class { negated, ranges }
        }
        '(' => {
            *pos += 1;
            let inner = parse_alt(chars, pos);
            skip_spaces(chars, pos);
            assert_eq!(chars.get(*pos), Some(&')'), "unclosed group");
            *pos += 1;
            inner
        }
        _ => {
            let start = *pos;
            while chars
                .get(*pos)
                .map_or(false, |c| c.is_ascii_alphanumeric() || *c == '-')
            {
                *pos += 1;
            }
            assert!(*pos > start, "unexpected character {:?}", chars[start]);
            Expr::Ref(chars[start..*pos].iter().collect())
        }
    }
}

fn class_char(chars: &[char], pos: &mut usize) -> char {
    if chars[*pos] == '\\' {
        parse_escape(chars, pos)
    } else {
        *pos += 1;
        chars[*pos - 1]
    }
}

fn parse_escape(chars: &[char], pos: &mut usize) -> char {
    let c = chars[*pos + 1];
    *pos += 2;
    match c {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'x' => {
            let hex: String = chars[*pos..*pos + 2].iter().collect();
            *pos += 2;
            char::from_u32(u32::from_str_radix(&hex, 16).unwrap()).unwrap()
        }
        other => other,
    }
}

/// Compiles `schema` with `options` and parses the result.
pub fn grammar_for(schema: &Value, options: GrammarOptions) -> Grammar {
    let schema = JsonSchema::from_value(schema).unwrap();
    Grammar::parse(&compile(&schema, &options).unwrap())
}

/// Compact JSON text for `value`.
pub fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap()
}

/// JSON text for `value` indented with `pad` spaces per level.
pub fn pretty(value: &Value, pad: usize) -> String {
    use serde::Serialize;

    let indent = " ".repeat(pad);
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer).unwrap();
    String::from_utf8(out).unwrap()
}
