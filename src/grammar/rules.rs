//! The rule registry: the single mutable context of one compilation.
//!
//! The registry hands out rule names, interns literals and defs so repeated
//! sub-grammars collapse into one rule, and renders the final document. Rules
//! are append-only: a name is reserved once and given a body once.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::trace;

use super::gbnf::sanitize_name;
use crate::error::InvariantViolation;
use crate::schema::SchemaId;

#[derive(Debug, Default)]
pub(crate) struct RuleRegistry {
    next_rule: usize,
    next_literal: usize,
    /// JSON text of a literal -> rule name.
    literals: HashMap<String, String>,
    /// (def name, def body) -> rule name.
    defs: HashMap<(String, SchemaId), String>,
    /// Rules in registration order. `None` marks a reserved, unfilled slot.
    rules: IndexMap<String, Option<String>>,
    /// Body text -> the first rule registered with it.
    bodies: HashMap<String, String>,
    taken: HashSet<String>,
}

impl RuleRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A fresh anonymous rule name.
    pub(crate) fn new_rule_name(&mut self) -> String {
        loop {
            self.next_rule += 1;
            let name = format!("rule{}", self.next_rule);
            if self.taken.insert(name.clone()) {
                return name;
            }
        }
    }

    /// The name [`rule_name_for_literal`](Self::rule_name_for_literal) would return,
    /// without allocating it.
    pub(crate) fn peek_literal_name(&self, json: &str) -> String {
        match self.literals.get(json) {
            Some(name) => name.clone(),
            None => format!("val{}", self.next_literal + 1),
        }
    }

    /// The rule name for a literal, and whether it was allocated by this call.
    pub(crate) fn rule_name_for_literal(&mut self, json: &str) -> (bool, String) {
        if let Some(name) = self.literals.get(json) {
            return (false, name.clone());
        }
        let name = loop {
            self.next_literal += 1;
            let name = format!("val{}", self.next_literal);
            if self.taken.insert(name.clone()) {
                break name;
            }
        };
        self.literals.insert(json.to_string(), name.clone());
        (true, name)
    }

    /// The rule name for a def, and whether this call reserved it.
    ///
    /// A newly reserved def already has its slot, so references met while
    /// compiling its body resolve to the same name.
    pub(crate) fn rule_name_for_def(
        &mut self,
        def_name: &str,
        target: SchemaId,
    ) -> Result<(bool, String), InvariantViolation> {
        let key = (def_name.to_string(), target);
        if let Some(name) = self.defs.get(&key) {
            return Ok((false, name.clone()));
        }

        let base = format!("def-{}", sanitize_name(def_name));
        let mut name = base.clone();
        let mut suffix = 1;
        while self.taken.contains(&name) {
            suffix += 1;
            name = format!("{}-{}", base, suffix);
        }
        self.reserve(&name)?;
        trace!(def = def_name, rule = %name, "reserved def rule");
        self.defs.insert(key, name.clone());
        Ok((true, name))
    }

    /// True if `name` has a slot, filled or not.
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Reserves a slot for `name`.
    pub(crate) fn reserve(&mut self, name: &str) -> Result<(), InvariantViolation> {
        if self.rules.contains_key(name) {
            return Err(InvariantViolation::RuleRedefined(name.to_string()));
        }
        self.taken.insert(name.to_string());
        self.rules.insert(name.to_string(), None);
        Ok(())
    }

    /// Fills the reserved slot `name` with `body`.
    pub(crate) fn register_rule_body(&mut self, name: &str, body: String) -> Result<(), InvariantViolation> {
        let slot = self
            .rules
            .get_mut(name)
            .ok_or_else(|| InvariantViolation::RuleNotReserved(name.to_string()))?;
        if slot.is_some() {
            return Err(InvariantViolation::RuleRedefined(name.to_string()));
        }
        self.bodies.entry(body.clone()).or_insert_with(|| name.to_string());
        *slot = Some(body);
        Ok(())
    }

    /// The name of a rule with exactly `body`, registering an anonymous one if
    /// no such rule exists yet.
    pub(crate) fn intern_body(&mut self, body: String) -> Result<String, InvariantViolation> {
        if let Some(name) = self.bodies.get(&body) {
            return Ok(name.clone());
        }
        let name = self.new_rule_name();
        self.reserve(&name)?;
        self.register_rule_body(&name, body)?;
        Ok(name)
    }

    /// Number of rules registered so far, `root` excluded.
    pub(crate) fn len(&self) -> usize {
        self.rules.len()
    }

    /// Renders the document: `root` first, then every rule in registration order.
    pub(crate) fn serialize(&self, root: &str) -> Result<String, InvariantViolation> {
        let mut lines = Vec::with_capacity(self.rules.len() + 1);
        lines.push(format!("root ::= {}", root));
        for (name, body) in &self.rules {
            let body = body
                .as_ref()
                .ok_or_else(|| InvariantViolation::RuleNeverDefined(name.clone()))?;
            lines.push(format!("{} ::= {}", name, body));
        }
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_names_are_sequential() {
        let mut rules = RuleRegistry::new();
        assert_eq!(rules.new_rule_name(), "rule1");
        assert_eq!(rules.new_rule_name(), "rule2");
    }

    #[test]
    fn test_literal_names_are_interned() {
        let mut rules = RuleRegistry::new();
        assert_eq!(rules.peek_literal_name("\"a\""), "val1");

        let (fresh, name) = rules.rule_name_for_literal("\"a\"");
        assert!(fresh);
        assert_eq!(name, "val1");

        let (fresh, again) = rules.rule_name_for_literal("\"a\"");
        assert!(!fresh);
        assert_eq!(again, "val1");

        assert_eq!(rules.peek_literal_name("\"b\""), "val2");
    }

    #[test]
    fn test_same_def_is_reserved_once() {
        let mut rules = RuleRegistry::new();
        let id = SchemaId(3);

        let (fresh, name) = rules.rule_name_for_def("Node", id).unwrap();
        assert!(fresh);
        assert_eq!(name, "def-Node");

        let (fresh, again) = rules.rule_name_for_def("Node", id).unwrap();
        assert!(!fresh);
        assert_eq!(again, name);
    }

    #[test]
    fn test_distinct_defs_sharing_a_name_get_suffixes() {
        let mut rules = RuleRegistry::new();
        let (_, first) = rules.rule_name_for_def("Item", SchemaId(1)).unwrap();
        let (_, second) = rules.rule_name_for_def("Item", SchemaId(2)).unwrap();
        let (_, third) = rules.rule_name_for_def("Item", SchemaId(3)).unwrap();
        assert_eq!(first, "def-Item");
        assert_eq!(second, "def-Item-2");
        assert_eq!(third, "def-Item-3");
    }

    #[test]
    fn test_register_twice_is_an_invariant_violation() {
        let mut rules = RuleRegistry::new();
        rules.reserve("x-rule").unwrap();
        rules.register_rule_body("x-rule", "\"x\"".to_string()).unwrap();

        assert_eq!(
            rules.register_rule_body("x-rule", "\"y\"".to_string()),
            Err(InvariantViolation::RuleRedefined("x-rule".to_string()))
        );
        assert_eq!(
            rules.register_rule_body("y-rule", "\"y\"".to_string()),
            Err(InvariantViolation::RuleNotReserved("y-rule".to_string()))
        );
    }

    #[test]
    fn test_intern_body_reuses_identical_rules() {
        let mut rules = RuleRegistry::new();
        let first = rules.intern_body("( a | b )".to_string()).unwrap();
        let second = rules.intern_body("( a | b )".to_string()).unwrap();
        let other = rules.intern_body("( a | c )".to_string()).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn test_serialize_puts_root_first() {
        let mut rules = RuleRegistry::new();
        let name = rules.intern_body("\"a\"".to_string()).unwrap();
        let doc = rules.serialize(&name).unwrap();
        assert_eq!(doc, "root ::= rule1\nrule1 ::= \"a\"");
    }

    #[test]
    fn test_serialize_rejects_unfilled_slots() {
        let mut rules = RuleRegistry::new();
        rules.rule_name_for_def("Node", SchemaId(0)).unwrap();
        assert_eq!(
            rules.serialize("def-Node"),
            Err(InvariantViolation::RuleNeverDefined("def-Node".to_string()))
        );
    }
}
