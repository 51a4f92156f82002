//! Conditional attribute expressions.
//!
//! An expression is a small text template evaluated against a component's
//! params to produce one attribute value:
//!
//! ```text
//! uk-width-{width}[@{breakpoint}]      -> "uk-width-1-2@m" or "uk-width-1-2"
//! uk-text-{align:left|right|center}    -> "" unless align matches
//! {@!hidden}visible                    -> "visible" unless hidden is set
//! ```
//!
//! `{name}` substitutes a param and requires it to be present; `[...]` marks an
//! optional segment that collapses to nothing when one of its own placeholders
//! fails. A failing placeholder outside any optional vetoes the whole
//! expression.

mod eval;
mod parser;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub use eval::PatternCache;
pub use parser::{Node, Placeholder, Segment};

use crate::value::Params;

/// A parsed expression. Parsing is a pure function of the source string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    source: String,
    nodes: Vec<Node>,
}

impl Expression {
    pub fn parse(source: &str) -> Self {
        Self {
            source: source.to_string(),
            nodes: parser::parse_nodes(source),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Evaluate without a shared pattern cache.
    pub fn evaluate(&self, params: &Params) -> String {
        self.evaluate_with(params, &PatternCache::default())
    }

    pub fn evaluate_with(&self, params: &Params, patterns: &PatternCache) -> String {
        eval::evaluate_nodes(&self.source, &self.nodes, params, patterns)
    }
}

/// Memoizing front for expression parsing and evaluation.
///
/// Parsed expressions and compiled patterns are cached per distinct source
/// string. Concurrent misses may parse the same string twice; the cached value
/// is equivalent either way.
#[derive(Debug, Default)]
pub struct ExpressionEngine {
    parsed: RwLock<HashMap<String, Arc<Expression>>>,
    patterns: PatternCache,
}

impl ExpressionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&self, source: &str) -> Arc<Expression> {
        if let Some(found) = self
            .parsed
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(source)
        {
            return Arc::clone(found);
        }

        tracing::debug!("Parsing expression '{}'", source);
        let expression = Arc::new(Expression::parse(source));
        self.parsed
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(source.to_string())
            .or_insert_with(|| Arc::clone(&expression))
            .clone()
    }

    pub fn evaluate(&self, source: &str, params: &Params) -> String {
        if !source.contains('{') {
            return source.trim().to_string();
        }
        self.parse(source).evaluate_with(params, &self.patterns)
    }

    /// Number of memoized expressions.
    pub fn cached(&self) -> usize {
        self.parsed.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap_or_default()
    }

    fn eval(source: &str, value: Value) -> String {
        ExpressionEngine::new().evaluate(source, &params(value))
    }

    #[test]
    fn test_literal_is_trimmed() {
        assert_eq!(eval("  uk-card  ", json!({"a": 1})), "uk-card");
        assert_eq!(eval(" [not optional] ", json!({})), "[not optional]");
    }

    #[test]
    fn test_single_placeholder() {
        assert_eq!(eval("{a}", json!({"a": "x"})), "x");
        assert_eq!(eval("{a}", json!({})), "");
    }

    #[test]
    fn test_negated_missing_keeps_surrounding_text() {
        assert_eq!(eval("pre{!a}post", json!({})), "prepost");
        assert_eq!(eval("pre{!a}post", json!({"a": "x"})), "");
    }

    #[test]
    fn test_empty_flag_substitutes_nothing() {
        assert_eq!(eval("uk-light{@dark}", json!({"dark": true})), "uk-light");
        assert_eq!(eval("uk-light{@dark}", json!({"dark": false})), "");
    }

    #[test]
    fn test_regex_condition() {
        assert_eq!(eval("{a:[0-9]+}", json!({"a": "42"})), "42");
        assert_eq!(eval("{a:[0-9]+}", json!({"a": "x"})), "");
        assert_eq!(eval("{a:[0-9]+}", json!({"a": 7})), "7");
    }

    #[test]
    fn test_regex_with_unrelated_groups_is_whole_match() {
        assert_eq!(
            eval("uk-text-{align:(left)|(right)}", json!({"align": "right"})),
            "uk-text-right"
        );
        assert_eq!(eval("uk-text-{align:(left)|(right)}", json!({"align": "rightish"})), "");
    }

    #[test]
    fn test_negated_regex() {
        assert_eq!(eval("x-{@!mode:auto}", json!({"mode": "fixed"})), "x-");
        assert_eq!(eval("x-{@!mode:auto}", json!({"mode": "auto"})), "");
    }

    #[test]
    fn test_optional_segment() {
        assert_eq!(eval("x[{a}]y", json!({"a": "1"})), "x1y");
        assert_eq!(eval("x[{a}]y", json!({})), "xy");
    }

    #[test]
    fn test_nested_optionals() {
        let source = "uk-width-{w}[@{bp}[-{suffix}]]";
        assert_eq!(eval(source, json!({"w": "1-2"})), "uk-width-1-2");
        assert_eq!(eval(source, json!({"w": "1-2", "bp": "m"})), "uk-width-1-2@m");
        assert_eq!(
            eval(source, json!({"w": "1-2", "bp": "m", "suffix": "x"})),
            "uk-width-1-2@m-x"
        );
        assert_eq!(eval(source, json!({"w": "1-2", "suffix": "x"})), "uk-width-1-2");
    }

    #[test]
    fn test_two_independent_optionals() {
        let source = "a[-{b}][-{c}]";
        assert_eq!(eval(source, json!({"c": "3"})), "a-3");
        assert_eq!(eval(source, json!({"b": "2"})), "a-2");
        assert_eq!(eval(source, json!({"b": "2", "c": "3"})), "a-2-3");
    }

    #[test]
    fn test_host_failure_vetoes_optionals() {
        assert_eq!(eval("[{b}]-{a}", json!({"b": "kept"})), "");
    }

    #[test]
    fn test_false_empty_and_zero_string() {
        assert_eq!(eval("v{a}", json!({"a": false})), "");
        assert_eq!(eval("v{a}", json!({"a": ""})), "");
        assert_eq!(eval("v{a}", json!({"a": "0"})), "v0");
        assert_eq!(eval("v{a}", json!({"a": 0})), "");
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        assert_eq!(eval("{a:(}", json!({"a": "("})), "");
    }

    #[test]
    fn test_parse_is_memoized_and_pure() {
        let engine = ExpressionEngine::new();
        let first = engine.parse("x[{a}]y");
        let second = engine.parse("x[{a}]y");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, Expression::parse("x[{a}]y"));
        assert_eq!(engine.cached(), 1);
    }
}
